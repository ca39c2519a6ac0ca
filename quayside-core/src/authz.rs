use quayside_domain::{Booking, Requester, Role};

use crate::error::CoreError;

/// The single ownership predicate: a booking may be mutated by the carrier
/// who created it or by an admin, nobody else.
pub fn can_mutate(booking: &Booking, requester: &Requester) -> bool {
    requester.is_admin() || booking.user_id == requester.user_id
}

/// `can_mutate` as a guard clause.
pub fn require_owner_or_admin(booking: &Booking, requester: &Requester) -> Result<(), CoreError> {
    if can_mutate(booking, requester) {
        Ok(())
    } else {
        Err(CoreError::Unauthorized)
    }
}

/// Guard for operations restricted to a fixed role set (admin always
/// passes).
pub fn require_role(requester: &Requester, allowed: &[Role]) -> Result<(), CoreError> {
    if requester.is_admin() || allowed.contains(&requester.role) {
        Ok(())
    } else {
        Err(CoreError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn booking_owned_by(user_id: Uuid) -> Booking {
        Booking::new(user_id, "TRK-001".into(), Uuid::new_v4())
    }

    #[test]
    fn owner_and_admin_may_mutate() {
        let owner = Requester::new(Uuid::new_v4(), Role::Carrier);
        let booking = booking_owned_by(owner.user_id);

        assert!(can_mutate(&booking, &owner));
        assert!(can_mutate(
            &booking,
            &Requester::new(Uuid::new_v4(), Role::Admin)
        ));
        assert!(!can_mutate(
            &booking,
            &Requester::new(Uuid::new_v4(), Role::Carrier)
        ));
    }

    #[test]
    fn role_guard_admits_admin_everywhere() {
        let admin = Requester::new(Uuid::new_v4(), Role::Admin);
        assert!(require_role(&admin, &[Role::Operator]).is_ok());

        let carrier = Requester::new(Uuid::new_v4(), Role::Carrier);
        assert!(matches!(
            require_role(&carrier, &[Role::Operator]),
            Err(CoreError::Unauthorized)
        ));
    }
}
