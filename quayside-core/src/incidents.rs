use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use quayside_domain::{
    EventCode, Incident, IncidentStatus, Requester, Role, TerminalStore,
};

use crate::audit::record;
use crate::authz::require_role;
use crate::error::CoreError;

/// Problem reports raised against bookings. Carriers and operators report,
/// admins resolve.
pub struct IncidentDesk {
    store: Arc<dyn TerminalStore>,
}

impl IncidentDesk {
    pub fn new(store: Arc<dyn TerminalStore>) -> Self {
        Self { store }
    }

    pub async fn report(
        &self,
        requester: &Requester,
        booking_id: Uuid,
        message: &str,
    ) -> Result<Incident, CoreError> {
        require_role(requester, &[Role::Carrier, Role::Operator])?;

        // The referenced booking must exist at report time; the incident
        // outlives it afterwards.
        self.store
            .booking(booking_id)
            .await?
            .ok_or(CoreError::NotFound("booking"))?;

        let incident = Incident::new(booking_id, requester.user_id, message.to_string());
        self.store.insert_incident(&incident).await?;

        info!(incident_id = %incident.id, booking_id = %booking_id, "incident reported");
        record(
            self.store.as_ref(),
            EventCode::NewIncident,
            format!("New incident reported for booking {booking_id}: {message}"),
        )
        .await;

        Ok(incident)
    }

    pub async fn resolve(
        &self,
        requester: &Requester,
        incident_id: Uuid,
        response: Option<String>,
    ) -> Result<Incident, CoreError> {
        if !requester.is_admin() {
            return Err(CoreError::Unauthorized);
        }

        let mut incident = self
            .store
            .incident(incident_id)
            .await?
            .ok_or(CoreError::NotFound("incident"))?;

        incident.status = IncidentStatus::Resolved;
        incident.response = response;
        incident.resolved_at = Some(Utc::now());
        self.store.update_incident(&incident).await?;

        info!(incident_id = %incident.id, "incident resolved");
        Ok(incident)
    }

    /// Open incidents, visible to any authenticated role.
    pub async fn list_pending(&self, requester: &Requester) -> Result<Vec<Incident>, CoreError> {
        require_role(requester, &[Role::Carrier, Role::Operator])?;
        Ok(self.store.pending_incidents().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use quayside_domain::repository::{BookingStore, TimeslotStore};
    use quayside_domain::{Booking, CapacityConfig, SlotKey};
    use quayside_store::MemoryStore;

    async fn desk_with_booking() -> (IncidentDesk, Booking) {
        let store = Arc::new(MemoryStore::with_config(CapacityConfig::default()));
        let key = SlotKey::new(NaiveDate::from_ymd_opt(2026, 2, 8).unwrap(), 9);
        let slot = store
            .get_or_create_slot(key, CapacityConfig::default())
            .await
            .unwrap();
        let booking = Booking::new(Uuid::new_v4(), "TRK-1".into(), slot.id);
        store.insert_booking(&booking).await.unwrap();
        let dyn_store: Arc<dyn TerminalStore> = store;
        (IncidentDesk::new(dyn_store), booking)
    }

    #[tokio::test]
    async fn report_requires_an_existing_booking() {
        let (desk, booking) = desk_with_booking().await;
        let operator = Requester::new(Uuid::new_v4(), Role::Operator);

        let err = desk
            .report(&operator, Uuid::new_v4(), "ghost booking")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound("booking")));

        let incident = desk
            .report(&operator, booking.id, "reefer plug broken")
            .await
            .unwrap();
        assert_eq!(incident.status, IncidentStatus::Pending);
        assert_eq!(incident.reporter_id, operator.user_id);
    }

    #[tokio::test]
    async fn only_admins_resolve() {
        let (desk, booking) = desk_with_booking().await;
        let operator = Requester::new(Uuid::new_v4(), Role::Operator);
        let incident = desk
            .report(&operator, booking.id, "gate barrier stuck")
            .await
            .unwrap();

        let err = desk
            .resolve(&operator, incident.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized));

        let admin = Requester::new(Uuid::new_v4(), Role::Admin);
        let resolved = desk
            .resolve(&admin, incident.id, Some("barrier reset".into()))
            .await
            .unwrap();
        assert_eq!(resolved.status, IncidentStatus::Resolved);
        assert!(resolved.resolved_at.is_some());
        assert_eq!(resolved.response.as_deref(), Some("barrier reset"));

        // Resolved incidents drop out of the pending list.
        let pending = desk.list_pending(&operator).await.unwrap();
        assert!(pending.is_empty());
    }
}
