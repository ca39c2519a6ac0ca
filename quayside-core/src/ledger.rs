use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use quayside_domain::{
    Booking, BookingStatus, EventCode, Requester, Role, SlotKey, TerminalStore,
};

use crate::audit::record;
use crate::authz::{require_owner_or_admin, require_role};
use crate::error::CoreError;
use crate::locks::SlotLocks;

/// Statuses that consume a slot's normal capacity: booked but not yet out.
const ACTIVE: &[BookingStatus] = &[BookingStatus::Pending, BookingStatus::In];

/// Availability snapshot for one (date, hour) window, reported whether or
/// not the slot record exists yet.
#[derive(Debug, Clone, Serialize)]
pub struct SlotAvailability {
    pub max_capacity: i32,
    pub used_capacity: i64,
    pub late_capacity: i32,
}

/// CRUD and status transitions for bookings. Every capacity check runs
/// under the destination slot's lock, so a succeeding create/reschedule
/// never pushes the active count past `capacity`.
pub struct BookingLedger {
    store: Arc<dyn TerminalStore>,
    locks: Arc<SlotLocks>,
}

impl BookingLedger {
    pub fn new(store: Arc<dyn TerminalStore>, locks: Arc<SlotLocks>) -> Self {
        Self { store, locks }
    }

    /// Creates a pending booking against the slot at `key`, creating the
    /// slot from the current capacity defaults when absent.
    pub async fn create(
        &self,
        requester: &Requester,
        truck_number: &str,
        key: SlotKey,
    ) -> Result<Booking, CoreError> {
        require_role(requester, &[Role::Carrier])?;

        let defaults = self.store.capacity_config().await?;
        let slot = self.store.get_or_create_slot(key, defaults).await?;

        let _guard = self.locks.acquire(slot.id).await;
        let booked = self.store.count_active(slot.id, ACTIVE).await?;
        if booked >= i64::from(slot.capacity) {
            return Err(CoreError::CapacityExceeded);
        }

        let booking = Booking::new(requester.user_id, truck_number.to_string(), slot.id);
        self.store.insert_booking(&booking).await?;

        info!(booking_id = %booking.id, slot = %key, "booking created");
        record(
            self.store.as_ref(),
            EventCode::NewBooking,
            format!(
                "New booking created: {} for truck {}",
                booking.id, booking.truck_number
            ),
        )
        .await;

        Ok(booking)
    }

    /// Moves a booking to the slot at `key`, subject to the destination's
    /// normal capacity.
    pub async fn reschedule(
        &self,
        booking_id: Uuid,
        requester: &Requester,
        key: SlotKey,
    ) -> Result<Booking, CoreError> {
        let mut booking = self.fetch(booking_id).await?;
        require_owner_or_admin(&booking, requester)?;

        let defaults = self.store.capacity_config().await?;
        let destination = self.store.get_or_create_slot(key, defaults).await?;

        let _guard = self.locks.acquire(destination.id).await;
        let booked = self.store.count_active(destination.id, ACTIVE).await?;
        if booked >= i64::from(destination.capacity) {
            return Err(CoreError::CapacityExceeded);
        }

        let old_timeslot = booking.timeslot_id;
        booking.timeslot_id = destination.id;
        booking.updated_at = Utc::now();
        self.store.update_booking(&booking).await?;

        info!(booking_id = %booking.id, from = %old_timeslot, to = %destination.id, "booking rescheduled");
        record(
            self.store.as_ref(),
            EventCode::ModifiedBooking,
            format!(
                "Booking {} rescheduled from timeslot {} to {}",
                booking.id, old_timeslot, destination.id
            ),
        )
        .await;

        Ok(booking)
    }

    /// Applies a forward-only status change. The lifecycle never regresses:
    /// pending may advance to in or out, in may advance to out.
    pub async fn update_status(
        &self,
        booking_id: Uuid,
        requester: &Requester,
        new_status: BookingStatus,
    ) -> Result<Booking, CoreError> {
        let mut booking = self.fetch(booking_id).await?;
        require_owner_or_admin(&booking, requester)?;

        if new_status.rank() <= booking.status.rank() {
            return Err(CoreError::InvalidState {
                from: booking.status,
                to: new_status,
            });
        }

        // Status changes shift occupancy counts, so they serialize with the
        // capacity checks on the same slot.
        let _guard = self.locks.acquire(booking.timeslot_id).await;

        let old_status = booking.status;
        booking.status = new_status;
        booking.updated_at = Utc::now();
        self.store.update_booking(&booking).await?;

        record(
            self.store.as_ref(),
            EventCode::ModifiedBooking,
            format!(
                "Booking {} status changed from {} to {}",
                booking.id, old_status, new_status
            ),
        )
        .await;

        Ok(booking)
    }

    /// Removes a booking and its gate credential. Incidents referencing the
    /// booking are kept for the paper trail.
    pub async fn delete(&self, booking_id: Uuid, requester: &Requester) -> Result<(), CoreError> {
        let booking = self.fetch(booking_id).await?;
        require_owner_or_admin(&booking, requester)?;

        // Logged before removal so the trail names the truck even if the
        // delete itself fails midway.
        record(
            self.store.as_ref(),
            EventCode::DeletedBooking,
            format!(
                "Booking {} for truck {} deleted",
                booking.id, booking.truck_number
            ),
        )
        .await;

        self.store.delete_credential_for_booking(booking.id).await?;
        self.store.delete_booking(booking.id).await?;

        info!(booking_id = %booking.id, "booking deleted");
        Ok(())
    }

    /// Admin-only detail lookup.
    pub async fn get(&self, booking_id: Uuid, requester: &Requester) -> Result<Booking, CoreError> {
        if !requester.is_admin() {
            return Err(CoreError::Unauthorized);
        }
        self.fetch(booking_id).await
    }

    /// All bookings owned by the requester.
    pub async fn list_for_user(&self, requester: &Requester) -> Result<Vec<Booking>, CoreError> {
        require_role(requester, &[Role::Carrier])?;
        Ok(self.store.bookings_for_user(requester.user_id).await?)
    }

    /// The requester's bookings in the slot at `key`. A slot that does not
    /// exist yet holds no bookings and is not created by the lookup.
    pub async fn list_for_user_in_slot(
        &self,
        requester: &Requester,
        key: SlotKey,
    ) -> Result<Vec<Booking>, CoreError> {
        require_role(requester, &[Role::Carrier])?;
        let Some(slot) = self.store.find_slot(key).await? else {
            return Ok(Vec::new());
        };
        let mut bookings = self.store.bookings_for_user(requester.user_id).await?;
        bookings.retain(|b| b.timeslot_id == slot.id);
        Ok(bookings)
    }

    /// Availability for the slot at `key`. An absent slot reports the
    /// current config defaults with zero usage and is not created.
    pub async fn availability(&self, key: SlotKey) -> Result<SlotAvailability, CoreError> {
        match self.store.find_slot(key).await? {
            Some(slot) => {
                let used = self.store.count_active(slot.id, ACTIVE).await?;
                Ok(SlotAvailability {
                    max_capacity: slot.capacity,
                    used_capacity: used,
                    late_capacity: slot.late_capacity,
                })
            }
            None => {
                let defaults = self.store.capacity_config().await?;
                Ok(SlotAvailability {
                    max_capacity: defaults.capacity,
                    used_capacity: 0,
                    late_capacity: defaults.late_capacity,
                })
            }
        }
    }

    async fn fetch(&self, booking_id: Uuid) -> Result<Booking, CoreError> {
        self.store
            .booking(booking_id)
            .await?
            .ok_or(CoreError::NotFound("booking"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use quayside_domain::repository::{
        BookingStore, ConfigStore, CredentialStore, TimeslotStore,
    };
    use quayside_domain::{CapacityConfig, GateCredential};
    use quayside_store::MemoryStore;

    fn key(day: u32, hour: u8) -> SlotKey {
        SlotKey::new(NaiveDate::from_ymd_opt(2026, 2, day).unwrap(), hour)
    }

    fn carrier() -> Requester {
        Requester::new(Uuid::new_v4(), Role::Carrier)
    }

    fn ledger_over(store: &Arc<MemoryStore>) -> BookingLedger {
        let dyn_store: Arc<dyn TerminalStore> = store.clone();
        BookingLedger::new(dyn_store, Arc::new(SlotLocks::new()))
    }

    #[tokio::test]
    async fn create_respects_normal_capacity() {
        let store = Arc::new(MemoryStore::with_config(CapacityConfig::new(2, 1)));
        let ledger = ledger_over(&store);
        let user = carrier();

        ledger.create(&user, "TRK-1", key(8, 9)).await.unwrap();
        ledger.create(&user, "TRK-2", key(8, 9)).await.unwrap();
        let err = ledger.create(&user, "TRK-3", key(8, 9)).await.unwrap_err();
        assert!(matches!(err, CoreError::CapacityExceeded));

        let slot = store.find_slot(key(8, 9)).await.unwrap().unwrap();
        let active = store.count_active(slot.id, ACTIVE).await.unwrap();
        assert!(active <= i64::from(slot.capacity));
    }

    #[tokio::test]
    async fn concurrent_creates_never_overbook() {
        let store = Arc::new(MemoryStore::with_config(CapacityConfig::new(1, 0)));
        let ledger = ledger_over(&store);
        let user = carrier();

        let (a, b) = tokio::join!(
            ledger.create(&user, "TRK-A", key(8, 9)),
            ledger.create(&user, "TRK-B", key(8, 9)),
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);

        let slot = store.find_slot(key(8, 9)).await.unwrap().unwrap();
        assert_eq!(store.count_active(slot.id, ACTIVE).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reschedule_checks_destination_capacity() {
        let store = Arc::new(MemoryStore::with_config(CapacityConfig::new(1, 0)));
        let ledger = ledger_over(&store);
        let user = carrier();

        let booking = ledger.create(&user, "TRK-1", key(8, 9)).await.unwrap();
        ledger.create(&user, "TRK-2", key(8, 10)).await.unwrap();

        let err = ledger
            .reschedule(booking.id, &user, key(8, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CapacityExceeded));

        let moved = ledger.reschedule(booking.id, &user, key(8, 11)).await.unwrap();
        let destination = store.find_slot(key(8, 11)).await.unwrap().unwrap();
        assert_eq!(moved.timeslot_id, destination.id);
    }

    #[tokio::test]
    async fn only_owner_or_admin_may_mutate() {
        let store = Arc::new(MemoryStore::new());
        let ledger = ledger_over(&store);
        let owner = carrier();
        let stranger = carrier();
        let admin = Requester::new(Uuid::new_v4(), Role::Admin);

        let booking = ledger.create(&owner, "TRK-1", key(8, 9)).await.unwrap();

        let err = ledger
            .reschedule(booking.id, &stranger, key(8, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized));

        ledger
            .reschedule(booking.id, &admin, key(8, 10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn status_updates_are_forward_only() {
        let store = Arc::new(MemoryStore::new());
        let ledger = ledger_over(&store);
        let user = carrier();

        let booking = ledger.create(&user, "TRK-1", key(8, 9)).await.unwrap();

        ledger
            .update_status(booking.id, &user, BookingStatus::In)
            .await
            .unwrap();
        let err = ledger
            .update_status(booking.id, &user, BookingStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));

        ledger
            .update_status(booking.id, &user, BookingStatus::Out)
            .await
            .unwrap();
        let err = ledger
            .update_status(booking.id, &user, BookingStatus::In)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn delete_removes_credential_and_logs_first() {
        let store = Arc::new(MemoryStore::new());
        let ledger = ledger_over(&store);
        let user = carrier();

        let booking = ledger.create(&user, "TRK-1", key(8, 9)).await.unwrap();
        let credential = GateCredential::new(booking.id, "gate_test".into());
        store.insert_credential(&credential).await.unwrap();

        ledger.delete(booking.id, &user).await.unwrap();

        assert!(store.booking(booking.id).await.unwrap().is_none());
        assert!(store
            .credential_for_booking(booking.id)
            .await
            .unwrap()
            .is_none());
        let codes: Vec<EventCode> = store
            .audit_entries()
            .await
            .into_iter()
            .map(|e| e.code)
            .collect();
        assert!(codes.contains(&EventCode::DeletedBooking));
    }

    #[tokio::test]
    async fn slot_filtered_listing_returns_only_that_hour() {
        let store = Arc::new(MemoryStore::new());
        let ledger = ledger_over(&store);
        let user = carrier();
        let other = carrier();

        let kept = ledger.create(&user, "TRK-1", key(8, 9)).await.unwrap();
        ledger.create(&user, "TRK-2", key(8, 10)).await.unwrap();
        ledger.create(&other, "TRK-3", key(8, 9)).await.unwrap();

        let in_slot = ledger
            .list_for_user_in_slot(&user, key(8, 9))
            .await
            .unwrap();
        assert_eq!(in_slot.len(), 1);
        assert_eq!(in_slot[0].id, kept.id);

        // An hour nobody booked is empty and stays uncreated.
        assert!(ledger
            .list_for_user_in_slot(&user, key(8, 11))
            .await
            .unwrap()
            .is_empty());
        assert!(store.find_slot(key(8, 11)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn availability_reports_defaults_for_missing_slot() {
        let store = Arc::new(MemoryStore::with_config(CapacityConfig::new(6, 3)));
        let ledger = ledger_over(&store);

        let availability = ledger.availability(key(8, 9)).await.unwrap();
        assert_eq!(availability.max_capacity, 6);
        assert_eq!(availability.used_capacity, 0);
        assert_eq!(availability.late_capacity, 3);
        // Reporting must not create the slot.
        assert!(store.find_slot(key(8, 9)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn config_updates_do_not_retrofit_existing_slots() {
        let store = Arc::new(MemoryStore::with_config(CapacityConfig::new(10, 2)));
        let ledger = ledger_over(&store);
        let user = carrier();

        ledger.create(&user, "TRK-1", key(8, 9)).await.unwrap();
        store
            .set_capacity_config(CapacityConfig::new(3, 1))
            .await
            .unwrap();
        ledger.create(&user, "TRK-2", key(8, 10)).await.unwrap();

        let old_slot = store.find_slot(key(8, 9)).await.unwrap().unwrap();
        let new_slot = store.find_slot(key(8, 10)).await.unwrap().unwrap();
        assert_eq!(old_slot.capacity, 10);
        assert_eq!(new_slot.capacity, 3);
    }
}
