use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::audit::EventCode;
use crate::booking::{Booking, BookingStatus};
use crate::capacity::CapacityConfig;
use crate::credential::GateCredential;
use crate::incident::Incident;
use crate::timeslot::{SlotKey, Timeslot};

/// Failure of the persistence backend. Always fatal to the current
/// operation; the core never retries.
#[derive(Debug, thiserror::Error)]
#[error("storage failure: {0}")]
pub struct StoreError(String);

impl StoreError {
    pub fn backend(cause: impl std::fmt::Display) -> Self {
        Self(cause.to_string())
    }
}

/// Timeslot access: lookup by id or key, lazy creation, ordered forward
/// enumeration for the late-arrival search.
#[async_trait]
pub trait TimeslotStore: Send + Sync {
    async fn timeslot(&self, id: Uuid) -> Result<Option<Timeslot>, StoreError>;

    async fn find_slot(&self, key: SlotKey) -> Result<Option<Timeslot>, StoreError>;

    /// Returns the slot for `key`, creating it with capacity figures copied
    /// from `defaults` when absent.
    async fn get_or_create_slot(
        &self,
        key: SlotKey,
        defaults: CapacityConfig,
    ) -> Result<Timeslot, StoreError>;

    /// Existing slots strictly later than `after` (same date with a greater
    /// hour, or any later date) up to and including `until`, ascending by
    /// (date, hour_start).
    async fn slots_after(
        &self,
        after: SlotKey,
        until: NaiveDate,
    ) -> Result<Vec<Timeslot>, StoreError>;
}

/// Booking access. `update_booking` writes the full row; callers mutate a
/// fetched copy and persist it under the relevant slot lock.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError>;

    async fn booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    async fn update_booking(&self, booking: &Booking) -> Result<(), StoreError>;

    async fn delete_booking(&self, id: Uuid) -> Result<(), StoreError>;

    /// Count of bookings referencing `timeslot_id` whose status is in
    /// `statuses`. `{Pending, In}` answers capacity checks, `{In}` answers
    /// gate occupancy.
    async fn count_active(
        &self,
        timeslot_id: Uuid,
        statuses: &[BookingStatus],
    ) -> Result<i64, StoreError>;

    async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, StoreError>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persists `credential` unless its booking already holds one; returns
    /// the stored credential either way. A booking never ends up with two
    /// live credentials, even under concurrent issuance.
    async fn insert_credential(
        &self,
        credential: &GateCredential,
    ) -> Result<GateCredential, StoreError>;

    async fn credential_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<GateCredential>, StoreError>;

    async fn credential_by_token(&self, token: &str)
        -> Result<Option<GateCredential>, StoreError>;

    async fn delete_credential_for_booking(&self, booking_id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait IncidentStore: Send + Sync {
    async fn insert_incident(&self, incident: &Incident) -> Result<(), StoreError>;

    async fn incident(&self, id: Uuid) -> Result<Option<Incident>, StoreError>;

    async fn update_incident(&self, incident: &Incident) -> Result<(), StoreError>;

    async fn pending_incidents(&self) -> Result<Vec<Incident>, StoreError>;
}

/// Append-only audit trail. The timestamp is assigned at write time.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_audit(&self, code: EventCode, message: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn capacity_config(&self) -> Result<CapacityConfig, StoreError>;

    async fn set_capacity_config(&self, config: CapacityConfig) -> Result<(), StoreError>;
}

/// The full persistence interface the core operates against.
pub trait TerminalStore:
    TimeslotStore + BookingStore + CredentialStore + IncidentStore + AuditStore + ConfigStore
{
}

impl<T> TerminalStore for T where
    T: TimeslotStore + BookingStore + CredentialStore + IncidentStore + AuditStore + ConfigStore
{
}
