use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use quayside_domain::repository::{
    AuditStore, BookingStore, ConfigStore, CredentialStore, IncidentStore, StoreError,
    TimeslotStore,
};
use quayside_domain::{
    AuditEntry, Booking, BookingStatus, CapacityConfig, EventCode, GateCredential, Incident,
    IncidentStatus, SlotKey, Timeslot,
};

#[derive(Default)]
struct State {
    // BTreeMap keyed by SlotKey keeps the forward enumeration ordered for
    // free.
    slots: BTreeMap<SlotKey, Timeslot>,
    slot_ids: HashMap<Uuid, SlotKey>,
    bookings: HashMap<Uuid, Booking>,
    credentials: HashMap<Uuid, GateCredential>,
    incidents: HashMap<Uuid, Incident>,
    audit: Vec<AuditEntry>,
    config: CapacityConfig,
}

/// In-memory `TerminalStore`. Backs the test suites and the `memory`
/// database driver for local runs; individual operations are atomic under
/// the state lock, cross-operation sequences rely on the core's slot locks
/// just as they would against a shared database.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CapacityConfig) -> Self {
        let store = Self::new();
        store
            .state
            .try_write()
            .expect("fresh store is uncontended")
            .config = config;
        store
    }

    /// Snapshot of the audit trail, oldest first. Test inspection hook.
    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.read().await.audit.clone()
    }
}

#[async_trait]
impl TimeslotStore for MemoryStore {
    async fn timeslot(&self, id: Uuid) -> Result<Option<Timeslot>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .slot_ids
            .get(&id)
            .and_then(|key| state.slots.get(key))
            .cloned())
    }

    async fn find_slot(&self, key: SlotKey) -> Result<Option<Timeslot>, StoreError> {
        Ok(self.state.read().await.slots.get(&key).cloned())
    }

    async fn get_or_create_slot(
        &self,
        key: SlotKey,
        defaults: CapacityConfig,
    ) -> Result<Timeslot, StoreError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.slots.get(&key) {
            return Ok(existing.clone());
        }

        let slot = Timeslot {
            id: Uuid::new_v4(),
            date: key.date,
            hour_start: key.hour_start,
            capacity: defaults.capacity,
            late_capacity: defaults.late_capacity,
        };
        state.slot_ids.insert(slot.id, key);
        state.slots.insert(key, slot.clone());
        Ok(slot)
    }

    async fn slots_after(
        &self,
        after: SlotKey,
        until: NaiveDate,
    ) -> Result<Vec<Timeslot>, StoreError> {
        use std::ops::Bound;

        let state = self.state.read().await;
        Ok(state
            .slots
            .range((Bound::Excluded(after), Bound::Unbounded))
            .take_while(|(key, _)| key.date <= until)
            .map(|(_, slot)| slot.clone())
            .collect())
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .bookings
            .insert(booking.id, booking.clone());
        Ok(())
    }

    async fn booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.state.read().await.bookings.get(&id).cloned())
    }

    async fn update_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        match state.bookings.get_mut(&booking.id) {
            Some(existing) => {
                *existing = booking.clone();
                Ok(())
            }
            None => Err(StoreError::backend(format!(
                "booking {} does not exist",
                booking.id
            ))),
        }
    }

    async fn delete_booking(&self, id: Uuid) -> Result<(), StoreError> {
        self.state.write().await.bookings.remove(&id);
        Ok(())
    }

    async fn count_active(
        &self,
        timeslot_id: Uuid,
        statuses: &[BookingStatus],
    ) -> Result<i64, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .bookings
            .values()
            .filter(|b| b.timeslot_id == timeslot_id && statuses.contains(&b.status))
            .count() as i64)
    }

    async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let state = self.state.read().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert_credential(
        &self,
        credential: &GateCredential,
    ) -> Result<GateCredential, StoreError> {
        // Check and insert under one write guard; mirrors the SQL schema's
        // unique booking_id constraint.
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .credentials
            .values()
            .find(|c| c.booking_id == credential.booking_id)
        {
            return Ok(existing.clone());
        }
        state.credentials.insert(credential.id, credential.clone());
        Ok(credential.clone())
    }

    async fn credential_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<GateCredential>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .credentials
            .values()
            .find(|c| c.booking_id == booking_id)
            .cloned())
    }

    async fn credential_by_token(
        &self,
        token: &str,
    ) -> Result<Option<GateCredential>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .credentials
            .values()
            .find(|c| c.token == token)
            .cloned())
    }

    async fn delete_credential_for_booking(&self, booking_id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.credentials.retain(|_, c| c.booking_id != booking_id);
        Ok(())
    }
}

#[async_trait]
impl IncidentStore for MemoryStore {
    async fn insert_incident(&self, incident: &Incident) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .incidents
            .insert(incident.id, incident.clone());
        Ok(())
    }

    async fn incident(&self, id: Uuid) -> Result<Option<Incident>, StoreError> {
        Ok(self.state.read().await.incidents.get(&id).cloned())
    }

    async fn update_incident(&self, incident: &Incident) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .incidents
            .insert(incident.id, incident.clone());
        Ok(())
    }

    async fn pending_incidents(&self) -> Result<Vec<Incident>, StoreError> {
        let state = self.state.read().await;
        let mut pending: Vec<Incident> = state
            .incidents
            .values()
            .filter(|i| i.status == IncidentStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|i| i.created_at);
        Ok(pending)
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append_audit(&self, code: EventCode, message: &str) -> Result<(), StoreError> {
        self.state.write().await.audit.push(AuditEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            code,
            message: message.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn capacity_config(&self) -> Result<CapacityConfig, StoreError> {
        Ok(self.state.read().await.config)
    }

    async fn set_capacity_config(&self, config: CapacityConfig) -> Result<(), StoreError> {
        self.state.write().await.config = config;
        Ok(())
    }
}
