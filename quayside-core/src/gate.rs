use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use quayside_domain::{
    Booking, BookingStatus, EventCode, Requester, Role, SlotKey, TerminalStore, Timeslot,
};

use crate::audit::record;
use crate::authz::require_role;
use crate::error::CoreError;
use crate::locks::SlotLocks;

const IN_ONLY: &[BookingStatus] = &[BookingStatus::In];

/// Tunable behavior of the check-in engine.
#[derive(Debug, Clone, Copy)]
pub struct GateRules {
    /// How many days past the original slot's date the late-arrival search
    /// will look for a slot with free late capacity. Exhausting the horizon
    /// is reported as no-late-capacity.
    pub late_search_horizon_days: i64,
}

impl Default for GateRules {
    fn default() -> Self {
        Self {
            late_search_horizon_days: 7,
        }
    }
}

/// How an arrival was classified and accommodated.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "arrival_type", rename_all = "snake_case")]
pub enum ArrivalOutcome {
    /// Arrived inside the slot's one-hour window.
    OnTime,
    /// Arrived after the window but fit in the original slot's late
    /// capacity.
    LateOriginalSlot { timeslot_id: Uuid },
    /// Arrived after the window, original slot exhausted; moved forward to
    /// the first later slot with free total capacity.
    LateRescheduled {
        original_timeslot_id: Uuid,
        new_timeslot_id: Uuid,
        new_slot: SlotKey,
    },
    /// The search completed and found nothing. A successful engine run with
    /// a negative business result: the booking is untouched and a human
    /// has to step in. Never retried automatically.
    NoLateCapacity { suggested_action: String },
}

/// Result of a gate scan.
#[derive(Debug, Clone, Serialize)]
pub struct CheckInReport {
    pub booking_id: Uuid,
    pub truck_number: String,
    pub status: BookingStatus,
    #[serde(flatten)]
    pub outcome: ArrivalOutcome,
}

/// Occupancy snapshot returned by shipment completion.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionReport {
    pub booking_id: Uuid,
    pub truck_number: String,
    pub status: BookingStatus,
    pub slot: SlotKey,
    pub capacity: i32,
    pub late_capacity: i32,
    pub previous_occupancy: i64,
    pub current_occupancy: i64,
}

/// The gate check-in engine. Classifies an arriving truck against its
/// booked window, applies late-capacity accommodation, or walks forward
/// through later slots for one with room. All occupancy reads and the
/// mutation they justify happen under the affected slot's lock.
pub struct GateEngine {
    store: Arc<dyn TerminalStore>,
    locks: Arc<SlotLocks>,
    rules: GateRules,
}

impl GateEngine {
    pub fn new(store: Arc<dyn TerminalStore>, locks: Arc<SlotLocks>, rules: GateRules) -> Self {
        Self {
            store,
            locks,
            rules,
        }
    }

    /// Processes a gate scan: resolves the credential, classifies the
    /// arrival against the booked window, and advances the booking to `in`
    /// if anywhere can take it. `now` is supplied by the caller's clock.
    pub async fn check_in(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<CheckInReport, CoreError> {
        let credential = self
            .store
            .credential_by_token(token)
            .await?
            .ok_or(CoreError::InvalidCredential)?;

        let booking = self
            .store
            .booking(credential.booking_id)
            .await?
            .ok_or(CoreError::NotFound("booking"))?;

        let slot = self
            .store
            .timeslot(booking.timeslot_id)
            .await?
            .ok_or(CoreError::NotFound("timeslot"))?;

        // A truck that already left must not be pulled back in.
        if booking.status == BookingStatus::Out {
            return Err(CoreError::InvalidState {
                from: booking.status,
                to: BookingStatus::In,
            });
        }

        let key = slot.key();
        let slot_start = key.start();
        let slot_end = key.end();

        if now < slot_start {
            return Err(CoreError::ArrivedTooEarly { slot_start, now });
        }

        let _guard = self.locks.acquire(slot.id).await;

        if now < slot_end {
            // Inside the window, slot_start inclusive.
            return self.admit_on_time(booking).await;
        }

        self.handle_late_arrival(booking, slot).await
    }

    async fn admit_on_time(&self, mut booking: Booking) -> Result<CheckInReport, CoreError> {
        booking.status = BookingStatus::In;
        booking.updated_at = Utc::now();
        self.store.update_booking(&booking).await?;

        info!(booking_id = %booking.id, truck = %booking.truck_number, "on-time check-in");
        record(
            self.store.as_ref(),
            EventCode::CarrierArrived,
            format!(
                "Truck {} arrived ON TIME at terminal for booking {}",
                booking.truck_number, booking.id
            ),
        )
        .await;

        Ok(CheckInReport {
            booking_id: booking.id,
            truck_number: booking.truck_number,
            status: BookingStatus::In,
            outcome: ArrivalOutcome::OnTime,
        })
    }

    /// Late path. Late capacity is implicit overflow: it is consumed to the
    /// extent the slot's `in` occupancy exceeds normal capacity, so it is
    /// derived by counting rather than kept as a second mutable field.
    /// Caller holds the original slot's lock.
    async fn handle_late_arrival(
        &self,
        mut booking: Booking,
        original: Timeslot,
    ) -> Result<CheckInReport, CoreError> {
        let in_slot = self.store.count_active(original.id, IN_ONLY).await?;
        let late_used = (in_slot - i64::from(original.capacity)).max(0);

        if late_used < i64::from(original.late_capacity) {
            booking.status = BookingStatus::In;
            booking.updated_at = Utc::now();
            self.store.update_booking(&booking).await?;

            info!(booking_id = %booking.id, slot = %original.key(), "late check-in, original slot");
            record(
                self.store.as_ref(),
                EventCode::CarrierArrived,
                format!(
                    "Truck {} arrived LATE but accommodated in original timeslot late capacity for booking {}",
                    booking.truck_number, booking.id
                ),
            )
            .await;

            return Ok(CheckInReport {
                booking_id: booking.id,
                truck_number: booking.truck_number,
                status: BookingStatus::In,
                outcome: ArrivalOutcome::LateOriginalSlot {
                    timeslot_id: original.id,
                },
            });
        }

        // Original slot exhausted: walk forward through existing slots,
        // ascending by (date, hour), within the horizon.
        let key = original.key();
        let until = key.date + Duration::days(self.rules.late_search_horizon_days);
        let candidates = self.store.slots_after(key, until).await?;

        for candidate in candidates {
            // Re-validate under the candidate's own lock: another check-in
            // may have taken its last place since the enumeration.
            let _candidate_guard = self.locks.acquire(candidate.id).await;
            let occupied = self.store.count_active(candidate.id, IN_ONLY).await?;
            if occupied >= i64::from(candidate.total_capacity()) {
                continue;
            }

            let old_timeslot = booking.timeslot_id;
            booking.timeslot_id = candidate.id;
            booking.status = BookingStatus::In;
            booking.updated_at = Utc::now();
            self.store.update_booking(&booking).await?;

            info!(
                booking_id = %booking.id,
                from = %old_timeslot,
                to = %candidate.id,
                "late check-in, rescheduled forward"
            );
            record(
                self.store.as_ref(),
                EventCode::ModifiedBooking,
                format!(
                    "Truck {} arrived LATE. Booking {} moved from timeslot {} to {} (late slot)",
                    booking.truck_number, booking.id, old_timeslot, candidate.id
                ),
            )
            .await;
            record(
                self.store.as_ref(),
                EventCode::CarrierArrived,
                format!(
                    "Truck {} arrived LATE and accommodated in timeslot {} late capacity",
                    booking.truck_number, candidate.id
                ),
            )
            .await;

            return Ok(CheckInReport {
                booking_id: booking.id,
                truck_number: booking.truck_number,
                status: BookingStatus::In,
                outcome: ArrivalOutcome::LateRescheduled {
                    original_timeslot_id: old_timeslot,
                    new_timeslot_id: candidate.id,
                    new_slot: candidate.key(),
                },
            });
        }

        // Nothing anywhere in the horizon. No state change.
        record(
            self.store.as_ref(),
            EventCode::NewIncident,
            format!(
                "Truck {} arrived LATE for booking {} but NO late capacity available in any timeslot",
                booking.truck_number, booking.id
            ),
        )
        .await;

        Ok(CheckInReport {
            booking_id: booking.id,
            truck_number: booking.truck_number,
            status: booking.status,
            outcome: ArrivalOutcome::NoLateCapacity {
                suggested_action: "Contact terminal administrator".to_string(),
            },
        })
    }

    /// Marks a checked-in truck's shipment finished, freeing its occupancy
    /// place, and reports the slot's occupancy before and after.
    pub async fn complete(
        &self,
        booking_id: Uuid,
        requester: &Requester,
    ) -> Result<CompletionReport, CoreError> {
        require_role(requester, &[Role::Operator])?;

        let mut booking = self
            .store
            .booking(booking_id)
            .await?
            .ok_or(CoreError::NotFound("booking"))?;

        let slot = self
            .store
            .timeslot(booking.timeslot_id)
            .await?
            .ok_or(CoreError::NotFound("timeslot"))?;

        let _guard = self.locks.acquire(slot.id).await;

        if booking.status != BookingStatus::In {
            return Err(CoreError::InvalidState {
                from: booking.status,
                to: BookingStatus::Out,
            });
        }

        let previous_occupancy = self.store.count_active(slot.id, IN_ONLY).await?;

        booking.status = BookingStatus::Out;
        booking.updated_at = Utc::now();
        self.store.update_booking(&booking).await?;

        let current_occupancy = self.store.count_active(slot.id, IN_ONLY).await?;

        info!(booking_id = %booking.id, slot = %slot.key(), "shipment completed");
        record(
            self.store.as_ref(),
            EventCode::ShipmentConsumed,
            format!(
                "Truck {} completed shipment for booking {}. Slot freed. Occupancy: {} -> {}",
                booking.truck_number, booking.id, previous_occupancy, current_occupancy
            ),
        )
        .await;

        Ok(CompletionReport {
            booking_id: booking.id,
            truck_number: booking.truck_number,
            status: BookingStatus::Out,
            slot: slot.key(),
            capacity: slot.capacity,
            late_capacity: slot.late_capacity,
            previous_occupancy,
            current_occupancy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use quayside_domain::repository::{BookingStore, CredentialStore, TimeslotStore};
    use quayside_domain::{CapacityConfig, GateCredential};
    use quayside_store::MemoryStore;

    use crate::ledger::BookingLedger;
    use crate::credentials::CredentialIssuer;

    struct Harness {
        store: Arc<MemoryStore>,
        engine: GateEngine,
    }

    fn harness(defaults: CapacityConfig) -> Harness {
        let store = Arc::new(MemoryStore::with_config(defaults));
        let dyn_store: Arc<dyn TerminalStore> = store.clone();
        let engine = GateEngine::new(dyn_store, Arc::new(SlotLocks::new()), GateRules::default());
        Harness { store, engine }
    }

    fn key(day: u32, hour: u8) -> SlotKey {
        SlotKey::new(NaiveDate::from_ymd_opt(2026, 2, day).unwrap(), hour)
    }

    fn at(day: u32, hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, day, hour, min, 0).unwrap()
    }

    async fn make_slot(store: &MemoryStore, k: SlotKey, capacity: i32, late: i32) -> Timeslot {
        store
            .get_or_create_slot(k, CapacityConfig::new(capacity, late))
            .await
            .unwrap()
    }

    async fn fill_checked_in(store: &MemoryStore, timeslot_id: Uuid, count: usize) {
        for i in 0..count {
            let mut booking = Booking::new(Uuid::new_v4(), format!("TRK-F{i}"), timeslot_id);
            booking.status = BookingStatus::In;
            store.insert_booking(&booking).await.unwrap();
        }
    }

    async fn booked_with_token(store: &MemoryStore, timeslot_id: Uuid) -> (Booking, String) {
        let booking = Booking::new(Uuid::new_v4(), "TRK-T".into(), timeslot_id);
        store.insert_booking(&booking).await.unwrap();
        let token = format!("gate_{}", Uuid::new_v4().simple());
        let credential = GateCredential::new(booking.id, token.clone());
        store.insert_credential(&credential).await.unwrap();
        (booking, token)
    }

    fn operator() -> Requester {
        Requester::new(Uuid::new_v4(), Role::Operator)
    }

    #[tokio::test]
    async fn arrival_at_slot_start_is_on_time() {
        let h = harness(CapacityConfig::default());
        let slot = make_slot(&h.store, key(8, 9), 10, 2).await;
        let (booking, token) = booked_with_token(&h.store, slot.id).await;

        let report = h.engine.check_in(&token, at(8, 9, 0)).await.unwrap();
        assert!(matches!(report.outcome, ArrivalOutcome::OnTime));
        assert_eq!(report.status, BookingStatus::In);

        let stored = h.store.booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::In);
    }

    #[tokio::test]
    async fn arrival_at_slot_end_is_already_late() {
        let h = harness(CapacityConfig::default());
        let slot = make_slot(&h.store, key(8, 9), 10, 2).await;
        let (_, token) = booked_with_token(&h.store, slot.id).await;

        // 10:00 sharp is outside the window; late capacity is free, so the
        // truck stays in its original slot.
        let report = h.engine.check_in(&token, at(8, 10, 0)).await.unwrap();
        assert!(matches!(
            report.outcome,
            ArrivalOutcome::LateOriginalSlot { timeslot_id } if timeslot_id == slot.id
        ));
    }

    #[tokio::test]
    async fn early_arrival_is_rejected_without_mutation() {
        let h = harness(CapacityConfig::default());
        let slot = make_slot(&h.store, key(8, 9), 10, 2).await;
        let (booking, token) = booked_with_token(&h.store, slot.id).await;

        let err = h.engine.check_in(&token, at(8, 8, 59)).await.unwrap_err();
        assert!(matches!(err, CoreError::ArrivedTooEarly { .. }));

        let stored = h.store.booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_token_is_invalid_credential() {
        let h = harness(CapacityConfig::default());
        let err = h
            .engine
            .check_in("gate_unknown", at(8, 9, 30))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidCredential));
    }

    #[tokio::test]
    async fn late_capacity_absorbs_overflow_then_search_begins() {
        let h = harness(CapacityConfig::default());
        let slot = make_slot(&h.store, key(8, 9), 10, 2).await;
        let next = make_slot(&h.store, key(8, 10), 10, 2).await;
        fill_checked_in(&h.store, slot.id, 10).await;

        // 11th and 12th late arrivals fit the two late places in the
        // original slot.
        for _ in 0..2 {
            let (_, token) = booked_with_token(&h.store, slot.id).await;
            let report = h.engine.check_in(&token, at(8, 11, 0)).await.unwrap();
            assert!(matches!(report.outcome, ArrivalOutcome::LateOriginalSlot { .. }));
        }

        // The 13th has to move forward.
        let (_, token) = booked_with_token(&h.store, slot.id).await;
        let report = h.engine.check_in(&token, at(8, 11, 0)).await.unwrap();
        match report.outcome {
            ArrivalOutcome::LateRescheduled {
                original_timeslot_id,
                new_timeslot_id,
                new_slot,
            } => {
                assert_eq!(original_timeslot_id, slot.id);
                assert_eq!(new_timeslot_id, next.id);
                assert_eq!(new_slot, key(8, 10));
            }
            other => panic!("expected LateRescheduled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn forward_search_skips_full_intermediate_slots() {
        let h = harness(CapacityConfig::default());
        let nine = make_slot(&h.store, key(8, 9), 5, 0).await;
        let ten = make_slot(&h.store, key(8, 10), 5, 0).await;
        let eleven = make_slot(&h.store, key(8, 11), 5, 2).await;
        fill_checked_in(&h.store, nine.id, 5).await;
        fill_checked_in(&h.store, ten.id, 5).await;
        fill_checked_in(&h.store, eleven.id, 5).await;

        let (_, token) = booked_with_token(&h.store, nine.id).await;
        let report = h.engine.check_in(&token, at(8, 12, 0)).await.unwrap();
        match report.outcome {
            ArrivalOutcome::LateRescheduled { new_timeslot_id, .. } => {
                // Hour 10 is full with no late room; hour 11 still has late
                // places.
                assert_eq!(new_timeslot_id, eleven.id);
            }
            other => panic!("expected LateRescheduled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exhausted_calendar_reports_no_late_capacity() {
        let h = harness(CapacityConfig::default());
        let slot = make_slot(&h.store, key(8, 9), 1, 0).await;
        let next = make_slot(&h.store, key(8, 10), 1, 0).await;
        fill_checked_in(&h.store, slot.id, 1).await;
        fill_checked_in(&h.store, next.id, 1).await;

        let (booking, token) = booked_with_token(&h.store, slot.id).await;
        let report = h.engine.check_in(&token, at(8, 11, 0)).await.unwrap();
        assert!(matches!(report.outcome, ArrivalOutcome::NoLateCapacity { .. }));

        // Zero mutation to the booking.
        let stored = h.store.booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Pending);
        assert_eq!(stored.timeslot_id, slot.id);

        let codes: Vec<EventCode> = h
            .store
            .audit_entries()
            .await
            .into_iter()
            .map(|e| e.code)
            .collect();
        assert!(codes.contains(&EventCode::NewIncident));
    }

    #[tokio::test]
    async fn forward_search_stops_at_the_horizon() {
        let h = harness(CapacityConfig::default());
        let slot = make_slot(&h.store, key(8, 9), 1, 0).await;
        fill_checked_in(&h.store, slot.id, 1).await;
        // Room exists, but eight days out with a seven-day horizon.
        make_slot(&h.store, key(16, 9), 5, 0).await;

        let (_, token) = booked_with_token(&h.store, slot.id).await;
        let report = h.engine.check_in(&token, at(8, 11, 0)).await.unwrap();
        assert!(matches!(report.outcome, ArrivalOutcome::NoLateCapacity { .. }));
    }

    #[tokio::test]
    async fn complete_frees_exactly_one_place() {
        let h = harness(CapacityConfig::default());
        let slot = make_slot(&h.store, key(8, 9), 10, 2).await;
        let (booking, token) = booked_with_token(&h.store, slot.id).await;
        h.engine.check_in(&token, at(8, 9, 30)).await.unwrap();

        let report = h.engine.complete(booking.id, &operator()).await.unwrap();
        assert_eq!(report.previous_occupancy, 1);
        assert_eq!(report.current_occupancy, 0);
        assert_eq!(report.status, BookingStatus::Out);

        // A second completion is invalid and occupancy stays at zero.
        let err = h.engine.complete(booking.id, &operator()).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));
        let in_count = h
            .store
            .count_active(slot.id, &[BookingStatus::In])
            .await
            .unwrap();
        assert_eq!(in_count, 0);
    }

    #[tokio::test]
    async fn complete_rejects_pending_bookings_and_carriers() {
        let h = harness(CapacityConfig::default());
        let slot = make_slot(&h.store, key(8, 9), 10, 2).await;
        let (booking, _) = booked_with_token(&h.store, slot.id).await;

        let err = h.engine.complete(booking.id, &operator()).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));

        let carrier = Requester::new(Uuid::new_v4(), Role::Carrier);
        let err = h.engine.complete(booking.id, &carrier).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized));
    }

    #[tokio::test]
    async fn checked_out_trucks_cannot_rescan() {
        let h = harness(CapacityConfig::default());
        let slot = make_slot(&h.store, key(8, 9), 10, 2).await;
        let (booking, token) = booked_with_token(&h.store, slot.id).await;
        h.engine.check_in(&token, at(8, 9, 30)).await.unwrap();
        h.engine.complete(booking.id, &operator()).await.unwrap();

        let err = h.engine.check_in(&token, at(8, 9, 45)).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));
    }

    // Full happy path: book, scan on time, complete.
    #[tokio::test]
    async fn end_to_end_booking_checkin_completion() {
        let store = Arc::new(MemoryStore::with_config(CapacityConfig::new(10, 2)));
        let dyn_store: Arc<dyn TerminalStore> = store.clone();
        let locks = Arc::new(SlotLocks::new());
        let ledger = BookingLedger::new(Arc::clone(&dyn_store), Arc::clone(&locks));
        let issuer = CredentialIssuer::new(Arc::clone(&dyn_store));
        let engine = GateEngine::new(dyn_store, locks, GateRules::default());

        let carrier = Requester::new(Uuid::new_v4(), Role::Carrier);
        let booking = ledger.create(&carrier, "TRK-42", key(8, 9)).await.unwrap();
        let credential = issuer.get_or_create(booking.id, &carrier).await.unwrap();

        let report = engine
            .check_in(&credential.token, at(8, 9, 30))
            .await
            .unwrap();
        assert!(matches!(report.outcome, ArrivalOutcome::OnTime));
        assert_eq!(report.status, BookingStatus::In);

        let completion = engine.complete(booking.id, &operator()).await.unwrap();
        assert_eq!(completion.status, BookingStatus::Out);
        assert_eq!(completion.previous_occupancy, 1);
        assert_eq!(completion.current_occupancy, 0);
    }
}
