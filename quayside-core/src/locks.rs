use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Per-timeslot exclusive locks. Every count-then-mutate sequence against a
/// slot (creation, reschedule, check-in, completion) runs under that slot's
/// lock, so two concurrent requests can never both observe the last free
/// place.
///
/// The late-arrival search acquires the original slot first and candidate
/// slots after it; candidates are strictly later in (date, hour) order, so
/// acquisition order is consistent and cannot deadlock.
#[derive(Default)]
pub struct SlotLocks {
    inner: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `timeslot_id`, creating it on first use. The
    /// guard is owned so it can be held across awaits.
    pub async fn acquire(&self, timeslot_id: Uuid) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().await;
            Arc::clone(map.entry(timeslot_id).or_default())
        };
        slot.lock_owned().await
    }
}
