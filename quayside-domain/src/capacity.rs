use serde::{Deserialize, Serialize};

/// Process-wide capacity defaults. Applied to a timeslot once, when the slot
/// is first created; updating the config affects only slots created
/// thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityConfig {
    /// Bookings a slot accepts before it is full under ordinary rules.
    pub capacity: i32,
    /// Extra allowance for trucks arriving after their window.
    pub late_capacity: i32,
}

impl CapacityConfig {
    pub fn new(capacity: i32, late_capacity: i32) -> Self {
        Self { capacity, late_capacity }
    }
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self { capacity: 10, late_capacity: 2 }
    }
}
