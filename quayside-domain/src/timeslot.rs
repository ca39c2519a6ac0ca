use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a bookable hour: one calendar date plus the hour the window
/// opens. At most one `Timeslot` exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub hour_start: u8,
}

impl SlotKey {
    pub fn new(date: NaiveDate, hour_start: u8) -> Self {
        Self { date, hour_start }
    }

    /// Opening instant of the one-hour window, in UTC. Total over the whole
    /// hour byte: computed as midnight plus `hour_start` hours, so an
    /// unvalidated value cannot panic here (transport layers still reject
    /// hours above 23).
    pub fn start(&self) -> DateTime<Utc> {
        self.date.and_time(NaiveTime::MIN).and_utc() + Duration::hours(i64::from(self.hour_start))
    }

    /// Closing instant of the window. An arrival at exactly this instant is
    /// already late.
    pub fn end(&self) -> DateTime<Utc> {
        self.start() + Duration::hours(1)
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:02}:00", self.date, self.hour_start)
    }
}

/// One bookable hour-wide window at the terminal. Capacity figures are
/// copied from the capacity config current at creation time and never
/// retrofitted by later config changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeslot {
    pub id: Uuid,
    pub date: NaiveDate,
    pub hour_start: u8,
    pub capacity: i32,
    pub late_capacity: i32,
}

impl Timeslot {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.date, self.hour_start)
    }

    /// Normal plus overflow allowance; the hard ceiling on `in` occupancy.
    pub fn total_capacity(&self) -> i32 {
        self.capacity + self.late_capacity
    }
}
