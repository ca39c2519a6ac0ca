use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A carrier's reservation of one truck against one timeslot. The timeslot
/// reference is mutable: rescheduling and late-arrival reallocation both
/// repoint it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub truck_number: String,
    pub timeslot_id: Uuid,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(user_id: Uuid, truck_number: String, timeslot_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            truck_number,
            timeslot_id,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Lifecycle: `Pending` at creation, `In` once checked in at the gate,
/// `Out` once the shipment is completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    In,
    Out,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::In => "in",
            BookingStatus::Out => "out",
        }
    }

    /// Position in the forward-only lifecycle, for transition checks.
    pub fn rank(&self) -> u8 {
        match self {
            BookingStatus::Pending => 0,
            BookingStatus::In => 1,
            BookingStatus::Out => 2,
        }
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "in" => Ok(BookingStatus::In),
            "out" => Ok(BookingStatus::Out),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [BookingStatus::Pending, BookingStatus::In, BookingStatus::Out] {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn lifecycle_ranks_are_ordered() {
        assert!(BookingStatus::Pending.rank() < BookingStatus::In.rank());
        assert!(BookingStatus::In.rank() < BookingStatus::Out.rank());
    }
}
