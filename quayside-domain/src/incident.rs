use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A problem report tied to a booking, raised by a carrier or gate operator
/// and resolved by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub reporter_id: Uuid,
    pub message: String,
    pub status: IncidentStatus,
    pub response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Incident {
    pub fn new(booking_id: Uuid, reporter_id: Uuid, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            reporter_id,
            message,
            status: IncidentStatus::Pending,
            response: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Pending,
    Resolved,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Pending => "pending",
            IncidentStatus::Resolved => "resolved",
        }
    }
}

impl std::str::FromStr for IncidentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(IncidentStatus::Pending),
            "resolved" => Ok(IncidentStatus::Resolved),
            other => Err(format!("unknown incident status: {other}")),
        }
    }
}
