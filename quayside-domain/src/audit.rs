use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One line in the append-only audit trail. Entries are never mutated or
/// deleted; reporting consumes them elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub code: EventCode,
    pub message: String,
}

/// Enumerated domain event types, matching the codes the terminal's
/// reporting tooling groups on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCode {
    NewBooking,
    ModifiedBooking,
    DeletedBooking,
    CarrierArrived,
    ShipmentConsumed,
    QrGenerated,
    NewIncident,
}

impl EventCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCode::NewBooking => "NEW_BOOKING",
            EventCode::ModifiedBooking => "MODIFIED_BOOKING",
            EventCode::DeletedBooking => "DELETED_BOOKING",
            EventCode::CarrierArrived => "CARRIER_ARRIVED",
            EventCode::ShipmentConsumed => "SHIPMENT_CONSUMED",
            EventCode::QrGenerated => "QR_GENERATED",
            EventCode::NewIncident => "NEW_INCIDENT",
        }
    }
}

impl std::fmt::Display for EventCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW_BOOKING" => Ok(EventCode::NewBooking),
            "MODIFIED_BOOKING" => Ok(EventCode::ModifiedBooking),
            "DELETED_BOOKING" => Ok(EventCode::DeletedBooking),
            "CARRIER_ARRIVED" => Ok(EventCode::CarrierArrived),
            "SHIPMENT_CONSUMED" => Ok(EventCode::ShipmentConsumed),
            "QR_GENERATED" => Ok(EventCode::QrGenerated),
            "NEW_INCIDENT" => Ok(EventCode::NewIncident),
            other => Err(format!("unknown event code: {other}")),
        }
    }
}
