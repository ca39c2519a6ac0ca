use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque gate credential bound 1:1 to a booking. The token is what the
/// carrier presents (as a QR code) at the gate; it is unguessable and the
/// only live credential for its booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateCredential {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

impl GateCredential {
    pub fn new(booking_id: Uuid, token: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            token,
            created_at: Utc::now(),
        }
    }
}
