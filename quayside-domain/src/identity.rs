use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The already-authenticated caller of a core operation. The core never
/// authenticates; the transport layer resolves the identity and the core
/// checks role and ownership only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub user_id: Uuid,
    pub role: Role,
}

impl Requester {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// The three fixed roles of the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Books slots and presents credentials at the gate.
    Carrier,
    /// Works the gate: scans credentials, completes shipments.
    Operator,
    /// Full access, including capacity config and incident resolution.
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Carrier => "carrier",
            Role::Operator => "operator",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "carrier" => Ok(Role::Carrier),
            "operator" => Ok(Role::Operator),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}
