pub mod audit;
pub mod booking;
pub mod capacity;
pub mod credential;
pub mod identity;
pub mod incident;
pub mod repository;
pub mod timeslot;

pub use audit::{AuditEntry, EventCode};
pub use booking::{Booking, BookingStatus};
pub use capacity::CapacityConfig;
pub use credential::GateCredential;
pub use identity::{Requester, Role};
pub use incident::{Incident, IncidentStatus};
pub use repository::{StoreError, TerminalStore};
pub use timeslot::{SlotKey, Timeslot};
