mod audit;

pub mod authz;
pub mod capacity;
pub mod credentials;
pub mod error;
pub mod gate;
pub mod incidents;
pub mod ledger;
pub mod locks;

pub use capacity::CapacityAdmin;
pub use credentials::CredentialIssuer;
pub use error::CoreError;
pub use gate::{ArrivalOutcome, CheckInReport, CompletionReport, GateEngine, GateRules};
pub use incidents::IncidentDesk;
pub use ledger::{BookingLedger, SlotAvailability};
pub use locks::SlotLocks;
