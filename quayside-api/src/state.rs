use std::sync::Arc;

use quayside_core::{
    BookingLedger, CapacityAdmin, CredentialIssuer, GateEngine, IncidentDesk,
};

#[derive(Clone)]
pub struct AuthSettings {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<BookingLedger>,
    pub gate: Arc<GateEngine>,
    pub credentials: Arc<CredentialIssuer>,
    pub incidents: Arc<IncidentDesk>,
    pub capacity: Arc<CapacityAdmin>,
    pub auth: AuthSettings,
}
