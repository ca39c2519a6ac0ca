use std::sync::Arc;

use axum::{http::Method, Router};
use chrono::NaiveDate;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use quayside_core::{
    BookingLedger, CapacityAdmin, CredentialIssuer, GateEngine, GateRules, IncidentDesk,
    SlotLocks,
};
use quayside_domain::{SlotKey, TerminalStore};

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod error;
pub mod gate;
pub mod incidents;
pub mod state;
pub mod timeslots;


pub use state::{AppState, AuthSettings};

use error::AppError;

/// Wires the core services over one store. The slot lock registry is shared
/// by the ledger and the gate engine so all capacity checks against a slot
/// serialize with each other.
pub fn build_state(
    store: Arc<dyn TerminalStore>,
    rules: GateRules,
    auth: AuthSettings,
) -> AppState {
    let locks = Arc::new(SlotLocks::new());
    AppState {
        ledger: Arc::new(BookingLedger::new(Arc::clone(&store), Arc::clone(&locks))),
        gate: Arc::new(GateEngine::new(Arc::clone(&store), locks, rules)),
        credentials: Arc::new(CredentialIssuer::new(Arc::clone(&store))),
        incidents: Arc::new(IncidentDesk::new(Arc::clone(&store))),
        capacity: Arc::new(CapacityAdmin::new(store)),
        auth,
    }
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    Router::new()
        .merge(bookings::routes())
        .merge(gate::routes())
        .merge(timeslots::routes())
        .merge(incidents::routes())
        .merge(admin::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub(crate) fn slot_key(date: NaiveDate, hour: u8) -> Result<SlotKey, AppError> {
    if hour > 23 {
        return Err(AppError::BadRequest(format!(
            "hour_start must be 0..=23, got {hour}"
        )));
    }
    Ok(SlotKey::new(date, hour))
}
