use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;

use quayside_core::SlotAvailability;

use crate::error::AppError;
use crate::slot_key;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/timeslots/{date}/{hour}", get(availability))
}

/// Public availability lookup; reports config defaults for slots that do
/// not exist yet without creating them.
async fn availability(
    State(state): State<AppState>,
    Path((date, hour)): Path<(NaiveDate, u8)>,
) -> Result<Json<SlotAvailability>, AppError> {
    let key = slot_key(date, hour)?;
    Ok(Json(state.ledger.availability(key).await?))
}
