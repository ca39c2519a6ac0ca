use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use quayside_domain::CapacityConfig;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateCapacityRequest {
    pub capacity: i32,
    pub late_capacity: i32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/config/capacity", get(get_capacity))
        .route("/v1/config/capacity", put(update_capacity))
}

async fn get_capacity(
    State(state): State<AppState>,
    AuthUser(_requester): AuthUser,
) -> Result<Json<CapacityConfig>, AppError> {
    Ok(Json(state.capacity.current().await?))
}

/// Changes the defaults applied to newly created slots; existing slots are
/// untouched.
async fn update_capacity(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Json(req): Json<UpdateCapacityRequest>,
) -> Result<Json<CapacityConfig>, AppError> {
    let updated = state
        .capacity
        .update(
            &requester,
            CapacityConfig::new(req.capacity, req.late_capacity),
        )
        .await?;
    Ok(Json(updated))
}
