use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use quayside_core::ArrivalOutcome;
use quayside_domain::Role;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CredentialResponse {
    pub qr: String,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub qr: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub booking_id: Uuid,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/gate/credential/{booking_id}", get(get_credential))
        .route("/v1/gate/scan", post(scan))
        .route("/v1/gate/complete", post(complete))
}

async fn get_credential(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<CredentialResponse>, AppError> {
    if requester.role == Role::Operator {
        // Carriers fetch their own credential; operators only scan.
        return Err(AppError::Core(quayside_core::CoreError::Unauthorized));
    }
    let credential = state
        .credentials
        .get_or_create(booking_id, &requester)
        .await?;
    Ok(Json(CredentialResponse {
        qr: credential.token,
    }))
}

async fn scan(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Json(req): Json<ScanRequest>,
) -> Result<Response, AppError> {
    if requester.role == Role::Carrier {
        return Err(AppError::Core(quayside_core::CoreError::Unauthorized));
    }

    let report = state.gate.check_in(&req.qr, Utc::now()).await?;

    // A completed search with no room anywhere is a business failure the
    // operator has to act on, not a fault; it maps to 409.
    if let ArrivalOutcome::NoLateCapacity { suggested_action } = &report.outcome {
        let body = Json(json!({
            "error": "No late capacity available",
            "message": "Truck arrived late and no late slots are available in current or subsequent timeslots",
            "booking_id": report.booking_id,
            "truck_number": report.truck_number,
            "suggested_action": suggested_action,
        }));
        return Ok((StatusCode::CONFLICT, body).into_response());
    }

    Ok(Json(report).into_response())
}

async fn complete(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Json(req): Json<CompleteRequest>,
) -> Result<Response, AppError> {
    let report = state.gate.complete(req.booking_id, &requester).await?;
    Ok(Json(report).into_response())
}
