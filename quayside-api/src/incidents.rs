use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quayside_domain::{Incident, IncidentStatus};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub booking_id: Uuid,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub response: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IncidentResponse {
    pub incident_id: Uuid,
    pub booking_id: Uuid,
    pub message: String,
    pub status: IncidentStatus,
    pub response: Option<String>,
}

impl From<Incident> for IncidentResponse {
    fn from(i: Incident) -> Self {
        Self {
            incident_id: i.id,
            booking_id: i.booking_id,
            message: i.message,
            status: i.status,
            response: i.response,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/incidents", post(report))
        .route("/v1/incidents/pending", get(pending))
        .route("/v1/incidents/{id}/resolve", post(resolve))
}

async fn report(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Json(req): Json<ReportRequest>,
) -> Result<(StatusCode, Json<IncidentResponse>), AppError> {
    let incident = state
        .incidents
        .report(&requester, req.booking_id, &req.message)
        .await?;
    Ok((StatusCode::CREATED, Json(incident.into())))
}

async fn pending(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
) -> Result<Json<Vec<IncidentResponse>>, AppError> {
    let incidents = state.incidents.list_pending(&requester).await?;
    Ok(Json(incidents.into_iter().map(Into::into).collect()))
}

async fn resolve(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<IncidentResponse>, AppError> {
    let incident = state.incidents.resolve(&requester, id, req.response).await?;
    Ok(Json(incident.into()))
}
