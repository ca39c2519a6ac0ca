use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quayside_domain::{Booking, BookingStatus};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::slot_key;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub truck_number: String,
    pub date: NaiveDate,
    pub hour_start: u8,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub booking_id: Uuid,
    pub truck_number: String,
    pub timeslot_id: Uuid,
    pub status: BookingStatus,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            booking_id: b.id,
            truck_number: b.truck_number,
            timeslot_id: b.timeslot_id,
            status: b.status,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub date: NaiveDate,
    pub hour_start: u8,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking))
        .route("/v1/bookings/mine", get(my_bookings))
        .route("/v1/bookings/mine/{date}/{hour}", get(my_bookings_in_slot))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/status", put(update_status))
        .route("/v1/bookings/{id}/reschedule", put(reschedule))
        .route("/v1/bookings/{id}", delete(delete_booking))
}

async fn create_booking(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let key = slot_key(req.date, req.hour_start)?;
    let booking = state
        .ledger
        .create(&requester, &req.truck_number, key)
        .await?;
    Ok((StatusCode::CREATED, Json(booking.into())))
}

async fn get_booking(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state.ledger.get(id, &requester).await?;
    Ok(Json(booking.into()))
}

async fn my_bookings(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let bookings = state.ledger.list_for_user(&requester).await?;
    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

async fn my_bookings_in_slot(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Path((date, hour)): Path<(NaiveDate, u8)>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let key = slot_key(date, hour)?;
    let bookings = state
        .ledger
        .list_for_user_in_slot(&requester, key)
        .await?;
    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

async fn update_status(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state
        .ledger
        .update_status(id, &requester, req.status)
        .await?;
    Ok(Json(booking.into()))
}

async fn reschedule(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<RescheduleRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let key = slot_key(req.date, req.hour_start)?;
    let booking = state.ledger.reschedule(id, &requester, key).await?;
    Ok(Json(booking.into()))
}

async fn delete_booking(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.ledger.delete(id, &requester).await?;
    Ok(StatusCode::NO_CONTENT)
}
