use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Duration;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;

use crate::models::{CalendarError, SlotQuery, SlotsResponse, UpdateStatusRequest};
use crate::router::CalendarState;

fn to_app_error(e: CalendarError) -> AppError {
    match e {
        CalendarError::InvalidRange(msg) | CalendarError::InvalidSchedule(msg) => AppError::BadRequest(msg),
        CalendarError::AppointmentNotFound(id) => AppError::NotFound(format!("Appointment {} not found", id)),
        CalendarError::InvalidTransition { from, to } => {
            AppError::Conflict(format!("Cannot move appointment from {} to {}", from, to))
        }
        CalendarError::Store(StoreError::Unavailable(msg)) => AppError::Database(msg),
        CalendarError::SourceUnavailable { .. } => AppError::ExternalService(e.to_string()),
        other => AppError::Internal(other.to_string()),
    }
}

#[axum::debug_handler]
pub async fn get_free_slots(
    State(state): State<Arc<CalendarState>>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<SlotsResponse>, AppError> {
    let end = query.end.unwrap_or(query.start + Duration::days(1));

    let slots = state.availability
        .free_slots(query.start, end)
        .await
        .map_err(to_app_error)?;

    Ok(Json(SlotsResponse {
        timezone: state.availability.clinic_tz().name().to_string(),
        slots,
    }))
}

#[axum::debug_handler]
pub async fn get_integration_status(
    State(state): State<Arc<CalendarState>>,
) -> Json<Value> {
    Json(json!({
        "integrations": state.availability.integration_status(),
    }))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<CalendarState>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.lifecycle
        .update_status(appointment_id, request.status)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(appointment)))
}
