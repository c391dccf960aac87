use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch},
};

use crate::handlers;
use crate::services::{AppointmentLifecycleService, AvailabilityService};

pub struct CalendarState {
    pub availability: Arc<AvailabilityService>,
    pub lifecycle: Arc<AppointmentLifecycleService>,
}

pub fn calendar_routes(state: Arc<CalendarState>) -> Router {
    Router::new()
        .route("/slots", get(handlers::get_free_slots))
        .route("/integrations", get(handlers::get_integration_status))
        .route("/appointments/{appointment_id}/status", patch(handlers::update_appointment_status))
        .with_state(state)
}
