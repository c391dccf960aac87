use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use calendar_cell::router::{calendar_routes, CalendarState};
use conversation_cell::router::{conversation_routes, ConversationAppState};

pub fn create_router(calendar: Arc<CalendarState>, conversation: Arc<ConversationAppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic booking assistant is running!" }))
        .nest("/calendar", calendar_routes(calendar))
        .nest("/conversation", conversation_routes(conversation))
}
