use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers;
use crate::services::BookingStateMachine;

pub struct ConversationAppState {
    pub machine: Arc<BookingStateMachine>,
}

pub fn conversation_routes(state: Arc<ConversationAppState>) -> Router {
    Router::new()
        .route("/messages", post(handlers::post_message))
        .route("/state/{user_id}", get(handlers::get_conversation_state))
        .with_state(state)
}
