use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::debug;

use shared_models::error::AppError;

use crate::models::{BookingError, ConversationState, InboundMessage, ReplyBatch};
use crate::router::ConversationAppState;

fn to_app_error(e: BookingError) -> AppError {
    match e {
        BookingError::Validation(msg) => AppError::ValidationError(msg),
        BookingError::Conflict(msg) => AppError::Conflict(msg),
        BookingError::Persistence(msg) => AppError::Database(msg),
        BookingError::CollaboratorUnavailable(msg) => AppError::ExternalService(msg),
        BookingError::Unexpected(msg) => AppError::Internal(msg),
    }
}

/// Entry point for the messaging gateway: one inbound message in, the
/// ordered replies out.
#[axum::debug_handler]
pub async fn post_message(
    State(state): State<Arc<ConversationAppState>>,
    Json(message): Json<InboundMessage>,
) -> Result<Json<ReplyBatch>, AppError> {
    if message.user_id.trim().is_empty() {
        return Err(AppError::BadRequest("user_id is required".to_string()));
    }
    debug!("Inbound message from {}", message.user_id);

    let replies = state.machine.handle_message(&message.user_id, &message.text).await;
    Ok(Json(ReplyBatch { replies }))
}

#[axum::debug_handler]
pub async fn get_conversation_state(
    State(state): State<Arc<ConversationAppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<ConversationState>, AppError> {
    state.machine
        .conversation_state(&user_id)
        .await
        .map_err(to_app_error)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No conversation for {}", user_id)))
}
