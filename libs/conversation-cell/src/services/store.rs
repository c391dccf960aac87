use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::{StoreError, SupabaseClient};

use crate::models::ConversationState;

/// Persistence for per-user conversation checkpoints.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get_state(&self, user_id: &str) -> Result<Option<ConversationState>, StoreError>;

    async fn set_state(&self, user_id: &str, state: &ConversationState) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct InMemoryConversationStore {
    states: RwLock<HashMap<String, ConversationState>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get_state(&self, user_id: &str) -> Result<Option<ConversationState>, StoreError> {
        Ok(self.states.read().await.get(user_id).cloned())
    }

    async fn set_state(&self, user_id: &str, state: &ConversationState) -> Result<(), StoreError> {
        self.states.write().await.insert(user_id.to_string(), state.clone());
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct StateRow {
    state: ConversationState,
}

/// Rows of `conversation_states (user_id text primary key, state jsonb,
/// updated_at timestamptz)`, written with an upsert.
#[derive(Clone)]
pub struct SupabaseConversationStore {
    supabase: SupabaseClient,
}

impl SupabaseConversationStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl ConversationStore for SupabaseConversationStore {
    async fn get_state(&self, user_id: &str) -> Result<Option<ConversationState>, StoreError> {
        let path = format!(
            "/rest/v1/conversation_states?user_id=eq.{}&select=state",
            urlencoding::encode(user_id)
        );
        let rows: Vec<StateRow> = self.supabase.request(Method::GET, &path, None).await?;

        Ok(rows.into_iter().next().map(|row| row.state))
    }

    async fn set_state(&self, user_id: &str, state: &ConversationState) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut state = state.clone();
        state.updated_at = Some(now);

        let body = json!({
            "user_id": user_id,
            "state": state,
            "updated_at": now,
        });

        let _: Vec<serde_json::Value> = self.supabase
            .request_with_prefer(
                Method::POST,
                "/rest/v1/conversation_states?on_conflict=user_id",
                Some(body),
                Some("resolution=merge-duplicates,return=representation"),
            )
            .await?;

        debug!("Stored conversation state for {}", user_id);
        Ok(())
    }
}
