use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A patient known to the clinic, keyed by their chat user id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub preferred_language: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPatient {
    pub user_id: String,
    pub name: String,
    pub phone: String,
    pub preferred_language: Option<String>,
}
