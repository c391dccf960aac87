use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use locale_cell::Language;
use shared_database::StoreError;

// ==============================================================================
// CONVERSATION STATE
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    #[default]
    None,
    LanguageSelect,
    Booking,
    TalkToClinic,
    LanguageChange,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    None,
    AwaitPatientName,
    AwaitPhone,
    AwaitDate,
    AwaitTime,
    AwaitReason,
    AwaitConfirm,
}

/// Booking data gathered across turns, committed as one appointment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingDraft {
    pub patient_name: Option<String>,
    pub phone: Option<String>,
    pub date: Option<NaiveDate>,
    #[serde(default, with = "optional_hhmm")]
    pub time: Option<NaiveTime>,
    pub reason: Option<String>,
}

impl BookingDraft {
    /// Drops the chosen slot, keeping everything else.
    pub fn clear_slot(&mut self) {
        self.date = None;
        self.time = None;
    }
}

/// Everything the assistant remembers about one user between messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationState {
    pub current_flow: Flow,
    pub current_step: Step,
    #[serde(rename = "language_code")]
    pub language: Option<Language>,
    pub draft: Option<BookingDraft>,
    /// Dates shown with the last date prompt.
    #[serde(default)]
    pub offered_dates: Vec<NaiveDate>,
    /// Times shown with the last time prompt; only these are accepted.
    #[serde(default, with = "hhmm_list")]
    pub offered_times: Vec<NaiveTime>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConversationState {
    /// Starting point for a user seen for the first time.
    pub fn bootstrap() -> Self {
        Self {
            current_flow: Flow::LanguageSelect,
            ..Self::default()
        }
    }

    pub fn is_idle(&self) -> bool {
        self.current_flow == Flow::None
    }

    /// Back to idle, keeping the language. Any draft is discarded.
    pub fn reset_to_idle(&mut self) {
        self.current_flow = Flow::None;
        self.current_step = Step::None;
        self.draft = None;
        self.offered_dates.clear();
        self.offered_times.clear();
    }

    pub fn enter(&mut self, flow: Flow, step: Step) {
        self.current_flow = flow;
        self.current_step = step;
    }

    pub fn draft_mut(&mut self) -> &mut BookingDraft {
        self.draft.get_or_insert_with(BookingDraft::default)
    }
}

mod optional_hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(time) => serializer.serialize_some(&time.format("%H:%M").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveTime>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| super::parse_hhmm(&raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}

mod hhmm_list {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(times: &[NaiveTime], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(times.iter().map(|t| t.format("%H:%M").to_string()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<NaiveTime>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|raw| super::parse_hhmm(raw).map_err(serde::de::Error::custom))
            .collect()
    }
}

fn parse_hhmm(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(raw, "%H:%M").or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
}

// ==============================================================================
// OUTBOUND PAYLOADS
// ==============================================================================

/// Abstract reply; the messaging gateway decides how to render it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Text { text: String },
    Choices { prompt: String, options: Vec<Choice> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    /// Sent back verbatim as the next message when picked.
    pub value: String,
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Payload::Text { text: text.into() }
    }

    pub fn choices(prompt: impl Into<String>, options: Vec<Choice>) -> Self {
        Payload::Choices { prompt: prompt.into(), options }
    }

    /// Prompt or text, whichever this payload carries.
    pub fn body(&self) -> &str {
        match self {
            Payload::Text { text } => text,
            Payload::Choices { prompt, .. } => prompt,
        }
    }
}

impl Choice {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { label: label.into(), value: value.into() }
    }
}

// ==============================================================================
// API TYPES
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    pub user_id: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ReplyBatch {
    pub replies: Vec<Payload>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum BookingError {
    /// Malformed or empty answer; the step is asked again.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The slot was taken between offer and confirmation.
    #[error("Slot no longer available: {0}")]
    Conflict(String),

    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => BookingError::Conflict(msg),
            StoreError::NotFound(msg) | StoreError::Unavailable(msg) => BookingError::Persistence(msg),
        }
    }
}
