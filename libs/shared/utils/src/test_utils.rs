use std::sync::Arc;

use serde_json::json;

use shared_config::AppConfig;

/// Builds an `AppConfig` pointing every collaborator at a mock server.
pub struct TestConfig {
    pub base_url: String,
    pub supabase_anon_key: String,
    pub clinic_line_user_id: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            clinic_line_user_id: "Uclinic".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.base_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            google_api_base_url: self.base_url.clone(),
            google_access_token: "google-token".to_string(),
            outlook_api_base_url: self.base_url.clone(),
            outlook_access_token: "outlook-token".to_string(),
            ical_url: format!("{}/calendar.ics", self.base_url),
            line_api_base_url: self.base_url.clone(),
            line_channel_access_token: "line-token".to_string(),
            clinic_line_user_id: self.clinic_line_user_id.clone(),
            openai_base_url: self.base_url.clone(),
            openai_api_key: "openai-key".to_string(),
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct MockCalendarResponses;

impl MockCalendarResponses {
    pub fn google_event(id: &str, start: &str, end: &str) -> serde_json::Value {
        json!({
            "id": id,
            "status": "confirmed",
            "summary": "Staff meeting",
            "start": { "dateTime": start },
            "end": { "dateTime": end }
        })
    }

    pub fn outlook_event(id: &str, start: &str, end: &str) -> serde_json::Value {
        json!({
            "id": id,
            "subject": "Vendor visit",
            "isCancelled": false,
            "start": { "dateTime": start, "timeZone": "UTC" },
            "end": { "dateTime": end, "timeZone": "UTC" }
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "error": {
                "message": message,
                "code": code
            }
        })
    }
}
