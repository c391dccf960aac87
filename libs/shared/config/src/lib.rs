use std::env;
use std::str::FromStr;

use chrono_tz::Tz;
use tracing::warn;

pub const DEFAULT_CLINIC_TIMEZONE: Tz = chrono_tz::Asia::Tokyo;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,

    pub clinic_timezone: Tz,
    pub slot_duration_minutes: i64,
    pub booking_window_days: u32,
    pub default_language: String,
    /// Raw weekly table, e.g. `mon=09:00-18:00/12:00-13:00;sat=closed`.
    pub business_hours: Option<String>,

    pub google_calendar_enabled: bool,
    pub google_calendar_id: String,
    pub google_access_token: String,
    pub google_api_base_url: String,

    pub outlook_calendar_enabled: bool,
    pub outlook_access_token: String,
    pub outlook_api_base_url: String,

    pub ical_calendar_enabled: bool,
    pub ical_url: String,

    pub line_channel_access_token: String,
    pub line_api_base_url: String,
    pub clinic_line_user_id: String,

    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,

    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            clinic_timezone: DEFAULT_CLINIC_TIMEZONE,
            slot_duration_minutes: 30,
            booking_window_days: 7,
            default_language: "ja".to_string(),
            business_hours: None,
            google_calendar_enabled: false,
            google_calendar_id: "primary".to_string(),
            google_access_token: String::new(),
            google_api_base_url: "https://www.googleapis.com/calendar/v3".to_string(),
            outlook_calendar_enabled: false,
            outlook_access_token: String::new(),
            outlook_api_base_url: "https://graph.microsoft.com/v1.0".to_string(),
            ical_calendar_enabled: false,
            ical_url: String::new(),
            line_channel_access_token: String::new(),
            line_api_base_url: "https://api.line.me".to_string(),
            clinic_line_user_id: String::new(),
            openai_api_key: String::new(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, falling back to in-memory stores");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_KEY not set, using empty value");
                    String::new()
                }),
            clinic_timezone: env::var("CLINIC_TIMEZONE")
                .ok()
                .and_then(|raw| match Tz::from_str(&raw) {
                    Ok(tz) => Some(tz),
                    Err(_) => {
                        warn!("CLINIC_TIMEZONE '{}' is not a valid IANA zone, using default", raw);
                        None
                    }
                })
                .unwrap_or(defaults.clinic_timezone),
            slot_duration_minutes: parse_or("SLOT_DURATION_MINUTES", defaults.slot_duration_minutes)
                .max(1),
            booking_window_days: parse_or("BOOKING_WINDOW_DAYS", defaults.booking_window_days),
            default_language: env::var("DEFAULT_LANGUAGE").unwrap_or(defaults.default_language),
            business_hours: env::var("BUSINESS_HOURS").ok().filter(|v| !v.trim().is_empty()),

            google_calendar_enabled: flag("GOOGLE_CALENDAR_ENABLED"),
            google_calendar_id: env::var("GOOGLE_CALENDAR_ID").unwrap_or(defaults.google_calendar_id),
            google_access_token: env::var("GOOGLE_ACCESS_TOKEN").unwrap_or_default(),
            google_api_base_url: env::var("GOOGLE_API_BASE_URL").unwrap_or(defaults.google_api_base_url),

            outlook_calendar_enabled: flag("OUTLOOK_CALENDAR_ENABLED"),
            outlook_access_token: env::var("OUTLOOK_ACCESS_TOKEN").unwrap_or_default(),
            outlook_api_base_url: env::var("OUTLOOK_API_BASE_URL").unwrap_or(defaults.outlook_api_base_url),

            ical_calendar_enabled: flag("ICAL_CALENDAR_ENABLED"),
            ical_url: env::var("ICAL_URL").unwrap_or_default(),

            line_channel_access_token: env::var("LINE_CHANNEL_ACCESS_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("LINE_CHANNEL_ACCESS_TOKEN not set, notifications will only be logged");
                    String::new()
                }),
            line_api_base_url: env::var("LINE_API_BASE_URL").unwrap_or(defaults.line_api_base_url),
            clinic_line_user_id: env::var("CLINIC_LINE_USER_ID").unwrap_or_default(),

            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_base_url: env::var("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            openai_model: env::var("OPENAI_MODEL").unwrap_or(defaults.openai_model),

            port: parse_or("PORT", defaults.port),
        };

        if config.google_calendar_enabled && config.google_access_token.is_empty() {
            warn!("GOOGLE_CALENDAR_ENABLED is set but GOOGLE_ACCESS_TOKEN is missing");
        }
        if config.outlook_calendar_enabled && config.outlook_access_token.is_empty() {
            warn!("OUTLOOK_CALENDAR_ENABLED is set but OUTLOOK_ACCESS_TOKEN is missing");
        }
        if config.ical_calendar_enabled && config.ical_url.is_empty() {
            warn!("ICAL_CALENDAR_ENABLED is set but ICAL_URL is missing");
        }

        config
    }

    /// Supabase persistence is used only when both values are present.
    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }

    pub fn is_google_configured(&self) -> bool {
        self.google_calendar_enabled && !self.google_access_token.is_empty()
    }

    pub fn is_outlook_configured(&self) -> bool {
        self.outlook_calendar_enabled && !self.outlook_access_token.is_empty()
    }

    pub fn is_ical_configured(&self) -> bool {
        self.ical_calendar_enabled && !self.ical_url.is_empty()
    }

    pub fn is_line_configured(&self) -> bool {
        !self.line_channel_access_token.is_empty()
    }

    pub fn is_translation_configured(&self) -> bool {
        !self.openai_api_key.is_empty()
    }
}

fn flag(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_a_tokyo_clinic() {
        let config = AppConfig::default();

        assert_eq!(config.clinic_timezone, chrono_tz::Asia::Tokyo);
        assert_eq!(config.slot_duration_minutes, 30);
        assert_eq!(config.booking_window_days, 7);
        assert_eq!(config.default_language, "ja");
        assert!(!config.is_configured());
        assert!(!config.is_google_configured());
    }

    #[test]
    fn enabled_source_needs_credentials() {
        let config = AppConfig {
            outlook_calendar_enabled: true,
            ..AppConfig::default()
        };
        assert!(!config.is_outlook_configured());

        let config = AppConfig {
            outlook_access_token: "token".to_string(),
            ..config
        };
        assert!(config.is_outlook_configured());
    }
}
