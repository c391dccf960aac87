use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::models::{localize, CalendarError, CalendarEvent, EventSource, EventStatus};
use crate::services::aggregator::CalendarSource;
use crate::services::lifecycle::CalendarWriter;

const MAX_PAGES: usize = 20;

#[derive(Debug, Deserialize)]
struct ViewPage {
    #[serde(default)]
    value: Vec<OutlookEvent>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutlookEvent {
    id: String,
    subject: Option<String>,
    #[serde(default)]
    is_cancelled: bool,
    show_as: Option<String>,
    start: OutlookTime,
    end: OutlookTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutlookTime {
    date_time: String,
    time_zone: Option<String>,
}

/// Outlook via Microsoft Graph `calendarView`, which returns recurring
/// series already expanded into occurrences.
pub struct OutlookCalendarSource {
    client: Client,
    base_url: String,
    access_token: String,
    enabled: bool,
    clinic_tz: Tz,
}

impl OutlookCalendarSource {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: super::http_client(),
            base_url: config.outlook_api_base_url.trim_end_matches('/').to_string(),
            access_token: config.outlook_access_token.clone(),
            enabled: config.is_outlook_configured(),
            clinic_tz: config.clinic_timezone,
        }
    }

    async fn fetch(&self, request: reqwest::RequestBuilder) -> Result<ViewPage, CalendarError> {
        let response = request
            .bearer_auth(&self.access_token)
            .header("Prefer", "outlook.timezone=\"UTC\"")
            .send()
            .await
            .map_err(|e| CalendarError::unavailable(EventSource::Outlook, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CalendarError::unavailable(EventSource::Outlook, format!("{}: {}", status, body)));
        }

        response
            .json::<ViewPage>()
            .await
            .map_err(|e| CalendarError::InvalidData(format!("outlook calendarView: {}", e)))
    }

    /// Graph reports `dateTime` without an offset; `timeZone` says how to read it.
    fn to_instant(time: &OutlookTime) -> Option<DateTime<Utc>> {
        let naive = NaiveDateTime::parse_from_str(&time.date_time, "%Y-%m-%dT%H:%M:%S%.f").ok()?;

        match time.time_zone.as_deref() {
            None | Some("UTC") | Some("Etc/UTC") => Some(Utc.from_utc_datetime(&naive)),
            Some(name) => match name.parse::<Tz>() {
                Ok(tz) => localize(tz, naive),
                Err(_) => {
                    warn!("Unknown Outlook time zone '{}', reading as UTC", name);
                    Some(Utc.from_utc_datetime(&naive))
                }
            },
        }
    }

    fn normalize(event: OutlookEvent) -> Option<CalendarEvent> {
        if event.is_cancelled || event.show_as.as_deref() == Some("free") {
            return None;
        }

        let start = Self::to_instant(&event.start)?;
        let end = Self::to_instant(&event.end)?;
        let status = if event.show_as.as_deref() == Some("tentative") {
            EventStatus::Tentative
        } else {
            EventStatus::Confirmed
        };

        CalendarEvent::new(
            event.id,
            event.subject.unwrap_or_else(|| "Busy".to_string()),
            start,
            end,
            EventSource::Outlook,
            status,
        )
        .map_err(|e| warn!("Dropping Outlook event: {}", e))
        .ok()
    }
}

#[async_trait]
impl CalendarSource for OutlookCalendarSource {
    fn provider(&self) -> EventSource {
        EventSource::Outlook
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn get_events(&self, start: DateTime<Utc>, end: DateTime<Utc>)
        -> Result<Vec<CalendarEvent>, CalendarError> {
        debug!("Fetching Outlook calendarView for {}..{}", start, end);

        let first = self.client
            .get(format!("{}/me/calendarView", self.base_url))
            .query(&[
                ("startDateTime", start.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("endDateTime", end.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("$top", "500".to_string()),
            ]);

        let mut page = self.fetch(first).await?;
        let mut events: Vec<CalendarEvent> = Vec::new();

        for _ in 0..MAX_PAGES {
            events.extend(page.value.drain(..).filter_map(Self::normalize));

            match page.next_link.take() {
                Some(link) => page = self.fetch(self.client.get(link)).await?,
                None => break,
            }
        }

        Ok(events)
    }
}

#[async_trait]
impl CalendarWriter for OutlookCalendarSource {
    fn target(&self) -> EventSource {
        EventSource::Outlook
    }

    async fn create_event(&self, title: &str, description: &str, start: DateTime<Utc>, end: DateTime<Utc>)
        -> Result<String, CalendarError> {
        let body = json!({
            "subject": title,
            "body": { "contentType": "text", "content": description },
            "start": { "dateTime": start.format("%Y-%m-%dT%H:%M:%S").to_string(), "timeZone": "UTC" },
            "end": { "dateTime": end.format("%Y-%m-%dT%H:%M:%S").to_string(), "timeZone": "UTC" },
        });

        let response = self.client
            .post(format!("{}/me/events", self.base_url))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CalendarError::unavailable(EventSource::Outlook, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CalendarError::unavailable(EventSource::Outlook, format!("{}: {}", status, text)));
        }

        let created: Value = response
            .json()
            .await
            .map_err(|e| CalendarError::InvalidData(format!("outlook create: {}", e)))?;

        debug!("Outlook event created for {}", start.with_timezone(&self.clinic_tz));
        Ok(created["id"].as_str().unwrap_or_default().to_string())
    }
}
