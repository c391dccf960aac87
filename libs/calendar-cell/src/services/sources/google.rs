use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::models::{local_day_start, CalendarError, CalendarEvent, EventSource, EventStatus};
use crate::services::aggregator::CalendarSource;
use crate::services::lifecycle::CalendarWriter;
use crate::services::recurrence::{expand_occurrences, RecurrenceAnchor};

const PAGE_SIZE: &str = "250";
const MAX_PAGES: usize = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsPage {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEvent {
    id: String,
    recurring_event_id: Option<String>,
    original_start_time: Option<GoogleTime>,
    status: Option<String>,
    summary: Option<String>,
    transparency: Option<String>,
    start: Option<GoogleTime>,
    end: Option<GoogleTime>,
    #[serde(default)]
    recurrence: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleTime {
    date_time: Option<String>,
    date: Option<NaiveDate>,
    time_zone: Option<String>,
}

/// Google Calendar over the v3 REST API. Recurring masters are requested
/// unexpanded and expanded locally.
pub struct GoogleCalendarSource {
    client: Client,
    base_url: String,
    calendar_id: String,
    access_token: String,
    enabled: bool,
    clinic_tz: Tz,
}

impl GoogleCalendarSource {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: super::http_client(),
            base_url: config.google_api_base_url.trim_end_matches('/').to_string(),
            calendar_id: config.google_calendar_id.clone(),
            access_token: config.google_access_token.clone(),
            enabled: config.is_google_configured(),
            clinic_tz: config.clinic_timezone,
        }
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(&self.calendar_id)
        )
    }

    async fn fetch_page(&self, start: DateTime<Utc>, end: DateTime<Utc>, page_token: Option<&str>)
        -> Result<EventsPage, CalendarError> {
        let mut query = vec![
            ("timeMin", start.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("timeMax", end.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("singleEvents", "false".to_string()),
            ("maxResults", PAGE_SIZE.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let response = self.client
            .get(self.events_url())
            .bearer_auth(&self.access_token)
            .query(&query)
            .send()
            .await
            .map_err(|e| CalendarError::unavailable(EventSource::Google, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CalendarError::unavailable(EventSource::Google, format!("{}: {}", status, body)));
        }

        response
            .json::<EventsPage>()
            .await
            .map_err(|e| CalendarError::InvalidData(format!("google events: {}", e)))
    }

    /// Instant and recurrence anchor for one side of an event.
    fn resolve_time(&self, time: &GoogleTime) -> Option<(DateTime<Utc>, RecurrenceAnchor)> {
        if let Some(raw) = &time.date_time {
            let parsed = DateTime::parse_from_rfc3339(raw).ok()?;
            let zone = time.time_zone.as_deref()
                .and_then(|name| name.parse::<Tz>().ok())
                .unwrap_or(self.clinic_tz);
            let anchor = RecurrenceAnchor::Zoned {
                local: parsed.with_timezone(&zone).naive_local(),
                tzid: zone.name().to_string(),
            };
            return Some((parsed.with_timezone(&Utc), anchor));
        }

        // All-day events occupy whole clinic-local days.
        let date = time.date?;
        let start = local_day_start(self.clinic_tz, date);
        let anchor = RecurrenceAnchor::Zoned {
            local: date.and_time(chrono::NaiveTime::MIN),
            tzid: self.clinic_tz.name().to_string(),
        };
        Some((start, anchor))
    }

    /// Original start instants of modified or cancelled instances, keyed by
    /// the recurring master they belong to.
    fn exception_starts(&self, items: &[GoogleEvent]) -> HashMap<String, HashSet<DateTime<Utc>>> {
        let mut exceptions: HashMap<String, HashSet<DateTime<Utc>>> = HashMap::new();
        for item in items {
            let (Some(master), Some(original)) = (&item.recurring_event_id, &item.original_start_time) else {
                continue;
            };
            match self.resolve_time(original) {
                Some((instant, _)) => {
                    exceptions.entry(master.clone()).or_default().insert(instant);
                }
                None => warn!("Google exception {} has an unreadable originalStartTime", item.id),
            }
        }
        exceptions
    }

    fn normalize(
        &self,
        event: GoogleEvent,
        overridden: Option<&HashSet<DateTime<Utc>>>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Vec<CalendarEvent> {
        if event.status.as_deref() == Some("cancelled") || event.transparency.as_deref() == Some("transparent") {
            return Vec::new();
        }

        let (Some(start), Some(end)) = (event.start.as_ref(), event.end.as_ref()) else {
            debug!("Google event {} has no start/end, skipping", event.id);
            return Vec::new();
        };
        let (Some((start, anchor)), Some((end, _))) = (self.resolve_time(start), self.resolve_time(end)) else {
            warn!("Google event {} has unreadable times, skipping", event.id);
            return Vec::new();
        };

        let title = event.summary.clone().unwrap_or_else(|| "Busy".to_string());
        let status = if event.status.as_deref() == Some("tentative") {
            EventStatus::Tentative
        } else {
            EventStatus::Confirmed
        };

        let starts = if event.recurrence.is_empty() {
            vec![start]
        } else {
            match expand_occurrences(&anchor, &event.recurrence, end - start, window_start, window_end) {
                Ok(starts) => starts,
                Err(e) => {
                    warn!("Google event {}: {}, using first occurrence only", event.id, e);
                    vec![start]
                }
            }
        };
        let duration = end - start;
        let recurring = !event.recurrence.is_empty();

        starts
            .into_iter()
            .filter(|occurrence| !overridden.map_or(false, |set| set.contains(occurrence)))
            .filter_map(|occurrence| {
                let id = if recurring {
                    format!("{}_{}", event.id, occurrence.format("%Y%m%dT%H%M%SZ"))
                } else {
                    event.id.clone()
                };
                CalendarEvent::new(id, title.clone(), occurrence, occurrence + duration, EventSource::Google, status)
                    .map_err(|e| warn!("Dropping Google event: {}", e))
                    .ok()
            })
            .collect()
    }
}

#[async_trait]
impl CalendarSource for GoogleCalendarSource {
    fn provider(&self) -> EventSource {
        EventSource::Google
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn get_events(&self, start: DateTime<Utc>, end: DateTime<Utc>)
        -> Result<Vec<CalendarEvent>, CalendarError> {
        debug!("Fetching Google events for {}..{}", start, end);

        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let page = self.fetch_page(start, end, page_token.as_deref()).await?;
            items.extend(page.items);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        // Exceptions may arrive on a different page than their master.
        let exceptions = self.exception_starts(&items);
        let events = items
            .into_iter()
            .flat_map(|item| {
                let overridden = exceptions.get(&item.id);
                self.normalize(item, overridden, start, end)
            })
            .collect();

        Ok(events)
    }
}

#[async_trait]
impl CalendarWriter for GoogleCalendarSource {
    fn target(&self) -> EventSource {
        EventSource::Google
    }

    async fn create_event(&self, title: &str, description: &str, start: DateTime<Utc>, end: DateTime<Utc>)
        -> Result<String, CalendarError> {
        let tz = self.clinic_tz.name();
        let body = json!({
            "summary": title,
            "description": description,
            "start": { "dateTime": start.with_timezone(&self.clinic_tz).to_rfc3339(), "timeZone": tz },
            "end": { "dateTime": end.with_timezone(&self.clinic_tz).to_rfc3339(), "timeZone": tz },
        });

        let response = self.client
            .post(self.events_url())
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CalendarError::unavailable(EventSource::Google, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CalendarError::unavailable(EventSource::Google, format!("{}: {}", status, text)));
        }

        let created: Value = response
            .json()
            .await
            .map_err(|e| CalendarError::InvalidData(format!("google create: {}", e)))?;

        Ok(created["id"].as_str().unwrap_or_default().to_string())
    }
}
