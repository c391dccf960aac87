use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use chrono_tz::Tz;
use icalendar::{Calendar, CalendarComponent, CalendarDateTime, Component, DatePerhapsTime, Event, Property};
use reqwest::Client;
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::models::{local_day_start, localize, CalendarError, CalendarEvent, EventSource, EventStatus};
use crate::services::aggregator::CalendarSource;
use crate::services::recurrence::{expand_occurrences, RecurrenceAnchor};

/// A published iCalendar feed fetched over HTTP.
pub struct IcalFeedSource {
    client: Client,
    url: String,
    enabled: bool,
    clinic_tz: Tz,
}

impl IcalFeedSource {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: super::http_client(),
            url: config.ical_url.clone(),
            enabled: config.is_ical_configured(),
            clinic_tz: config.clinic_timezone,
        }
    }

    async fn download(&self) -> Result<String, CalendarError> {
        let response = self.client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CalendarError::unavailable(EventSource::Ical, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CalendarError::unavailable(EventSource::Ical, format!("feed returned {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| CalendarError::unavailable(EventSource::Ical, e))
    }

    /// Parses a feed body and returns events overlapping the window.
    pub fn parse_feed(&self, body: &str, start: DateTime<Utc>, end: DateTime<Utc>)
        -> Result<Vec<CalendarEvent>, CalendarError> {
        let calendar: Calendar = body
            .parse()
            .map_err(|e| CalendarError::InvalidData(format!("ical feed: {}", e)))?;

        let events = calendar
            .components
            .iter()
            .filter_map(|component| match component {
                CalendarComponent::Event(event) => Some(event),
                _ => None,
            })
            .flat_map(|event| self.normalize(event, start, end))
            .filter(|event| event.overlaps(start, end))
            .collect();

        Ok(events)
    }

    fn resolve(&self, value: &DatePerhapsTime) -> Option<(DateTime<Utc>, RecurrenceAnchor)> {
        match value {
            DatePerhapsTime::DateTime(CalendarDateTime::Utc(instant)) => {
                Some((*instant, RecurrenceAnchor::Utc(*instant)))
            }
            DatePerhapsTime::DateTime(CalendarDateTime::Floating(local)) => {
                let instant = localize(self.clinic_tz, *local)?;
                Some((instant, RecurrenceAnchor::Zoned { local: *local, tzid: self.clinic_tz.name().to_string() }))
            }
            DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
                let zone = tzid.parse::<Tz>().unwrap_or_else(|_| {
                    warn!("Unknown TZID '{}' in feed, using clinic zone", tzid);
                    self.clinic_tz
                });
                let instant = localize(zone, *date_time)?;
                Some((instant, RecurrenceAnchor::Zoned { local: *date_time, tzid: zone.name().to_string() }))
            }
            DatePerhapsTime::Date(date) => {
                let local = date.and_time(NaiveTime::MIN);
                Some((
                    local_day_start(self.clinic_tz, *date),
                    RecurrenceAnchor::Zoned { local, tzid: self.clinic_tz.name().to_string() },
                ))
            }
        }
    }

    fn normalize(&self, event: &Event, window_start: DateTime<Utc>, window_end: DateTime<Utc>)
        -> Vec<CalendarEvent> {
        let uid = event.get_uid().unwrap_or("unknown").to_string();

        let status = match event.property_value("STATUS").map(|s| s.to_ascii_uppercase()) {
            Some(s) if s == "CANCELLED" => return Vec::new(),
            Some(s) if s == "TENTATIVE" => EventStatus::Tentative,
            _ => EventStatus::Confirmed,
        };
        if event.property_value("TRANSP").map(|t| t.eq_ignore_ascii_case("TRANSPARENT")).unwrap_or(false) {
            return Vec::new();
        }

        let Some(start_value) = event.get_start() else {
            debug!("VEVENT {} has no DTSTART, skipping", uid);
            return Vec::new();
        };
        let Some((start, anchor)) = self.resolve(&start_value) else {
            warn!("VEVENT {} has an unusable DTSTART, skipping", uid);
            return Vec::new();
        };

        let end = match event.get_end().as_ref().and_then(|value| self.resolve(value)) {
            Some((end, _)) => end,
            // All-day events without DTEND last one day.
            None => match event.property_value("DURATION").map(parse_duration) {
                Some(Some(length)) => start + length,
                Some(None) => {
                    warn!("VEVENT {} has an unreadable DURATION, skipping", uid);
                    return Vec::new();
                }
                // All-day events without DTEND last one day.
                None if matches!(start_value, DatePerhapsTime::Date(_)) => start + Duration::days(1),
                None => {
                    debug!("VEVENT {} has no usable DTEND or DURATION, skipping", uid);
                    return Vec::new();
                }
            },
        };

        let title = event.get_summary().unwrap_or("Busy").to_string();
        let rules = rule_lines(event);

        let duration = end - start;
        if !rules.iter().any(|r| r.starts_with("RRULE")) {
            return CalendarEvent::new(uid, title, start, end, EventSource::Ical, status)
                .map(|e| vec![e])
                .unwrap_or_else(|e| {
                    warn!("Dropping VEVENT: {}", e);
                    Vec::new()
                });
        }

        let starts = match expand_occurrences(&anchor, &rules, duration, window_start, window_end) {
            Ok(starts) => starts,
            Err(e) => {
                warn!("VEVENT {}: {}, using first occurrence only", uid, e);
                vec![start]
            }
        };

        starts
            .into_iter()
            .filter_map(|occurrence| {
                CalendarEvent::new(
                    format!("{}-{}", uid, occurrence.timestamp()),
                    title.clone(),
                    occurrence,
                    occurrence + duration,
                    EventSource::Ical,
                    status,
                )
                .map_err(|e| warn!("Dropping VEVENT occurrence: {}", e))
                .ok()
            })
            .collect()
    }
}

/// Rebuilds the recurrence content lines of a VEVENT, parameters included.
/// EXDATE and RDATE may repeat, so the parser keeps them apart from RRULE.
fn rule_lines(event: &Event) -> Vec<String> {
    let single = event.properties().get("RRULE").into_iter();
    let repeated = ["EXDATE", "RDATE"]
        .iter()
        .filter_map(|name| event.multi_properties().get(*name))
        .flatten();

    single.chain(repeated).map(content_line).collect()
}

fn content_line(property: &Property) -> String {
    let mut params: Vec<String> = property
        .params()
        .values()
        .map(|param| format!(";{}={}", param.key(), param.value()))
        .collect();
    params.sort();
    format!("{}{}:{}", property.key(), params.concat(), property.value())
}

/// Parses an RFC 5545 DURATION value such as `PT1H30M`, `P1D` or `P2W`.
fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (sign, rest) = match value.as_bytes().first().copied()? {
        b'-' => (-1, &value[1..]),
        b'+' => (1, &value[1..]),
        _ => (1, value),
    };
    let rest = rest.strip_prefix('P').or_else(|| rest.strip_prefix('p'))?;

    let mut total = Duration::zero();
    let mut digits = String::new();
    let mut in_time = false;
    let mut seen_unit = false;
    for c in rest.chars() {
        match c.to_ascii_uppercase() {
            'T' if digits.is_empty() && !in_time => in_time = true,
            d if d.is_ascii_digit() => digits.push(d),
            unit => {
                let amount: i64 = digits.parse().ok()?;
                digits.clear();
                total = total + match (unit, in_time) {
                    ('W', false) => Duration::weeks(amount),
                    ('D', false) => Duration::days(amount),
                    ('H', true) => Duration::hours(amount),
                    ('M', true) => Duration::minutes(amount),
                    ('S', true) => Duration::seconds(amount),
                    _ => return None,
                };
                seen_unit = true;
            }
        }
    }

    if !digits.is_empty() || !seen_unit {
        return None;
    }
    Some(total * sign)
}

#[async_trait]
impl CalendarSource for IcalFeedSource {
    fn provider(&self) -> EventSource {
        EventSource::Ical
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn get_events(&self, start: DateTime<Utc>, end: DateTime<Utc>)
        -> Result<Vec<CalendarEvent>, CalendarError> {
        debug!("Fetching iCal feed {}", self.url);
        let body = self.download().await?;
        self.parse_feed(&body, start, end)
    }
}
