use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_database::AppointmentStore;

use crate::models::{CalendarError, CalendarEvent, EventSource, IntegrationStatus};
use crate::services::sources::{BookingsSource, GoogleCalendarSource, IcalFeedSource, OutlookCalendarSource};

const SOURCE_TIMEOUT: Duration = Duration::from_secs(15);

/// A calendar whose events can block a slot.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    fn provider(&self) -> EventSource;

    fn is_enabled(&self) -> bool;

    /// Events overlapping `[start, end)`, with recurring series already expanded.
    async fn get_events(&self, start: DateTime<Utc>, end: DateTime<Utc>)
        -> Result<Vec<CalendarEvent>, CalendarError>;
}

/// Merges events from every enabled source into one fresh, uncached snapshot.
pub struct EventAggregator {
    sources: Vec<Arc<dyn CalendarSource>>,
    timeout: Duration,
}

impl Default for EventAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl EventAggregator {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            timeout: SOURCE_TIMEOUT,
        }
    }

    /// Registers the persisted bookings plus every provider named in config.
    /// Providers stay registered when disabled so status can be reported.
    pub fn from_config(config: &AppConfig, store: Arc<dyn AppointmentStore>) -> Self {
        let tz = config.clinic_timezone;
        let slot_minutes = chrono::Duration::minutes(config.slot_duration_minutes);

        Self::new()
            .with_source(Arc::new(BookingsSource::new(store, tz, slot_minutes)))
            .with_source(Arc::new(GoogleCalendarSource::new(config)))
            .with_source(Arc::new(OutlookCalendarSource::new(config)))
            .with_source(Arc::new(IcalFeedSource::new(config)))
    }

    pub fn with_source(mut self, source: Arc<dyn CalendarSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn integration_status(&self) -> Vec<IntegrationStatus> {
        self.sources
            .iter()
            .map(|source| IntegrationStatus {
                provider: source.provider(),
                enabled: source.is_enabled(),
            })
            .collect()
    }

    /// Events from all enabled sources overlapping `[start, end)`.
    ///
    /// Never fails: a source that errors or times out is logged and left out.
    pub async fn collect(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<CalendarEvent> {
        if start >= end {
            return Vec::new();
        }

        let fetches = self
            .sources
            .iter()
            .filter(|source| source.is_enabled())
            .map(|source| async move {
                let provider = source.provider();
                let outcome = match tokio::time::timeout(self.timeout, source.get_events(start, end)).await {
                    Ok(result) => result,
                    Err(_) => Err(CalendarError::unavailable(provider, "timed out")),
                };
                (provider, outcome)
            });

        let mut merged = Vec::new();
        for (provider, outcome) in join_all(fetches).await {
            match outcome {
                Ok(events) => {
                    debug!("{} returned {} events", provider, events.len());
                    merged.extend(events.into_iter().filter(|e| e.overlaps(start, end)));
                }
                Err(e) => {
                    warn!("Skipping calendar source {}: {}", provider, e);
                }
            }
        }

        debug!("Aggregated {} events for {}..{}", merged.len(), start, end);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::models::EventStatus;

    struct FixedSource {
        provider: EventSource,
        enabled: bool,
        events: Vec<CalendarEvent>,
    }

    #[async_trait]
    impl CalendarSource for FixedSource {
        fn provider(&self) -> EventSource {
            self.provider
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        async fn get_events(&self, _start: DateTime<Utc>, _end: DateTime<Utc>)
            -> Result<Vec<CalendarEvent>, CalendarError> {
            Ok(self.events.clone())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl CalendarSource for BrokenSource {
        fn provider(&self) -> EventSource {
            EventSource::Outlook
        }

        fn is_enabled(&self) -> bool {
            true
        }

        async fn get_events(&self, _start: DateTime<Utc>, _end: DateTime<Utc>)
            -> Result<Vec<CalendarEvent>, CalendarError> {
            Err(CalendarError::unavailable(EventSource::Outlook, "503 Service Unavailable"))
        }
    }

    struct HangingSource;

    #[async_trait]
    impl CalendarSource for HangingSource {
        fn provider(&self) -> EventSource {
            EventSource::Ical
        }

        fn is_enabled(&self) -> bool {
            true
        }

        async fn get_events(&self, _start: DateTime<Utc>, _end: DateTime<Utc>)
            -> Result<Vec<CalendarEvent>, CalendarError> {
            futures::future::pending().await
        }
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, h, 0, 0).unwrap()
    }

    fn event(id: &str, provider: EventSource, start: u32, end: u32) -> CalendarEvent {
        CalendarEvent::new(id, id, at(start), at(end), provider, EventStatus::Confirmed).unwrap()
    }

    fn fixed(provider: EventSource, enabled: bool, events: Vec<CalendarEvent>) -> Arc<dyn CalendarSource> {
        Arc::new(FixedSource { provider, enabled, events })
    }

    #[tokio::test]
    async fn merges_enabled_sources() {
        let aggregator = EventAggregator::new()
            .with_source(fixed(EventSource::Google, true, vec![event("g1", EventSource::Google, 1, 2)]))
            .with_source(fixed(EventSource::Bookings, true, vec![event("b1", EventSource::Bookings, 3, 4)]));

        let mut ids: Vec<String> = aggregator.collect(at(0), at(23)).await
            .iter().map(|e| e.id().to_string()).collect();
        ids.sort();

        assert_eq!(ids, vec!["b1", "g1"]);
    }

    #[tokio::test]
    async fn disabled_sources_are_not_queried() {
        let aggregator = EventAggregator::new()
            .with_source(fixed(EventSource::Google, false, vec![event("g1", EventSource::Google, 1, 2)]));

        assert!(aggregator.collect(at(0), at(23)).await.is_empty());
        assert_eq!(
            aggregator.integration_status(),
            vec![IntegrationStatus { provider: EventSource::Google, enabled: false }]
        );
    }

    #[tokio::test]
    async fn failing_source_is_excluded_not_fatal() {
        let aggregator = EventAggregator::new()
            .with_source(Arc::new(BrokenSource))
            .with_source(fixed(EventSource::Ical, true, vec![event("i1", EventSource::Ical, 5, 6)]));

        let events = aggregator.collect(at(0), at(23)).await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source(), EventSource::Ical);
    }

    #[tokio::test]
    async fn hanging_source_times_out() {
        let aggregator = EventAggregator::new()
            .with_timeout(Duration::from_millis(50))
            .with_source(Arc::new(HangingSource))
            .with_source(fixed(EventSource::Google, true, vec![event("g1", EventSource::Google, 1, 2)]));

        let events = aggregator.collect(at(0), at(23)).await;

        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn events_outside_window_are_dropped() {
        let aggregator = EventAggregator::new()
            .with_source(fixed(EventSource::Google, true, vec![
                event("early", EventSource::Google, 1, 2),
                event("edge", EventSource::Google, 2, 3),
                event("inside", EventSource::Google, 3, 5),
            ]));

        let events = aggregator.collect(at(3), at(4)).await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id(), "inside");
    }

    #[tokio::test]
    async fn empty_window_returns_nothing() {
        let aggregator = EventAggregator::new()
            .with_source(fixed(EventSource::Google, true, vec![event("g1", EventSource::Google, 1, 2)]));

        assert!(aggregator.collect(at(5), at(5)).await.is_empty());
    }
}
