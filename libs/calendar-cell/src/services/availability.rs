use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::AppointmentStore;

use crate::models::{local_day_start, CalendarError, IntegrationStatus, Slot, WeeklySchedule};
use crate::services::aggregator::EventAggregator;
use crate::services::resolver::AvailabilityResolver;
use crate::services::slots::SlotGenerator;

/// Longest range a single free-slot query may cover.
const MAX_RANGE_DAYS: i64 = 62;

/// Free slots = generated slots minus everything the aggregator reports busy.
pub struct AvailabilityService {
    generator: SlotGenerator,
    aggregator: Arc<EventAggregator>,
    resolver: AvailabilityResolver,
}

impl AvailabilityService {
    pub fn new(generator: SlotGenerator, aggregator: Arc<EventAggregator>, clinic_tz: Tz) -> Self {
        Self {
            generator,
            aggregator,
            resolver: AvailabilityResolver::new(clinic_tz),
        }
    }

    pub fn from_config(config: &AppConfig, store: Arc<dyn AppointmentStore>) -> Result<Self, CalendarError> {
        let schedule = match &config.business_hours {
            Some(raw) => WeeklySchedule::parse(raw)?,
            None => WeeklySchedule::default(),
        };
        let generator = SlotGenerator::new(schedule, Duration::minutes(config.slot_duration_minutes))?;
        let aggregator = EventAggregator::from_config(config, store);

        info!(
            "Availability configured: {} minute slots in {}, sources {:?}",
            config.slot_duration_minutes,
            config.clinic_timezone,
            aggregator.integration_status()
        );

        Ok(Self::new(generator, Arc::new(aggregator), config.clinic_timezone))
    }

    pub fn clinic_tz(&self) -> Tz {
        self.resolver.clinic_tz()
    }

    pub fn generator(&self) -> &SlotGenerator {
        &self.generator
    }

    pub fn integration_status(&self) -> Vec<IntegrationStatus> {
        self.aggregator.integration_status()
    }

    /// Free slots for clinic-local dates in `[start, end)`.
    pub async fn free_slots(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Slot>, CalendarError> {
        if end <= start {
            return Err(CalendarError::InvalidRange(format!("{} is not after {}", end, start)));
        }
        if (end - start).num_days() > MAX_RANGE_DAYS {
            return Err(CalendarError::InvalidRange(format!(
                "at most {} days per query",
                MAX_RANGE_DAYS
            )));
        }

        let candidates = self.generator.generate(start, end);
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let tz = self.clinic_tz();
        let events = self.aggregator
            .collect(local_day_start(tz, start), local_day_start(tz, end))
            .await;

        Ok(self.resolver.resolve(&candidates, &events))
    }

    /// Free slots on one date that have not started by `now`.
    pub async fn free_slots_on(&self, date: NaiveDate, now: DateTime<Utc>) -> Vec<Slot> {
        let Some(next_day) = date.succ_opt() else {
            return Vec::new();
        };

        match self.free_slots(date, next_day).await {
            Ok(slots) => slots
                .into_iter()
                .filter(|slot| {
                    slot.interval_in(self.clinic_tz())
                        .map(|(start, _)| start > now)
                        .unwrap_or(false)
                })
                .collect(),
            Err(e) => {
                warn!("Could not compute free slots for {}: {}", date, e);
                Vec::new()
            }
        }
    }

    /// Live re-check of a single slot against a fresh aggregation.
    pub async fn is_slot_free(&self, slot: &Slot) -> bool {
        let Some((start, end)) = slot.interval_in(self.clinic_tz()) else {
            return false;
        };

        let events = self.aggregator.collect(start, end).await;
        let free = self.resolver.is_free(slot, &events);
        debug!("Live check {} {}: free={}", slot.date, slot.time, free);
        free
    }

    /// The next `count` open business days strictly after `today`.
    pub fn upcoming_open_dates(&self, today: NaiveDate, count: usize) -> Vec<NaiveDate> {
        let schedule = self.generator.schedule();

        today
            .iter_days()
            .skip(1)
            .take(366)
            .filter(|date| schedule.is_open(*date))
            .take(count)
            .collect()
    }
}
