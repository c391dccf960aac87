use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

use shared_database::AppointmentStore;
use shared_models::{Appointment, AppointmentStatus};

use crate::models::{localize, CalendarError, CalendarEvent, EventSource, EventStatus};
use crate::services::aggregator::CalendarSource;

/// Persisted appointments seen as calendar events. Always enabled.
pub struct BookingsSource {
    store: Arc<dyn AppointmentStore>,
    clinic_tz: Tz,
    duration: Duration,
}

impl BookingsSource {
    pub fn new(store: Arc<dyn AppointmentStore>, clinic_tz: Tz, duration: Duration) -> Self {
        Self { store, clinic_tz, duration }
    }

    fn to_event(&self, appointment: &Appointment) -> Option<CalendarEvent> {
        let status = match appointment.status {
            AppointmentStatus::Confirmed => EventStatus::Confirmed,
            AppointmentStatus::Pending => EventStatus::Tentative,
            AppointmentStatus::Cancelled => return None,
        };

        let start = localize(self.clinic_tz, appointment.date.and_time(appointment.time))?;
        let title = format!(
            "Appointment: {}",
            appointment.patient_name.as_deref().unwrap_or("patient")
        );

        match CalendarEvent::new(
            appointment.id.to_string(),
            title,
            start,
            start + self.duration,
            EventSource::Bookings,
            status,
        ) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Skipping appointment {}: {}", appointment.id, e);
                None
            }
        }
    }
}

#[async_trait]
impl CalendarSource for BookingsSource {
    fn provider(&self) -> EventSource {
        EventSource::Bookings
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn get_events(&self, start: DateTime<Utc>, end: DateTime<Utc>)
        -> Result<Vec<CalendarEvent>, CalendarError> {
        // Local dates covering the window, end exclusive.
        let first_day = start.with_timezone(&self.clinic_tz).date_naive();
        let last_day = (end - Duration::nanoseconds(1)).with_timezone(&self.clinic_tz).date_naive();
        let day_after = last_day.succ_opt().unwrap_or(last_day);

        let appointments = self.store
            .get_appointments_by_range(first_day, day_after)
            .await
            .map_err(|e| CalendarError::unavailable(EventSource::Bookings, e))?;

        let events: Vec<CalendarEvent> = appointments
            .iter()
            .filter_map(|appointment| self.to_event(appointment))
            .filter(|event| event.overlaps(start, end))
            .collect();

        debug!("{} booked appointments overlap {}..{}", events.len(), start, end);
        Ok(events)
    }
}
