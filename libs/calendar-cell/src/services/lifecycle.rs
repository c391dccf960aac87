use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::AppointmentStore;
use shared_models::{Appointment, AppointmentStatus};

use crate::models::{localize, CalendarError, EventSource};
use crate::services::sources::{GoogleCalendarSource, OutlookCalendarSource};

/// A calendar provider that confirmed appointments are copied into.
#[async_trait]
pub trait CalendarWriter: Send + Sync {
    fn target(&self) -> EventSource;

    /// Creates an event and returns the provider's id for it.
    async fn create_event(&self, title: &str, description: &str, start: DateTime<Utc>, end: DateTime<Utc>)
        -> Result<String, CalendarError>;
}

/// Moves appointments through pending → confirmed → cancelled and syncs
/// confirmations out to external calendars.
pub struct AppointmentLifecycleService {
    store: Arc<dyn AppointmentStore>,
    writers: Vec<Arc<dyn CalendarWriter>>,
    clinic_tz: Tz,
    duration: Duration,
}

impl AppointmentLifecycleService {
    pub fn new(store: Arc<dyn AppointmentStore>, clinic_tz: Tz, duration: Duration) -> Self {
        Self {
            store,
            writers: Vec::new(),
            clinic_tz,
            duration,
        }
    }

    /// Adds a writer for every configured provider.
    pub fn from_config(config: &AppConfig, store: Arc<dyn AppointmentStore>) -> Self {
        let mut service = Self::new(
            store,
            config.clinic_timezone,
            Duration::minutes(config.slot_duration_minutes),
        );

        if config.is_google_configured() {
            service = service.with_writer(Arc::new(GoogleCalendarSource::new(config)));
        }
        if config.is_outlook_configured() {
            service = service.with_writer(Arc::new(OutlookCalendarSource::new(config)));
        }
        service
    }

    pub fn with_writer(mut self, writer: Arc<dyn CalendarWriter>) -> Self {
        self.writers.push(writer);
        self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<(), CalendarError> {
        debug!("Validating status transition from {} to {}", current, next);

        if !current.can_transition_to(next) {
            warn!("Invalid status transition attempted: {} -> {}", current, next);
            return Err(CalendarError::InvalidTransition { from: current, to: next });
        }
        Ok(())
    }

    /// Update an appointment's status; confirmation is pushed to every writer.
    pub async fn update_status(&self, id: Uuid, next: AppointmentStatus) -> Result<Appointment, CalendarError> {
        let mut appointment = self.store
            .get_appointment(id)
            .await?
            .ok_or(CalendarError::AppointmentNotFound(id))?;

        self.validate_status_transition(appointment.status, next)?;

        if !self.store.update_status(id, next).await? {
            return Err(CalendarError::AppointmentNotFound(id));
        }
        appointment.status = next;
        info!("Appointment {} is now {}", id, next);

        if next == AppointmentStatus::Confirmed {
            self.sync_to_calendars(&appointment).await;
        }

        Ok(appointment)
    }

    /// Best-effort: failures are logged per provider.
    async fn sync_to_calendars(&self, appointment: &Appointment) {
        let Some(start) = localize(self.clinic_tz, appointment.date.and_time(appointment.time)) else {
            warn!("Appointment {} has no valid local start, not syncing", appointment.id);
            return;
        };
        let end = start + self.duration;

        let title = format!(
            "Appointment: {}",
            appointment.patient_name.as_deref().unwrap_or("patient")
        );
        let description = format!("Reason: {}\nAppointment ID: {}", appointment.reason, appointment.id);

        let pushes = self.writers.iter().map(|writer| {
            let title = title.as_str();
            let description = description.as_str();
            async move {
                (writer.target(), writer.create_event(title, description, start, end).await)
            }
        });

        for (target, result) in join_all(pushes).await {
            match result {
                Ok(event_id) => info!("Appointment {} synced to {} as {}", appointment.id, target, event_id),
                Err(e) => warn!("Calendar sync to {} failed for {}: {}", target, appointment.id, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::NaiveTime;
    use std::sync::Mutex;

    use shared_database::InMemoryStore;
    use shared_models::NewAppointment;

    #[derive(Default)]
    struct RecordingWriter {
        created: Mutex<Vec<(String, DateTime<Utc>)>>,
        fail: bool,
    }

    #[async_trait]
    impl CalendarWriter for RecordingWriter {
        fn target(&self) -> EventSource {
            EventSource::Google
        }

        async fn create_event(&self, title: &str, _description: &str, start: DateTime<Utc>, _end: DateTime<Utc>)
            -> Result<String, CalendarError> {
            if self.fail {
                return Err(CalendarError::unavailable(EventSource::Google, "boom"));
            }
            self.created.lock().unwrap().push((title.to_string(), start));
            Ok("evt-1".to_string())
        }
    }

    async fn pending(store: &InMemoryStore) -> Appointment {
        store
            .create_appointment(NewAppointment {
                patient_id: Uuid::new_v4(),
                patient_name: Some("Hanako".to_string()),
                date: "2025-05-01".parse().unwrap(),
                time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                reason: "checkup".to_string(),
            })
            .await
            .unwrap()
    }

    fn service(store: Arc<InMemoryStore>, writer: Arc<RecordingWriter>) -> AppointmentLifecycleService {
        AppointmentLifecycleService::new(store, chrono_tz::Asia::Tokyo, Duration::minutes(30))
            .with_writer(writer)
    }

    #[tokio::test]
    async fn confirming_pushes_event_to_writers() {
        let store = Arc::new(InMemoryStore::new());
        let writer = Arc::new(RecordingWriter::default());
        let appointment = pending(&store).await;

        let updated = service(store.clone(), writer.clone())
            .update_status(appointment.id, AppointmentStatus::Confirmed)
            .await
            .unwrap();

        assert_eq!(updated.status, AppointmentStatus::Confirmed);
        let created = writer.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].0, "Appointment: Hanako");
        assert_eq!(created[0].1.to_rfc3339(), "2025-05-01T01:00:00+00:00");
    }

    #[tokio::test]
    async fn sync_failure_does_not_fail_update() {
        let store = Arc::new(InMemoryStore::new());
        let writer = Arc::new(RecordingWriter { fail: true, ..Default::default() });
        let appointment = pending(&store).await;

        let result = service(store.clone(), writer)
            .update_status(appointment.id, AppointmentStatus::Confirmed)
            .await;

        assert_matches!(result, Ok(a) if a.status == AppointmentStatus::Confirmed);
    }

    #[tokio::test]
    async fn cancelling_does_not_sync() {
        let store = Arc::new(InMemoryStore::new());
        let writer = Arc::new(RecordingWriter::default());
        let appointment = pending(&store).await;

        service(store.clone(), writer.clone())
            .update_status(appointment.id, AppointmentStatus::Cancelled)
            .await
            .unwrap();

        assert!(writer.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_transition_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let writer = Arc::new(RecordingWriter::default());
        let appointment = pending(&store).await;
        let service = service(store.clone(), writer);

        service.update_status(appointment.id, AppointmentStatus::Cancelled).await.unwrap();
        let result = service.update_status(appointment.id, AppointmentStatus::Confirmed).await;

        assert_matches!(
            result,
            Err(CalendarError::InvalidTransition { from: AppointmentStatus::Cancelled, to: AppointmentStatus::Confirmed })
        );
    }

    #[tokio::test]
    async fn unknown_appointment_is_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let result = service(store, Arc::new(RecordingWriter::default()))
            .update_status(Uuid::new_v4(), AppointmentStatus::Confirmed)
            .await;

        assert_matches!(result, Err(CalendarError::AppointmentNotFound(_)));
    }
}
