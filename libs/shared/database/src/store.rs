use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::{Appointment, AppointmentStatus, NewAppointment, NewPatient, Patient};

use crate::supabase::{DatabaseError, SupabaseClient};

#[derive(Error, Debug)]
pub enum StoreError {
    /// An active appointment already holds the same (date, time).
    #[error("Slot already booked: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Conflict(msg) => StoreError::Conflict(msg),
            DatabaseError::NotFound(msg) => StoreError::NotFound(msg),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Persists one pending appointment. Implementations must reject a second
    /// active appointment for the same (date, time) with `StoreError::Conflict`.
    async fn create_appointment(&self, data: NewAppointment) -> Result<Appointment, StoreError>;

    /// Appointments with `start <= date < end`, any status.
    async fn get_appointments_by_range(&self, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<Appointment>, StoreError>;

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Returns false when no appointment with `id` exists.
    async fn update_status(&self, id: Uuid, status: AppointmentStatus) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait PatientStore: Send + Sync {
    async fn find_patient_by_user(&self, user_id: &str) -> Result<Option<Patient>, StoreError>;

    async fn create_patient(&self, data: NewPatient) -> Result<Patient, StoreError>;
}

/// PostgREST-backed store. The `appointments` table is expected to carry
/// `unique (date, time) where status <> 'cancelled'`, which surfaces as 409.
#[derive(Clone)]
pub struct SupabaseStore {
    supabase: SupabaseClient,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl AppointmentStore for SupabaseStore {
    async fn create_appointment(&self, data: NewAppointment) -> Result<Appointment, StoreError> {
        debug!("Inserting appointment for patient {} at {} {}", data.patient_id, data.date, data.time);

        let body = json!({
            "id": Uuid::new_v4(),
            "patient_id": data.patient_id,
            "patient_name": data.patient_name,
            "date": data.date,
            "time": data.time,
            "reason": data.reason,
            "status": AppointmentStatus::Pending,
            "created_at": Utc::now(),
        });

        let rows: Vec<Appointment> = self.supabase
            .request_with_prefer(Method::POST, "/rest/v1/appointments", Some(body), Some("return=representation"))
            .await?;

        let appointment = rows.into_iter().next()
            .ok_or_else(|| StoreError::Unavailable("insert returned no rows".to_string()))?;

        info!("Appointment {} stored", appointment.id);
        Ok(appointment)
    }

    async fn get_appointments_by_range(&self, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?date=gte.{}&date=lt.{}&order=date.asc,time.asc",
            start, end
        );

        Ok(self.supabase.request(Method::GET, &path, None).await?)
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows: Vec<Appointment> = self.supabase.request(Method::GET, &path, None).await?;

        Ok(rows.into_iter().next())
    }

    async fn update_status(&self, id: Uuid, status: AppointmentStatus) -> Result<bool, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);

        let rows: Vec<Appointment> = self.supabase
            .request_with_prefer(Method::PATCH, &path, Some(json!({ "status": status })), Some("return=representation"))
            .await?;

        if rows.is_empty() {
            warn!("Status update for unknown appointment {}", id);
        }
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl PatientStore for SupabaseStore {
    async fn find_patient_by_user(&self, user_id: &str) -> Result<Option<Patient>, StoreError> {
        let path = format!("/rest/v1/patients?user_id=eq.{}", urlencoding::encode(user_id));
        let rows: Vec<Patient> = self.supabase.request(Method::GET, &path, None).await?;

        Ok(rows.into_iter().next())
    }

    async fn create_patient(&self, data: NewPatient) -> Result<Patient, StoreError> {
        let body = json!({
            "id": Uuid::new_v4(),
            "user_id": data.user_id,
            "name": data.name,
            "phone": data.phone,
            "preferred_language": data.preferred_language,
            "created_at": Utc::now(),
        });

        let rows: Vec<Patient> = self.supabase
            .request_with_prefer(Method::POST, "/rest/v1/patients", Some(body), Some("return=representation"))
            .await?;

        rows.into_iter().next()
            .ok_or_else(|| StoreError::Unavailable("insert returned no rows".to_string()))
    }
}
