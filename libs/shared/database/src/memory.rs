use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_models::{Appointment, AppointmentStatus, NewAppointment, NewPatient, Patient};

use crate::store::{AppointmentStore, PatientStore, StoreError};

/// Process-local store used when Supabase is not configured and in tests.
/// The (date, time) uniqueness check and the insert happen under one write lock.
#[derive(Default)]
pub struct InMemoryStore {
    appointments: RwLock<Vec<Appointment>>,
    patients: RwLock<HashMap<String, Patient>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn appointment_count(&self) -> usize {
        self.appointments.read().await.len()
    }

    pub async fn all_appointments(&self) -> Vec<Appointment> {
        self.appointments.read().await.clone()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryStore {
    async fn create_appointment(&self, data: NewAppointment) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.write().await;

        let taken = appointments.iter().any(|a| {
            a.status.is_active() && a.date == data.date && a.time == data.time
        });
        if taken {
            return Err(StoreError::Conflict(format!("{} {}", data.date, data.time)));
        }

        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: data.patient_id,
            patient_name: data.patient_name,
            date: data.date,
            time: data.time,
            reason: data.reason,
            status: AppointmentStatus::Pending,
            created_at: Utc::now(),
        };
        appointments.push(appointment.clone());

        Ok(appointment)
    }

    async fn get_appointments_by_range(&self, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<Appointment>, StoreError> {
        let mut found: Vec<Appointment> = self.appointments.read().await
            .iter()
            .filter(|a| a.date >= start && a.date < end)
            .cloned()
            .collect();
        found.sort_by_key(|a| (a.date, a.time));

        Ok(found)
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.appointments.read().await.iter().find(|a| a.id == id).cloned())
    }

    async fn update_status(&self, id: Uuid, status: AppointmentStatus) -> Result<bool, StoreError> {
        let mut appointments = self.appointments.write().await;

        match appointments.iter_mut().find(|a| a.id == id) {
            Some(appointment) => {
                appointment.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl PatientStore for InMemoryStore {
    async fn find_patient_by_user(&self, user_id: &str) -> Result<Option<Patient>, StoreError> {
        Ok(self.patients.read().await.get(user_id).cloned())
    }

    async fn create_patient(&self, data: NewPatient) -> Result<Patient, StoreError> {
        let patient = Patient {
            id: Uuid::new_v4(),
            user_id: data.user_id.clone(),
            name: data.name,
            phone: data.phone,
            preferred_language: data.preferred_language,
            created_at: Utc::now(),
        };
        self.patients.write().await.insert(data.user_id, patient.clone());

        Ok(patient)
    }
}
