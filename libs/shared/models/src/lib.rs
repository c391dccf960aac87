pub mod appointment;
pub mod error;
pub mod patient;

pub use appointment::{Appointment, AppointmentStatus, NewAppointment};
pub use error::AppError;
pub use patient::{NewPatient, Patient};
