pub mod aggregator;
pub mod availability;
pub mod lifecycle;
pub mod recurrence;
pub mod resolver;
pub mod slots;
pub mod sources;

pub use aggregator::{CalendarSource, EventAggregator};
pub use availability::AvailabilityService;
pub use lifecycle::{AppointmentLifecycleService, CalendarWriter};
pub use resolver::AvailabilityResolver;
pub use slots::SlotGenerator;
