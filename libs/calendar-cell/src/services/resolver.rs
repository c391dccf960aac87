use chrono_tz::Tz;
use tracing::debug;

use crate::models::{CalendarEvent, Slot};

/// Filters candidate slots against busy intervals.
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityResolver {
    clinic_tz: Tz,
}

impl AvailabilityResolver {
    pub fn new(clinic_tz: Tz) -> Self {
        Self { clinic_tz }
    }

    pub fn clinic_tz(&self) -> Tz {
        self.clinic_tz
    }

    /// Slots that overlap none of `events`, in their input order.
    pub fn resolve(&self, slots: &[Slot], events: &[CalendarEvent]) -> Vec<Slot> {
        let free: Vec<Slot> = slots
            .iter()
            .filter(|slot| self.is_free(slot, events))
            .copied()
            .collect();

        debug!(
            "{} of {} slots free against {} events",
            free.len(),
            slots.len(),
            events.len()
        );
        free
    }

    /// A slot whose wall-clock start does not exist in the clinic zone is never free.
    pub fn is_free(&self, slot: &Slot, events: &[CalendarEvent]) -> bool {
        match slot.interval_in(self.clinic_tz) {
            Some((start, end)) => !events.iter().any(|event| event.overlaps(start, end)),
            None => false,
        }
    }
}
