use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::debug;

use crate::models::{BusinessHours, CalendarError, Slot, WeeklySchedule};

/// Produces candidate slots from the weekly business-hours table.
#[derive(Debug, Clone)]
pub struct SlotGenerator {
    schedule: WeeklySchedule,
    duration: Duration,
}

impl SlotGenerator {
    pub fn new(schedule: WeeklySchedule, duration: Duration) -> Result<Self, CalendarError> {
        if duration <= Duration::zero() {
            return Err(CalendarError::InvalidSchedule(format!(
                "slot duration must be positive, got {} minutes",
                duration.num_minutes()
            )));
        }
        Ok(Self { schedule, duration })
    }

    pub fn schedule(&self) -> &WeeklySchedule {
        &self.schedule
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Slots for every date in `[start, end)`, in chronological order.
    pub fn generate(&self, start: NaiveDate, end: NaiveDate) -> Vec<Slot> {
        let slots: Vec<Slot> = start
            .iter_days()
            .take_while(|date| *date < end)
            .flat_map(|date| self.slots_for_date(date))
            .collect();

        debug!("Generated {} candidate slots for {}..{}", slots.len(), start, end);
        slots
    }

    pub fn slots_for_date(&self, date: NaiveDate) -> Vec<Slot> {
        match self.schedule.hours_on(date) {
            Some(hours) => self.slots_within(date, hours),
            None => Vec::new(),
        }
    }

    /// True when `time` is the start of a generated slot on `date`.
    pub fn is_slot_start(&self, date: NaiveDate, time: NaiveTime) -> bool {
        self.slots_for_date(date).iter().any(|slot| slot.time == time)
    }

    fn slots_within(&self, date: NaiveDate, hours: &BusinessHours) -> Vec<Slot> {
        let mut slots = Vec::new();

        // Walk on NaiveDateTime so a close near midnight cannot wrap around.
        let close = date.and_time(hours.close);
        let mut current = date.and_time(hours.open);

        while current + self.duration <= close {
            let time = current.time();

            if hours.in_break(time) {
                match hours.break_end {
                    Some(resume) if date.and_time(resume) > current => {
                        current = date.and_time(resume);
                        continue;
                    }
                    _ => break,
                }
            }

            slots.push(Slot::new(date, time, self.duration));
            current += self.duration;
        }

        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn generator(minutes: i64) -> SlotGenerator {
        SlotGenerator::new(WeeklySchedule::default(), Duration::minutes(minutes)).unwrap()
    }

    fn times(slots: &[Slot]) -> Vec<String> {
        slots.iter().map(|s| s.time.format("%H:%M").to_string()).collect()
    }

    #[test]
    fn default_weekday_has_sixteen_half_hour_slots() {
        // 2025-05-01 is a Thursday.
        let slots = generator(30).slots_for_date(date("2025-05-01"));

        assert_eq!(slots.len(), 16);
        assert_eq!(slots.first().unwrap().time, hm(9, 0));
        assert_eq!(slots.last().unwrap().time, hm(17, 30));
        assert!(!times(&slots).contains(&"12:00".to_string()));
        assert!(!times(&slots).contains(&"12:30".to_string()));
        assert!(times(&slots).contains(&"13:00".to_string()));
    }

    #[test]
    fn weekend_days_produce_nothing() {
        let g = generator(30);
        assert!(g.slots_for_date(date("2025-05-03")).is_empty());
        assert!(g.slots_for_date(date("2025-05-04")).is_empty());
    }

    #[test]
    fn generation_resumes_exactly_at_break_end() {
        // 45-minute steps: 09:00, 09:45, 10:30, 11:15, then 12:00 is in the break.
        // Stepping through would give 12:45; resuming yields 13:00.
        let slots = generator(45).slots_for_date(date("2025-05-01"));
        let times = times(&slots);

        assert_eq!(&times[..5], &["09:00", "09:45", "10:30", "11:15", "13:00"]);
    }

    #[test]
    fn last_slot_must_end_by_close() {
        let mut schedule = WeeklySchedule::closed();
        schedule.set(Weekday::Thu, Some(BusinessHours::new(hm(9, 0), hm(10, 40)).unwrap()));
        let g = SlotGenerator::new(schedule, Duration::minutes(30)).unwrap();

        assert_eq!(times(&g.slots_for_date(date("2025-05-01"))), vec!["09:00", "09:30", "10:00"]);
    }

    #[test]
    fn close_at_midnight_does_not_wrap() {
        let mut schedule = WeeklySchedule::closed();
        let late = BusinessHours::new(hm(22, 0), NaiveTime::from_hms_opt(23, 59, 59).unwrap()).unwrap();
        schedule.set(Weekday::Thu, Some(late));
        let g = SlotGenerator::new(schedule, Duration::minutes(60)).unwrap();

        assert_eq!(times(&g.slots_for_date(date("2025-05-01"))), vec!["22:00"]);
    }

    #[test]
    fn range_is_half_open_and_chronological() {
        // Thu 1st .. Tue 6th exclusive: Thu, Fri, Mon.
        let slots = generator(30).generate(date("2025-05-01"), date("2025-05-06"));

        assert_eq!(slots.len(), 48);
        assert!(slots.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(slots.last().unwrap().date, date("2025-05-05"));
    }

    #[test]
    fn generation_is_deterministic() {
        let g = generator(20);
        assert_eq!(
            g.generate(date("2025-05-01"), date("2025-05-15")),
            g.generate(date("2025-05-01"), date("2025-05-15"))
        );
    }

    #[test]
    fn every_slot_respects_hours_for_many_durations() {
        let schedule = WeeklySchedule::default();
        for minutes in [5, 10, 15, 20, 25, 30, 40, 45, 50, 60, 90, 120, 240] {
            let g = SlotGenerator::new(schedule.clone(), Duration::minutes(minutes)).unwrap();

            for slot in g.generate(date("2025-04-28"), date("2025-05-05")) {
                let hours = schedule.hours_on(slot.date).unwrap();
                let end = slot.date.and_time(slot.time) + slot.duration();

                assert!(slot.time >= hours.open, "{:?} before open", slot);
                assert!(end <= slot.date.and_time(hours.close), "{:?} past close", slot);
                assert!(!hours.in_break(slot.time), "{:?} starts in break", slot);
            }
        }
    }

    #[test]
    fn slot_start_lookup() {
        let g = generator(30);
        assert!(g.is_slot_start(date("2025-05-01"), hm(10, 0)));
        assert!(!g.is_slot_start(date("2025-05-01"), hm(10, 15)));
        assert!(!g.is_slot_start(date("2025-05-01"), hm(12, 0)));
        assert!(!g.is_slot_start(date("2025-05-03"), hm(10, 0)));
    }

    #[test]
    fn non_positive_duration_is_rejected() {
        assert!(SlotGenerator::new(WeeklySchedule::default(), Duration::zero()).is_err());
    }
}
