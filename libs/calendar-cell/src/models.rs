use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::AppointmentStatus;

// ==============================================================================
// CALENDAR EVENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Google,
    Outlook,
    Ical,
    Bookings,
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EventSource::Google => write!(f, "google"),
            EventSource::Outlook => write!(f, "outlook"),
            EventSource::Ical => write!(f, "ical"),
            EventSource::Bookings => write!(f, "bookings"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Confirmed,
    Tentative,
}

/// A busy interval from one calendar source, normalized to UTC.
///
/// Built only through [`CalendarEvent::new`], so `start < end` always holds.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CalendarEvent {
    id: String,
    title: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    source: EventSource,
    status: EventStatus,
}

impl CalendarEvent {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        source: EventSource,
        status: EventStatus,
    ) -> Result<Self, CalendarError> {
        let id = id.into();
        if start >= end {
            return Err(CalendarError::InvalidInterval(format!(
                "{} event {} starts at {} but ends at {}",
                source, id, start, end
            )));
        }

        Ok(Self {
            id,
            title: title.into(),
            start,
            end,
            source,
            status,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn source(&self) -> EventSource {
        self.source
    }

    pub fn status(&self) -> EventStatus {
        self.status
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Half-open overlap with `[start, end)`. Touching boundaries do not overlap.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }
}

// ==============================================================================
// SLOTS AND BUSINESS HOURS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot {
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub duration_minutes: i64,
}

impl Slot {
    pub fn new(date: NaiveDate, time: NaiveTime, duration: Duration) -> Self {
        Self {
            date,
            time,
            duration_minutes: duration.num_minutes(),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.duration_minutes)
    }

    /// The slot as a UTC interval. `None` when the wall-clock start does not
    /// exist in `tz` (a DST gap).
    pub fn interval_in(&self, tz: Tz) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = localize(tz, self.date.and_time(self.time))?;
        Some((start, start + self.duration()))
    }
}

/// Converts a clinic-local wall-clock time to UTC, taking the earlier instant
/// when the local time is ambiguous.
pub fn localize(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Start of a clinic-local day in UTC. Skips forward past a DST gap at midnight.
pub fn local_day_start(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..4)
        .find_map(|h| localize(tz, midnight + Duration::hours(h)))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusinessHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub break_start: Option<NaiveTime>,
    pub break_end: Option<NaiveTime>,
}

impl BusinessHours {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Result<Self, CalendarError> {
        if open >= close {
            return Err(CalendarError::InvalidSchedule(format!(
                "opening time {} is not before closing time {}",
                open, close
            )));
        }
        Ok(Self { open, close, break_start: None, break_end: None })
    }

    pub fn with_break(mut self, start: NaiveTime, end: NaiveTime) -> Result<Self, CalendarError> {
        if start >= end || start < self.open || end > self.close {
            return Err(CalendarError::InvalidSchedule(format!(
                "break {}-{} must be a non-empty window inside {}-{}",
                start, end, self.open, self.close
            )));
        }
        self.break_start = Some(start);
        self.break_end = Some(end);
        Ok(self)
    }

    pub fn break_window(&self) -> Option<(NaiveTime, NaiveTime)> {
        self.break_start.zip(self.break_end)
    }

    pub fn in_break(&self, time: NaiveTime) -> bool {
        self.break_window()
            .map(|(start, end)| time >= start && time < end)
            .unwrap_or(false)
    }
}

/// Weekday → business hours. `None` means closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklySchedule {
    days: [Option<BusinessHours>; 7],
}

const WEEKDAYS: [(&str, Weekday); 7] = [
    ("mon", Weekday::Mon),
    ("tue", Weekday::Tue),
    ("wed", Weekday::Wed),
    ("thu", Weekday::Thu),
    ("fri", Weekday::Fri),
    ("sat", Weekday::Sat),
    ("sun", Weekday::Sun),
];

impl Default for WeeklySchedule {
    /// Monday to Friday 09:00-18:00 with a 12:00-13:00 lunch break.
    fn default() -> Self {
        let hours = BusinessHours {
            open: hm(9, 0),
            close: hm(18, 0),
            break_start: Some(hm(12, 0)),
            break_end: Some(hm(13, 0)),
        };

        let mut schedule = Self::closed();
        for (_, day) in &WEEKDAYS[..5] {
            schedule.set(*day, Some(hours));
        }
        schedule
    }
}

impl WeeklySchedule {
    pub fn closed() -> Self {
        Self { days: [None; 7] }
    }

    pub fn set(&mut self, day: Weekday, hours: Option<BusinessHours>) {
        self.days[day.num_days_from_monday() as usize] = hours;
    }

    pub fn hours_for(&self, day: Weekday) -> Option<&BusinessHours> {
        self.days[day.num_days_from_monday() as usize].as_ref()
    }

    pub fn hours_on(&self, date: NaiveDate) -> Option<&BusinessHours> {
        self.hours_for(date.weekday())
    }

    pub fn is_open(&self, date: NaiveDate) -> bool {
        self.hours_on(date).is_some()
    }

    /// Parses `mon=09:00-18:00/12:00-13:00;tue=09:00-17:00;sat=closed`.
    /// Days that are not listed are closed.
    pub fn parse(raw: &str) -> Result<Self, CalendarError> {
        let mut schedule = Self::closed();

        for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (day, spec) = entry.split_once('=').ok_or_else(|| {
                CalendarError::InvalidSchedule(format!("expected day=hours, got '{}'", entry))
            })?;

            let day_key = day.trim().to_ascii_lowercase();
            let weekday = WEEKDAYS.iter()
                .find(|(name, _)| *name == day_key)
                .map(|(_, wd)| *wd)
                .ok_or_else(|| CalendarError::InvalidSchedule(format!("unknown weekday '{}'", day)))?;

            let spec = spec.trim();
            if spec.eq_ignore_ascii_case("closed") {
                schedule.set(weekday, None);
                continue;
            }

            let (hours, lunch) = match spec.split_once('/') {
                Some((hours, lunch)) => (hours, Some(lunch)),
                None => (spec, None),
            };

            let (open, close) = parse_range(hours)?;
            let mut business = BusinessHours::new(open, close)?;
            if let Some(lunch) = lunch {
                let (start, end) = parse_range(lunch)?;
                business = business.with_break(start, end)?;
            }
            schedule.set(weekday, Some(business));
        }

        Ok(schedule)
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

fn parse_range(raw: &str) -> Result<(NaiveTime, NaiveTime), CalendarError> {
    let (start, end) = raw.split_once('-').ok_or_else(|| {
        CalendarError::InvalidSchedule(format!("expected HH:MM-HH:MM, got '{}'", raw))
    })?;
    Ok((parse_hhmm(start)?, parse_hhmm(end)?))
}

fn parse_hhmm(raw: &str) -> Result<NaiveTime, CalendarError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| CalendarError::InvalidSchedule(format!("invalid time '{}'", raw.trim())))
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}

// ==============================================================================
// API TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IntegrationStatus {
    pub provider: EventSource,
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct SlotsResponse {
    pub timezone: String,
    pub slots: Vec<Slot>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Calendar source {provider} unavailable: {message}")]
    SourceUnavailable { provider: EventSource, message: String },

    #[error("Invalid calendar data: {0}")]
    InvalidData(String),

    #[error("Invalid event interval: {0}")]
    InvalidInterval(String),

    #[error("Invalid business hours: {0}")]
    InvalidSchedule(String),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Recurrence expansion failed: {0}")]
    Recurrence(String),

    #[error("Appointment not found: {0}")]
    AppointmentNotFound(Uuid),

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidTransition { from: AppointmentStatus, to: AppointmentStatus },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CalendarError {
    pub fn unavailable(provider: EventSource, message: impl fmt::Display) -> Self {
        CalendarError::SourceUnavailable { provider, message: message.to_string() }
    }
}
