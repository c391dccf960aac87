use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;

use calendar_cell::SlotGenerator;
use locale_cell::services::intent::{DATE_PREFIX, TIME_PREFIX};

use crate::models::BookingError;

const MIN_PHONE_DIGITS: usize = 7;
const MAX_FREE_TEXT: usize = 500;

fn date_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})$").ok())
        .as_ref()
}

fn time_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d{1,2})\s*[:：時]\s*(\d{2})\s*分?$").ok())
        .as_ref()
}

/// Reads `YYYY-MM-DD` (also `/` or `.` separated, full-width digits
/// allowed) or a `date:` button value.
pub fn parse_date(input: &str) -> Result<NaiveDate, BookingError> {
    let normalized = to_ascii_digits(input.trim());
    let raw = normalized.strip_prefix(DATE_PREFIX).unwrap_or(&normalized).trim();

    let caps = date_pattern()
        .and_then(|pattern| pattern.captures(raw))
        .ok_or_else(|| BookingError::Validation(format!("'{}' is not a date", input.trim())))?;

    let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let year = caps.get(1).and_then(|m| m.as_str().parse::<i32>().ok());

    match (year, number(2), number(3)) {
        (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d)
            .ok_or_else(|| BookingError::Validation(format!("{}-{}-{} does not exist", y, m, d))),
        _ => Err(BookingError::Validation(format!("'{}' is not a date", input.trim()))),
    }
}

/// A date the clinic can still take bookings for.
pub fn validate_date(date: NaiveDate, today: NaiveDate, generator: &SlotGenerator) -> Result<NaiveDate, BookingError> {
    if date < today {
        return Err(BookingError::Validation(format!("{} is in the past", date)));
    }
    if !generator.schedule().is_open(date) {
        return Err(BookingError::Validation(format!("the clinic is closed on {}", date)));
    }
    Ok(date)
}

/// Reads `HH:MM` (also `10時30分`, full-width digits) or a `time:` value.
pub fn parse_time(input: &str) -> Result<NaiveTime, BookingError> {
    let normalized = to_ascii_digits(input.trim());
    let raw = normalized.strip_prefix(TIME_PREFIX).unwrap_or(&normalized).trim();

    let invalid = || BookingError::Validation(format!("'{}' is not a time", input.trim()));
    let caps = time_pattern()
        .and_then(|pattern| pattern.captures(raw))
        .ok_or_else(invalid)?;

    let hour = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
    let minute = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok());

    hour.zip(minute)
        .and_then(|(h, m)| NaiveTime::from_hms_opt(h, m, 0))
        .ok_or_else(invalid)
}

/// The time must start a slot on `date` and must have been offered as free.
pub fn validate_time(
    date: NaiveDate,
    time: NaiveTime,
    generator: &SlotGenerator,
    offered: &[NaiveTime],
) -> Result<NaiveTime, BookingError> {
    if !generator.is_slot_start(date, time) {
        return Err(BookingError::Validation(format!(
            "{} is not a bookable time on {}",
            time.format("%H:%M"),
            date
        )));
    }
    if !offered.contains(&time) {
        return Err(BookingError::Validation(format!(
            "{} on {} is not free",
            time.format("%H:%M"),
            date
        )));
    }
    Ok(time)
}

pub fn validate_name(input: &str) -> Result<String, BookingError> {
    required_text(input, "name")
}

pub fn validate_reason(input: &str) -> Result<String, BookingError> {
    required_text(input, "reason")
}

/// At least seven digits; `+`, spaces, dashes and parentheses are allowed.
pub fn validate_phone(input: &str) -> Result<String, BookingError> {
    let normalized = to_ascii_digits(input.trim());
    let allowed = normalized
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
    let digits = normalized.chars().filter(|c| c.is_ascii_digit()).count();

    if !allowed || digits < MIN_PHONE_DIGITS {
        return Err(BookingError::Validation(format!("'{}' is not a phone number", input.trim())));
    }
    Ok(normalized)
}

fn required_text(input: &str, field: &str) -> Result<String, BookingError> {
    let value = input.trim();
    if value.is_empty() {
        return Err(BookingError::Validation(format!("{} is required", field)));
    }
    if value.chars().count() > MAX_FREE_TEXT {
        return Err(BookingError::Validation(format!("{} is too long", field)));
    }
    Ok(value.to_string())
}

/// Full-width digits and colon to ASCII.
fn to_ascii_digits(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            '：' => ':',
            '－' | 'ー' => '-',
            '／' => '/',
            _ => c,
        })
        .collect()
}
