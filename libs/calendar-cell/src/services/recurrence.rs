use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use rrule::RRuleSet;
use tracing::debug;

use crate::models::CalendarError;

/// Upper bound on occurrences expanded per series and window.
const MAX_OCCURRENCES: u16 = 500;

/// Where a recurring series is anchored: the first occurrence's start, either
/// as a UTC instant or as wall-clock time in a named IANA zone.
#[derive(Debug, Clone)]
pub enum RecurrenceAnchor {
    Utc(DateTime<Utc>),
    Zoned { local: NaiveDateTime, tzid: String },
}

impl RecurrenceAnchor {
    fn dtstart_line(&self) -> String {
        match self {
            RecurrenceAnchor::Utc(start) => format!("DTSTART:{}", start.format("%Y%m%dT%H%M%SZ")),
            RecurrenceAnchor::Zoned { local, tzid } => {
                format!("DTSTART;TZID={}:{}", tzid, local.format("%Y%m%dT%H%M%S"))
            }
        }
    }
}

/// Expands a recurring series into occurrence starts whose
/// `[start, start + duration)` overlaps `[window_start, window_end)`.
///
/// `rules` are raw content lines (`RRULE:`, `EXDATE:`, `RDATE:`, `EXRULE:`);
/// anything else is ignored.
pub fn expand_occurrences(
    anchor: &RecurrenceAnchor,
    rules: &[String],
    duration: Duration,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>, CalendarError> {
    let mut text = anchor.dtstart_line();
    for line in rules.iter().map(|l| l.trim()).filter(|l| is_rule_line(l)) {
        text.push('\n');
        text.push_str(line);
    }

    let set: RRuleSet = text
        .parse()
        .map_err(|e| CalendarError::Recurrence(format!("{}: {}", text.replace('\n', " "), e)))?;

    // Occurrences that start before the window can still run into it.
    let after = (window_start - duration).with_timezone(&rrule::Tz::UTC);
    let before = window_end.with_timezone(&rrule::Tz::UTC);
    let result = set.after(after).before(before).all(MAX_OCCURRENCES);

    let occurrences: Vec<DateTime<Utc>> = result
        .dates
        .into_iter()
        .map(|dt| dt.with_timezone(&Utc))
        .filter(|start| *start < window_end && *start + duration > window_start)
        .collect();

    debug!("Expanded recurrence into {} occurrences in window", occurrences.len());
    Ok(occurrences)
}

fn is_rule_line(line: &str) -> bool {
    let upper = line.to_ascii_uppercase();
    ["RRULE", "EXRULE", "RDATE", "EXDATE"]
        .iter()
        .any(|prefix| upper.starts_with(prefix) && matches!(upper.as_bytes().get(prefix.len()), Some(b':') | Some(b';')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{NaiveDate, TimeZone};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn weekly_series_expands_inside_window() {
        // Thursdays 01:00 UTC starting 2025-04-03.
        let anchor = RecurrenceAnchor::Utc(utc(2025, 4, 3, 1, 0));
        let rules = vec!["RRULE:FREQ=WEEKLY;BYDAY=TH".to_string()];

        let starts = expand_occurrences(
            &anchor,
            &rules,
            Duration::hours(1),
            utc(2025, 4, 28, 0, 0),
            utc(2025, 5, 12, 0, 0),
        )
        .unwrap();

        assert_eq!(starts, vec![utc(2025, 5, 1, 1, 0), utc(2025, 5, 8, 1, 0)]);
    }

    #[test]
    fn occurrence_started_before_window_is_kept_if_it_runs_into_it() {
        let anchor = RecurrenceAnchor::Utc(utc(2025, 5, 1, 8, 0));
        let rules = vec!["RRULE:FREQ=DAILY;COUNT=3".to_string()];

        let starts = expand_occurrences(
            &anchor,
            &rules,
            Duration::hours(3),
            utc(2025, 5, 2, 10, 0),
            utc(2025, 5, 2, 12, 0),
        )
        .unwrap();

        assert_eq!(starts, vec![utc(2025, 5, 2, 8, 0)]);
    }

    #[test]
    fn zoned_anchor_keeps_wall_clock_time() {
        // 09:00 Tokyo every day is 00:00 UTC.
        let anchor = RecurrenceAnchor::Zoned {
            local: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap().and_hms_opt(9, 0, 0).unwrap(),
            tzid: "Asia/Tokyo".to_string(),
        };
        let rules = vec!["RRULE:FREQ=DAILY".to_string()];

        let starts = expand_occurrences(
            &anchor,
            &rules,
            Duration::minutes(30),
            utc(2025, 5, 1, 0, 0),
            utc(2025, 5, 2, 0, 0),
        )
        .unwrap();

        assert_eq!(starts, vec![utc(2025, 5, 1, 0, 0)]);
    }

    #[test]
    fn exdate_removes_an_occurrence() {
        let anchor = RecurrenceAnchor::Utc(utc(2025, 5, 1, 1, 0));
        let rules = vec![
            "RRULE:FREQ=DAILY;COUNT=3".to_string(),
            "EXDATE:20250502T010000Z".to_string(),
            "X-UNRELATED:ignored".to_string(),
        ];

        let starts = expand_occurrences(
            &anchor,
            &rules,
            Duration::minutes(30),
            utc(2025, 5, 1, 0, 0),
            utc(2025, 5, 4, 0, 0),
        )
        .unwrap();

        assert_eq!(starts, vec![utc(2025, 5, 1, 1, 0), utc(2025, 5, 3, 1, 0)]);
    }

    #[test]
    fn malformed_rule_is_an_error() {
        let anchor = RecurrenceAnchor::Utc(utc(2025, 5, 1, 1, 0));
        let rules = vec!["RRULE:FREQ=SOMETIMES".to_string()];

        let result = expand_occurrences(&anchor, &rules, Duration::minutes(30), utc(2025, 5, 1, 0, 0), utc(2025, 5, 2, 0, 0));

        assert_matches!(result, Err(CalendarError::Recurrence(_)));
    }
}
