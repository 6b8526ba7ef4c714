use anyhow::{anyhow, bail, Result};
use chrono::{Days, NaiveDate, NaiveTime};

/// Length of a weekly rollup in days, the end date included.
pub const WEEK_DAYS: u64 = 7;

/// This is the standard way of converting a date to a bucket or report name in crono.
pub fn date_to_record_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// The 7 consecutive dates ending at `end`, oldest first.
pub fn week_ending(end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    (0..WEEK_DAYS)
        .rev()
        .filter_map(move |back| end.checked_sub_days(Days::new(back)))
}

/// `HH:MM:SS` with every field zero-padded to two digits. Hours are not capped at 99.
pub fn format_hms(seconds: u64) -> String {
    let (hours, minutes, seconds) = split_seconds(seconds);
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// `H:MM:SS` with a variable width hour field.
pub fn format_clock(seconds: u64) -> String {
    let (hours, minutes, seconds) = split_seconds(seconds);
    format!("{hours}:{minutes:02}:{seconds:02}")
}

fn split_seconds(seconds: u64) -> (u64, u64, u64) {
    (seconds / 3600, (seconds % 3600) / 60, seconds % 60)
}

/// Parses `HH:MM:SS`, `HH:MM` or a bare number of seconds into seconds.
pub fn parse_duration(value: &str) -> Result<u64> {
    let parts = value
        .trim()
        .split(':')
        .map(|part| {
            part.parse::<u64>()
                .map_err(|e| anyhow!("Can't parse {value:?} as a duration: {e}"))
        })
        .collect::<Result<Vec<_>>>()?;

    let (hours, minutes, seconds) = match parts.as_slice() {
        [seconds] => (0, 0, *seconds),
        [hours, minutes] if *minutes < 60 => (*hours, *minutes, 0),
        [hours, minutes, seconds] if *minutes < 60 && *seconds < 60 => {
            (*hours, *minutes, *seconds)
        }
        _ => bail!("Can't parse {value:?} as a duration, expected HH:MM:SS"),
    };
    hours
        .checked_mul(3600)
        .and_then(|v| v.checked_add(minutes * 60 + seconds))
        .ok_or_else(|| anyhow!("Duration {value:?} is too long"))
}

/// Parses a wall-clock time such as `19:00:00` or `19:00`.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|e| anyhow!("Can't parse {value:?} as a time of day: {e}"))
}
