use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Timelike};

/// Fires once per local date when the sampled wall-clock second equals the configured time.
#[derive(Debug, Clone)]
pub struct DailySchedule {
    at: NaiveTime,
    last_fired: Option<NaiveDate>,
}

impl DailySchedule {
    pub fn new(at: NaiveTime) -> Self {
        Self {
            at: at.with_nanosecond(0).unwrap_or(at),
            last_fired: None,
        }
    }

    pub fn at(&self) -> NaiveTime {
        self.at
    }

    pub fn is_due(&mut self, now: DateTime<FixedOffset>) -> bool {
        let date = now.date_naive();
        let second = now.time().with_nanosecond(0).unwrap_or(now.time());
        if second != self.at || self.last_fired == Some(date) {
            return false;
        }
        self.last_fired = Some(date);
        true
    }
}
