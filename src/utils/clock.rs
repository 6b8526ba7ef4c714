use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use tokio::time::Instant;

/// Source of wall-clock time and timer deadlines for the session loop. Tests swap it for a clock
/// pinned to a known date.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Utc>;

    fn instant(&self) -> Instant;

    async fn sleep_until(&self, instant: Instant);

    /// Wall-clock time in the user's timezone. Daily buckets and the scheduled send use it.
    fn local_time(&self, offset: FixedOffset) -> DateTime<FixedOffset> {
        self.time().with_timezone(&offset)
    }

    fn local_date(&self, offset: FixedOffset) -> NaiveDate {
        self.local_time(offset).date_naive()
    }
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, instant: Instant) {
        tokio::time::sleep_until(instant).await;
    }
}

/// Offset of the machine's local timezone right now.
pub fn local_offset() -> FixedOffset {
    *chrono::Local::now().offset()
}
