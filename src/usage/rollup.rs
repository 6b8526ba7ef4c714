use anyhow::Result;
use chrono::NaiveDate;
use futures::{stream, StreamExt, TryStreamExt};
use tracing::{debug, instrument};

use crate::{storage::DailySource, utils::time::week_ending};

use super::table::UsageTable;

/// How many daily buckets are read at once.
const CONCURRENT_READS: usize = 4;

/// Sums the daily buckets of the 7 days ending at `end`. Days without a bucket add nothing.
/// Applications are ordered by their first appearance, scanning days from oldest to newest.
#[instrument(skip(source))]
pub async fn rollup_week(end: NaiveDate, source: &impl DailySource) -> Result<UsageTable> {
    // `buffered` keeps the date order even though reads overlap.
    let buckets = stream::iter(week_ending(end))
        .map(|day| async move { source.load_day(day).await.map(|bucket| (day, bucket)) })
        .buffered(CONCURRENT_READS)
        .try_collect::<Vec<_>>()
        .await?;

    let mut week = UsageTable::new();
    for (day, bucket) in buckets {
        match bucket {
            Some(bucket) => week.merge(&bucket),
            None => debug!("No bucket for {day}"),
        }
    }
    Ok(week)
}
