//! Persistence of usage tables. The layout of [json_store::JsonUsageStore] is:
//!  - `stats.json` holds the all-time table.
//!  - `jsons/<YYYY-MM-DD>.json` holds one daily bucket per local calendar date. Buckets named
//!    `jsons/<YYYY-MM-DD>` without extension are still read and renamed on the next record.
//!  - `jsons/weekly_summary.json` caches the last weekly rollup and is overwritten freely.
//!
//! Every file is read and rewritten whole on each update.

use std::future::Future;

use anyhow::Result;
use chrono::NaiveDate;

use crate::usage::table::UsageTable;

pub mod json_store;
pub mod memory;

/// Read access to daily buckets. This is all a weekly rollup needs.
pub trait DailySource {
    /// Returns the bucket for `date`, or `None` when nothing was recorded that day.
    fn load_day(&self, date: NaiveDate) -> impl Future<Output = Result<Option<UsageTable>>>;
}

/// Interface for abstracting storage of usage tables.
pub trait UsageStore: DailySource {
    /// Counts one second for `app_name` in the bucket for `date` and in the all-time table.
    fn record(&mut self, date: NaiveDate, app_name: &str) -> impl Future<Output = Result<()>>;

    fn load_all_time(&self) -> impl Future<Output = Result<UsageTable>>;

    fn save_weekly_summary(&mut self, table: &UsageTable) -> impl Future<Output = Result<()>>;

    /// Removes every bucket, the weekly cache and the all-time table.
    fn clear(&mut self) -> impl Future<Output = Result<()>>;
}
