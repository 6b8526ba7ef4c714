use std::collections::BTreeMap;

use anyhow::Result;
use chrono::NaiveDate;

use crate::usage::table::UsageTable;

use super::{DailySource, UsageStore};

/// Keeps every table in memory. Backs the `memory` persistence mode where nothing outlives the
/// process, and tests.
#[derive(Debug, Default)]
pub struct MemoryUsageStore {
    days: BTreeMap<NaiveDate, UsageTable>,
    all_time: UsageTable,
    weekly_summary: Option<UsageTable>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the bucket of `date`. Useful for seeding history.
    pub fn insert_day(&mut self, date: NaiveDate, table: UsageTable) {
        self.days.insert(date, table);
    }

    pub fn weekly_summary(&self) -> Option<&UsageTable> {
        self.weekly_summary.as_ref()
    }
}

impl DailySource for MemoryUsageStore {
    async fn load_day(&self, date: NaiveDate) -> Result<Option<UsageTable>> {
        Ok(self.days.get(&date).cloned())
    }
}

impl UsageStore for MemoryUsageStore {
    async fn record(&mut self, date: NaiveDate, app_name: &str) -> Result<()> {
        self.days.entry(date).or_default().increment(app_name);
        self.all_time.increment(app_name);
        Ok(())
    }

    async fn load_all_time(&self) -> Result<UsageTable> {
        Ok(self.all_time.clone())
    }

    async fn save_weekly_summary(&mut self, table: &UsageTable) -> Result<()> {
        self.weekly_summary = Some(table.clone());
        Ok(())
    }

    async fn clear(&mut self) -> Result<()> {
        self.days.clear();
        self.all_time.clear();
        self.weekly_summary = None;
        Ok(())
    }
}
