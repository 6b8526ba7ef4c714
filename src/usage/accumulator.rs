use anyhow::Result;
use chrono::NaiveDate;
use clap::ValueEnum;
use tracing::{error, info, trace};

use crate::storage::UsageStore;

use super::{rollup::rollup_week, table::UsageTable};

/// What happens to the live table when a session stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// The live table only covers the current run and is emptied on stop.
    ClearOnStop,
    /// The live table carries the all-time totals and survives stops until an explicit reset.
    KeepUntilReset,
}

/// Persistence variants selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Persistence {
    /// Daily json buckets plus an all-time table. Usage survives restarts.
    Daily,
    /// Nothing is written to disk and every run starts from zero.
    Memory,
}

impl Persistence {
    pub fn retention(self) -> Retention {
        match self {
            Persistence::Daily => Retention::KeepUntilReset,
            Persistence::Memory => Retention::ClearOnStop,
        }
    }
}

pub struct UsageAccumulator<S: UsageStore> {
    current: UsageTable,
    store: S,
    retention: Retention,
}

impl<S: UsageStore> UsageAccumulator<S> {
    /// Builds an accumulator. Under [Retention::KeepUntilReset] the live table starts from the
    /// stored all-time totals.
    pub async fn new(store: S, retention: Retention) -> Result<Self> {
        let current = match retention {
            Retention::ClearOnStop => UsageTable::new(),
            Retention::KeepUntilReset => store.load_all_time().await?,
        };
        Ok(Self {
            current,
            store,
            retention,
        })
    }

    /// Counts one second of `app_name` on `today`. The live table is always updated, a failing
    /// store is only logged.
    pub async fn increment(&mut self, app_name: &str, today: NaiveDate) {
        self.current.increment(app_name);
        trace!("Counted a second for {app_name}");
        if let Err(e) = self.store.record(today, app_name).await {
            error!("Failed to persist usage of {app_name} for {today}: {e:?}");
        }
    }

    pub fn total(&self) -> u64 {
        self.current.total()
    }

    pub fn current(&self) -> &UsageTable {
        &self.current
    }

    pub fn retention(&self) -> Retention {
        self.retention
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Called once the final report of a run was emitted.
    pub fn finish_run(&mut self) {
        if self.retention == Retention::ClearOnStop {
            self.current.clear();
        }
    }

    /// Drops the live table and everything stored. Calling it again changes nothing.
    pub async fn reset(&mut self) -> Result<()> {
        self.current.clear();
        self.store.clear().await?;
        info!("Usage statistics were reset");
        Ok(())
    }

    pub async fn today(&self, date: NaiveDate) -> Result<Option<UsageTable>> {
        self.store.load_day(date).await
    }

    /// Rolls up the week ending at `end` and refreshes the weekly summary cache.
    pub async fn week(&mut self, end: NaiveDate) -> Result<UsageTable> {
        let week = rollup_week(end, &self.store).await?;
        if let Err(e) = self.store.save_weekly_summary(&week).await {
            error!("Failed to cache the weekly summary: {e:?}");
        }
        Ok(week)
    }

    pub async fn all_time(&self) -> Result<UsageTable> {
        self.store.load_all_time().await
    }
}
