//! Turning usage tables into report files and delivering them.

use chrono::NaiveDate;
use clap::ValueEnum;

use crate::{
    error::ReportError,
    storage::UsageStore,
    usage::{
        accumulator::UsageAccumulator,
        report::{render_report, report_caption, ReportLocale},
        table::UsageTable,
    },
    utils::time::date_to_record_name,
};

pub mod emitter;
pub mod upload;

/// Which table a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportScope {
    /// The live table of the tracking session.
    #[value(skip)]
    Current,
    Today,
    Week,
    All,
}

impl ReportScope {
    pub fn file_name(self, date: NaiveDate) -> String {
        match self {
            ReportScope::Current => "stats.txt".into(),
            ReportScope::Today => format!("{}.txt", date_to_record_name(date)),
            ReportScope::Week => "weekly_summary.txt".into(),
            ReportScope::All => "all_time.txt".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub scope: ReportScope,
    /// Today for the current and daily scopes, the last day for the weekly one.
    pub date: NaiveDate,
    pub table: UsageTable,
    pub total_elapsed: u64,
}

impl Report {
    pub fn render(&self, locale: ReportLocale) -> String {
        render_report(&self.table, self.total_elapsed, locale)
    }

    pub fn caption(&self, locale: ReportLocale) -> String {
        report_caption(&self.table, locale)
    }
}

/// Collects the table for `scope`. Without a running session the header total is the table's
/// own sum, so `total_elapsed` may be `None`.
pub async fn collect_report<S: UsageStore>(
    accumulator: &mut UsageAccumulator<S>,
    scope: ReportScope,
    date: NaiveDate,
    total_elapsed: Option<u64>,
) -> Result<Report, ReportError> {
    let table = match scope {
        ReportScope::Current => accumulator.current().clone(),
        ReportScope::Today => accumulator
            .today(date)
            .await?
            .ok_or(ReportError::NoData(date))?,
        ReportScope::Week => accumulator.week(date).await?,
        ReportScope::All => accumulator.all_time().await?,
    };
    let total_elapsed = total_elapsed.unwrap_or_else(|| table.total());
    Ok(Report {
        scope,
        date,
        table,
        total_elapsed,
    })
}
