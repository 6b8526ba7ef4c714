use std::fmt::Write;

use clap::ValueEnum;
use serde::Deserialize;

use crate::utils::time::{format_clock, format_hms};

use super::table::UsageTable;

/// Language of the labels in reports and upload captions. The layout doesn't change with it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLocale {
    #[default]
    Ru,
    En,
}

impl ReportLocale {
    fn total_label(self) -> &'static str {
        match self {
            ReportLocale::Ru => "Общее время",
            ReportLocale::En => "Total time",
        }
    }

    fn apps_label(self) -> &'static str {
        match self {
            ReportLocale::Ru => "Время в приложениях",
            ReportLocale::En => "Time in applications",
        }
    }

    fn caption_label(self) -> &'static str {
        match self {
            ReportLocale::Ru => "Статистика за последние",
            ReportLocale::En => "Statistics for the last",
        }
    }
}

/// Renders a table as the plain-text report:
///
/// ```text
/// Общее время: 01:01:01
///
/// Время в приложениях:
/// {A: 1:00:00}
/// {B: 0:01:01}
/// ```
pub fn render_report(table: &UsageTable, total_elapsed: u64, locale: ReportLocale) -> String {
    let mut out = String::new();
    // Writing into a String can't fail.
    let _ = writeln!(out, "{}: {}", locale.total_label(), format_hms(total_elapsed));
    out.push('\n');
    let _ = writeln!(out, "{}:", locale.apps_label());
    for (app_name, seconds) in table.iter() {
        let _ = writeln!(out, "{{{app_name}: {}}}", format_clock(seconds));
    }
    out
}

/// Caption attached to an uploaded report.
pub fn report_caption(table: &UsageTable, locale: ReportLocale) -> String {
    format!("{}: {}", locale.caption_label(), format_hms(table.total()))
}

#[cfg(test)]
mod tests {
    use crate::usage::table::UsageTable;

    use super::{render_report, report_caption, ReportLocale};

    #[test]
    fn test_render_report_exact_layout() {
        let table = UsageTable::from_iter([("A", 3600u64), ("B", 61)]);
        assert_eq!(
            render_report(&table, 3661, ReportLocale::Ru),
            "Общее время: 01:01:01\n\nВремя в приложениях:\n{A: 1:00:00}\n{B: 0:01:01}\n"
        );
    }

    #[test]
    fn test_render_report_empty_table() {
        assert_eq!(
            render_report(&UsageTable::new(), 0, ReportLocale::En),
            "Total time: 00:00:00\n\nTime in applications:\n"
        );
    }

    #[test]
    fn test_render_report_keeps_table_order() {
        let table = UsageTable::from_iter([("zsh", 5u64), ("Arc", 7200), ("Mail", 1)]);
        let report = render_report(&table, 7206, ReportLocale::En);
        let lines = report.lines().skip(3).collect::<Vec<_>>();
        assert_eq!(lines, vec!["{zsh: 0:00:05}", "{Arc: 2:00:00}", "{Mail: 0:00:01}"]);
    }

    #[test]
    fn test_caption_uses_table_total() {
        let table = UsageTable::from_iter([("A", 30u64), ("B", 40)]);
        assert_eq!(
            report_caption(&table, ReportLocale::Ru),
            "Статистика за последние: 00:01:10"
        );
    }
}
