use std::{
    fmt::Display,
    io::{BufRead, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, ValueEnum};
use tracing::info;

use crate::{
    report::{collect_report, emitter::ReportEmitter, ReportScope},
    storage::{json_store::JsonUsageStore, UsageStore},
    usage::{
        accumulator::{Retention, UsageAccumulator},
        report::ReportLocale,
        table::UsageTable,
    },
    utils::{
        percentage::{seconds_percentage, Percentage},
        time::format_clock,
    },
};

use super::{create_uploader, load_config, Args};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct DateArgs {
    #[arg(
        long,
        help = "Day of the report. For the week it's the last day. Examples are \"yesterday\", \"3 days ago\", \"15/03/2025\""
    )]
    date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

impl DateArgs {
    /// Today when no date was given.
    fn resolve(&self) -> Result<NaiveDate> {
        let now = Local::now();
        match &self.date {
            None => Ok(now.date_naive()),
            Some(date) => match parse_date_string(date, now, self.date_style.into()) {
                Ok(v) => Ok(v.date_naive()),
                Err(e) => Err(Args::command()
                    .error(
                        clap::error::ErrorKind::ValueValidation,
                        format!("Failed to validate date {e}"),
                    )
                    .into()),
            },
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct ReportCommand {
    #[arg(value_enum)]
    scope: ReportScope,
    #[command(flatten)]
    date: DateArgs,
    #[arg(long, help = "Directory for report files. Overrides the configuration")]
    report_dir: Option<PathBuf>,
    #[arg(long, help = "Only write the file, don't upload it")]
    offline: bool,
    #[arg(long, value_enum, help = "Language of the report file")]
    locale: Option<ReportLocale>,
}

/// Stored tables `show` can print. The live table only exists inside `track`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShowScope {
    Today,
    Week,
    All,
}

#[derive(Debug, clap::Args)]
pub struct ShowCommand {
    #[arg(value_enum)]
    scope: ShowScope,
    #[command(flatten)]
    date: DateArgs,
    #[arg(short = 'p', long = "percentage", help = "Hide apps below this share of the total", default_value_t = Percentage::new_opt(0.).unwrap())]
    min_percentage: Percentage,
}

#[derive(Debug, clap::Args)]
pub struct ResetCommand {
    #[arg(long, short, help = "Don't ask for confirmation")]
    yes: bool,
}

async fn open_store(app_dir: PathBuf) -> Result<UsageAccumulator<JsonUsageStore>> {
    UsageAccumulator::new(JsonUsageStore::new(app_dir)?, Retention::KeepUntilReset).await
}

/// Writes a report of stored statistics and waits for its upload, so the exit code tells whether
/// it was delivered.
pub async fn process_report_command(app_dir: PathBuf, command: ReportCommand) -> Result<()> {
    let config = load_config(&app_dir, command.offline)?;
    let date = command.date.resolve()?;

    let locale = command
        .locale
        .or(config.as_ref().and_then(|v| v.locale))
        .unwrap_or_default();
    let report_dir = command
        .report_dir
        .or(config.as_ref().and_then(|v| v.report_dir.clone()))
        .unwrap_or_else(|| app_dir.clone());
    let emitter = ReportEmitter::new(
        report_dir,
        locale,
        create_uploader(config.as_ref(), command.offline),
    );

    let mut accumulator = open_store(app_dir).await?;
    let report = collect_report(&mut accumulator, command.scope, date, None).await?;
    let emitted = emitter.emit(&report).await?;
    println!("Wrote {}", emitted.path.display());

    if let Some(upload) = emitted.upload {
        upload
            .await?
            .with_context(|| format!("Report {:?} was written but not uploaded", emitted.path))?;
        println!("Uploaded {}", emitted.path.display());
    }
    Ok(())
}

pub async fn process_show_command(app_dir: PathBuf, command: ShowCommand) -> Result<()> {
    let date = command.date.resolve()?;
    let mut accumulator = open_store(app_dir).await?;
    let table = match command.scope {
        ShowScope::Today => accumulator.today(date).await?,
        ShowScope::Week => Some(accumulator.week(date).await?),
        ShowScope::All => Some(accumulator.all_time().await?),
    };
    match table {
        Some(table) if !table.is_empty() => {
            print!("{}", format_usage(&table, command.min_percentage));
        }
        _ => println!("Nothing was tracked"),
    }
    Ok(())
}

/// One line per app in recording order with its share of the total. Apps below `min_percentage`
/// are left out but still count towards the total.
fn format_usage(table: &UsageTable, min_percentage: Percentage) -> String {
    let total = table.total();
    let mut output = String::new();
    for (app_name, seconds) in table.iter() {
        let percentage = seconds_percentage(seconds, total);
        if *percentage < *min_percentage {
            continue;
        }
        output.push_str(&format!(
            "{:>6}\t{}\t{app_name}\n",
            percentage.to_string(),
            format_clock(seconds)
        ));
    }
    output.push_str(&format!("Total\t{}\n", format_clock(total)));
    output
}

pub async fn process_reset_command(app_dir: PathBuf, command: ResetCommand) -> Result<()> {
    if !command.yes && !confirm("This erases all recorded statistics. Continue? [y/N] ")? {
        println!("Nothing was changed");
        return Ok(());
    }
    let mut store = JsonUsageStore::new(app_dir)?;
    store.clear().await?;
    info!("Statistics were reset from the command line");
    println!("Statistics were reset");
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use crate::{
        cli::{Args, Commands},
        usage::table::UsageTable,
        utils::percentage::Percentage,
    };

    use super::{format_usage, ShowScope};

    #[test]
    fn test_format_usage() {
        let table = UsageTable::from_iter([("Code", 90u64), ("Firefox", 9), ("Slack", 1)]);
        assert_eq!(
            format_usage(&table, Percentage::new_opt(5.).unwrap()),
            " 90.0%\t0:01:30\tCode\n  9.0%\t0:00:09\tFirefox\nTotal\t0:01:40\n"
        );
    }

    #[test]
    fn test_show_accepts_stored_scopes_only() {
        let args = Args::try_parse_from(["crono", "show", "week", "-p", "5"]).unwrap();
        match args.commands {
            Commands::Show { command } => assert_eq!(command.scope, ShowScope::Week),
            other => panic!("Parsed {other:?}"),
        }
        assert!(Args::try_parse_from(["crono", "show", "current"]).is_err());
        assert!(Args::try_parse_from(["crono", "report", "current"]).is_err());
    }
}
