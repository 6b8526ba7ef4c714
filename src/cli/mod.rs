pub mod report;
pub mod track;

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::{Parser, Subcommand};
use report::{process_report_command, process_reset_command, process_show_command};
use report::{ReportCommand, ResetCommand, ShowCommand};
use tracing::{level_filters::LevelFilter, warn};
use track::{process_track_command, TrackCommand};

use crate::{
    config::Config,
    report::upload::{TelegramUploader, Uploader},
    utils::{
        dir::application_path,
        logging::{enable_logging, LogOptions, LogTarget},
    },
};

#[derive(Parser, Debug)]
#[command(name = "crono", version, long_about = None)]
#[command(about = "Tracks how long each focused application is used", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default $XDG_STATE_HOME/crono or $HOME/.local/state/crono"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Log everything down to trace level")]
    log: bool,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console", global = true)]
    log_console: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Track the focused application every second. Controlled through stdin")]
    Track {
        #[command(flatten)]
        command: TrackCommand,
    },
    #[command(about = "Write a report file and upload it")]
    Report {
        #[command(flatten)]
        command: ReportCommand,
    },
    #[command(about = "Print usage with the share of each application")]
    Show {
        #[command(flatten)]
        command: ShowCommand,
    },
    #[command(about = "Erase all recorded statistics")]
    Reset {
        #[command(flatten)]
        command: ResetCommand,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = application_path(args.dir)?;
    enable_logging(LogOptions {
        target: match args.commands {
            Commands::Track { .. } => LogTarget::Track,
            Commands::Report { .. } | Commands::Show { .. } | Commands::Reset { .. } => {
                LogTarget::Cli
            }
        },
        dir: app_dir.join("logs"),
        level: args.log.then_some(LevelFilter::TRACE),
        console: args.log_console,
    })?;

    match args.commands {
        Commands::Track { command } => process_track_command(app_dir, command).await,
        Commands::Report { command } => process_report_command(app_dir, command).await,
        Commands::Show { command } => process_show_command(app_dir, command).await,
        Commands::Reset { command } => process_reset_command(app_dir, command).await,
    }
}

/// Configuration is mandatory unless uploads are disabled, in which case a missing file is
/// tolerated.
fn load_config(app_dir: &std::path::Path, offline: bool) -> Result<Option<Config>> {
    match Config::load(app_dir) {
        Ok(config) => Ok(Some(config)),
        Err(e) if offline => {
            warn!("Running offline without configuration: {e:#}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn create_uploader(config: Option<&Config>, offline: bool) -> Option<Arc<dyn Uploader>> {
    if offline {
        return None;
    }
    config.map(|config| {
        Arc::new(TelegramUploader::new(
            config.token.clone(),
            config.chat_id.clone(),
            config.api_base.clone(),
        )) as Arc<dyn Uploader>
    })
}
