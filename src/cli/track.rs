use std::{
    io::Write,
    path::{Path, PathBuf},
};

use ansi_term::{Colour, Style};
use anyhow::{anyhow, bail, Result};
use chrono::NaiveTime;
use futures::StreamExt;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::{mpsc, watch},
};
use tokio_stream::wrappers::LinesStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    report::{
        emitter::{ReportEmitter, UploadStatus},
        ReportScope,
    },
    session::{
        controller::{
            Command, ControllerSettings, SessionController, SessionObserver,
            DEFAULT_TICK_INTERVAL,
        },
        schedule::DailySchedule,
        shutdown::detect_shutdown,
        state::{Mode, Session, SessionState},
    },
    storage::{json_store::JsonUsageStore, memory::MemoryUsageStore, UsageStore},
    usage::{
        accumulator::{Persistence, UsageAccumulator},
        report::ReportLocale,
        table::UsageTable,
    },
    utils::{
        clock::{local_offset, DefaultClock},
        time::{format_clock, format_hms, parse_duration, parse_time_of_day},
    },
    window_api::SystemForegroundApp,
};

use super::{create_uploader, load_config};

#[derive(Debug, clap::Args)]
pub struct TrackCommand {
    #[arg(
        long,
        value_parser = parse_duration,
        help = "Stop automatically after this much tracked time. Accepts HH:MM:SS, HH:MM or seconds. 0 means no limit"
    )]
    limit: Option<u64>,
    #[arg(
        long = "send-at",
        value_parser = parse_time_of_day,
        help = "Send the current report every day at this local time, for example 19:00:00"
    )]
    send_at: Option<NaiveTime>,
    #[arg(long, help = "Directory for report files. Overrides the configuration")]
    report_dir: Option<PathBuf>,
    #[arg(
        long,
        value_enum,
        default_value = "daily",
        help = "`daily` keeps statistics on disk until reset, `memory` forgets them on stop"
    )]
    persistence: Persistence,
    #[arg(long, help = "Don't upload reports. The configuration file becomes optional")]
    offline: bool,
    #[arg(long, value_enum, help = "Language of the report files")]
    locale: Option<ReportLocale>,
    #[arg(long, help = "Wait for a `start` command instead of starting right away")]
    idle: bool,
}

/// A line typed into the tracking console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(Command),
    Help,
    Quit,
    Empty,
}

const HELP: &str = "\
Commands:
  start                          start a new run
  pause, resume                  pause or resume the run
  stop                           stop the run and write the report
  limit HH:MM:SS                 limit the next run, 0 removes the limit
  unbounded                      remove the limit of the next run
  report [current|today|week|all]
                                 write and send a report
  status                         print the current table
  reset yes                      erase all statistics
  quit                           stop tracking and exit";

pub fn parse_input(line: &str) -> Result<Input> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(Input::Empty);
    };
    let argument = words.next();
    if let Some(extra) = words.next() {
        bail!("Unexpected argument `{extra}`");
    }

    let command = match (name.to_lowercase().as_str(), argument) {
        ("help" | "?", None) => return Ok(Input::Help),
        ("quit" | "exit", None) => return Ok(Input::Quit),
        ("start", None) => Command::Start,
        ("pause", None) => Command::Pause,
        ("resume", None) => Command::Resume,
        ("stop", None) => Command::Stop,
        ("status", None) => Command::Status,
        ("unbounded", None) => Command::SelectMode(Mode::Unbounded),
        ("limit", Some(limit)) => Command::SelectMode(Mode::from_limit(parse_duration(limit)?)),
        ("limit", None) => bail!("`limit` needs a duration such as 00:30:00"),
        ("report", scope) => Command::Report(parse_scope(scope.unwrap_or("current"))?),
        ("reset", Some("yes")) => Command::Reset,
        ("reset", _) => bail!("Type `reset yes` to erase all statistics"),
        (_, _) => bail!("Unknown command `{line}`. Type `help` to list commands"),
    };
    Ok(Input::Command(command))
}

fn parse_scope(value: &str) -> Result<ReportScope> {
    match value.to_lowercase().as_str() {
        "current" => Ok(ReportScope::Current),
        "today" => Ok(ReportScope::Today),
        "week" => Ok(ReportScope::Week),
        "all" => Ok(ReportScope::All),
        _ => Err(anyhow!("Unknown report `{value}`")),
    }
}

/// Prints session events to the terminal. The tick line is redrawn in place.
#[derive(Default)]
struct ConsoleObserver {
    tick_line: bool,
}

impl ConsoleObserver {
    fn end_tick_line(&mut self) {
        if std::mem::take(&mut self.tick_line) {
            println!();
        }
    }
}

impl SessionObserver for ConsoleObserver {
    fn on_state_changed(&mut self, session: &Session) {
        self.end_tick_line();
        let state = match session.state() {
            SessionState::Running => Colour::Green.paint("running"),
            SessionState::Paused => Colour::Yellow.paint("paused"),
            SessionState::Stopped => Colour::Red.paint("stopped"),
            SessionState::Idle => Style::new().paint("idle"),
        };
        println!("Session is {state} ({})", session.mode());
    }

    fn on_tick(&mut self, session: &Session, app_name: &str, _table: &UsageTable) {
        print!(
            "\r{} {}\x1b[K",
            Style::new().bold().paint(format_hms(session.elapsed())),
            app_name
        );
        let _ = std::io::stdout().flush();
        self.tick_line = true;
    }

    fn on_status(&mut self, session: &Session, table: &UsageTable) {
        self.end_tick_line();
        println!(
            "{} {}, next run: {}",
            Style::new().bold().paint(session.state().to_string()),
            format_hms(session.elapsed()),
            session.selected_mode()
        );
        for (app_name, seconds) in table.iter() {
            println!("  {}\t{app_name}", format_clock(seconds));
        }
    }

    fn on_report_emitted(&mut self, scope: ReportScope, path: &Path) {
        self.end_tick_line();
        println!("Wrote {scope:?} report to {}", path.display());
    }

    fn on_error(&mut self, error: &anyhow::Error) {
        self.end_tick_line();
        eprintln!("{} {error:#}", Colour::Red.paint("error:"));
    }
}

/// Runs an interactive tracking session until `quit` or Ctrl-C. Reaching the limit only stops
/// the run, the console keeps accepting commands.
pub async fn process_track_command(app_dir: PathBuf, command: TrackCommand) -> Result<()> {
    let config = load_config(&app_dir, command.offline)?;
    let foreground = SystemForegroundApp::new()?;

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
    let schedule = command
        .send_at
        .or(config.as_ref().and_then(|v| v.send_time))
        .map(DailySchedule::new);
    let session = Session::new(Mode::from_limit(command.limit.unwrap_or(0)));
    let settings = ControllerSettings {
        tick_interval: DEFAULT_TICK_INTERVAL,
        offset: local_offset(),
        schedule,
    };
    let retention = command.persistence.retention();
    info!(
        "Tracking with {retention:?}, {} and reports in {:?}",
        session.selected_mode(),
        emitter.dir()
    );

    let start = !command.idle;
    match command.persistence {
        Persistence::Daily => {
            let accumulator =
                UsageAccumulator::new(JsonUsageStore::new(app_dir)?, retention).await?;
            track(accumulator, session, foreground, emitter, settings, start).await
        }
        Persistence::Memory => {
            let accumulator = UsageAccumulator::new(MemoryUsageStore::new(), retention).await?;
            track(accumulator, session, foreground, emitter, settings, start).await
        }
    }
}

async fn track<S: UsageStore>(
    accumulator: UsageAccumulator<S>,
    session: Session,
    foreground: SystemForegroundApp,
    emitter: ReportEmitter,
    settings: ControllerSettings,
    start: bool,
) -> Result<()> {
    let upload_status = emitter.subscribe();
    let mut controller = SessionController::new(
        session,
        accumulator,
        Box::new(foreground),
        Box::new(DefaultClock),
        emitter,
        Box::new(ConsoleObserver::default()),
        settings,
    );

    let (sender, receiver) = mpsc::channel(16);
    let shutdown = CancellationToken::new();

    println!("{HELP}");
    if start {
        sender.send(Command::Start).await?;
    }

    let (_, result, _, _) = tokio::join!(
        detect_shutdown(shutdown.clone()),
        async {
            let result = controller.run(receiver, shutdown.clone()).await;
            shutdown.cancel();
            result
        },
        read_commands(sender, shutdown.clone()),
        print_upload_status(upload_status, shutdown.clone()),
    );
    result
}

/// Forwards stdin lines to the controller. When stdin closes tracking continues until shutdown.
async fn read_commands(sender: mpsc::Sender<Command>, shutdown: CancellationToken) {
    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => return,
            line = lines.next() => line,
        };
        let line = match line {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("Failed to read a command {e}");
                continue;
            }
            None => {
                debug!("Stdin closed");
                break;
            }
        };
        match parse_input(&line) {
            Ok(Input::Command(command)) => {
                if sender.send(command).await.is_err() {
                    return;
                }
            }
            Ok(Input::Help) => println!("{HELP}"),
            Ok(Input::Quit) => {
                shutdown.cancel();
                return;
            }
            Ok(Input::Empty) => {}
            Err(e) => eprintln!("{} {e}", Colour::Red.paint("error:")),
        }
    }
    shutdown.cancelled().await;
}

async fn print_upload_status(
    mut status: watch::Receiver<UploadStatus>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            changed = status.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
        match &*status.borrow_and_update() {
            UploadStatus::Idle | UploadStatus::InProgress(_) => {}
            UploadStatus::Delivered(path) => println!("Uploaded {}", path.display()),
            UploadStatus::Failed(e) => {
                eprintln!("{} {e}", Colour::Red.paint("upload failed:"))
            }
        }
    }
}
