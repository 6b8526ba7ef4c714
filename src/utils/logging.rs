use std::{path::PathBuf, sync::LazyLock};

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::{
    fmt::{format::FmtSpan, writer::MakeWriterExt},
    EnvFilter,
};

const LOG_FILES_KEPT: usize = 5;

/// Which log file a command writes to. The tracker runs for hours and gets a file of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Track,
    Cli,
}

impl LogTarget {
    fn file_prefix(self) -> &'static str {
        match self {
            LogTarget::Track => "track",
            LogTarget::Cli => "cli",
        }
    }
}

pub struct LogOptions {
    pub target: LogTarget,
    pub dir: PathBuf,
    /// Overrides `RUST_LOG`. Without either the level is `info`.
    pub level: Option<LevelFilter>,
    /// Mirror records to stdout.
    pub console: bool,
}

fn env_filter(level: Option<LevelFilter>) -> EnvFilter {
    let crate_name = env!("CARGO_PKG_NAME").replace('-', "_");
    match level {
        Some(level) => EnvFilter::new(format!("{crate_name}={level}")),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("{crate_name}=info"))),
    }
}

/// Installs a subscriber writing into a daily rotated file in `options.dir`.
pub fn enable_logging(options: LogOptions) -> Result<()> {
    let appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(LOG_FILES_KEPT)
        .filename_prefix(options.target.file_prefix())
        .filename_suffix("log")
        .build(&options.dir)?;

    let console = options.console;
    let stdout = std::io::stdout.with_filter(move |_| console);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(options.level))
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(false)
        .with_writer(stdout.and(appender))
        .init();
    Ok(())
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .pretty()
        .try_init();
});
