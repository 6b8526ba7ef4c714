use std::time::Duration;

use anyhow::Result;
use crono::{cli::run_cli, utils::runtime::single_thread_runtime};
use tracing::error;

fn main() -> Result<()> {
    let runtime = single_thread_runtime()?;
    let result = runtime.block_on(run_cli()).inspect_err(|e| {
        error!("Error running cli {e:?}");
    });
    // Stdin is read on a blocking thread that never returns on its own.
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}
