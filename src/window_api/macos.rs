use std::process::Command;

use anyhow::{bail, Result};
use tracing::instrument;

use super::ForegroundApp;

const FRONTMOST_SCRIPT: &str = r#"tell application "System Events"
    set frontApp to name of first application process whose frontmost is true
end tell
return frontApp"#;

/// Asks System Events for the frontmost process through `osascript`.
pub struct MacForegroundApp {}

impl MacForegroundApp {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for MacForegroundApp {
    fn default() -> Self {
        Self::new()
    }
}

impl ForegroundApp for MacForegroundApp {
    #[instrument(skip(self))]
    fn current_foreground_app(&mut self) -> Result<String> {
        let output = Command::new("osascript")
            .args(["-e", FRONTMOST_SCRIPT])
            .output()?;
        if !output.status.success() {
            bail!(
                "osascript exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let name = String::from_utf8(output.stdout)?.trim().to_string();
        if name.is_empty() {
            bail!("osascript returned no application name");
        }
        Ok(name)
    }
}
