//! Contains logic for finding out which application is focused in different environments.
//! [SystemForegroundApp] is the main artifact of this module that abstracts the operations.

#[cfg(feature = "macos")]
pub mod macos;
#[cfg(feature = "win")]
pub mod win;
#[cfg(feature = "x11")]
pub mod x11;

#[cfg(feature = "win")]
extern crate windows;

#[cfg(feature = "x11")]
extern crate xcb;

use anyhow::Result;

/// Contract every platform backend must implement.
#[cfg_attr(test, mockall::automock)]
pub trait ForegroundApp {
    /// Name of the focused application, exactly as the platform reports it. For example `Safari`
    /// or `nvim`.
    fn current_foreground_app(&mut self) -> Result<String>;
}

/// Serves as a cross-compatible [ForegroundApp] implementation.
pub struct SystemForegroundApp {
    inner: Box<dyn ForegroundApp>,
}

impl SystemForegroundApp {
    pub fn new() -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                Ok(Self {
                    inner: Box::new(win::WindowsForegroundApp::new()),
                })
            }
            else if #[cfg(feature = "x11")] {
                Ok(Self {
                    inner: Box::new(x11::X11ForegroundApp::new()?),
                })
            }
            else if #[cfg(feature = "macos")] {
                Ok(Self {
                    inner: Box::new(macos::MacForegroundApp::new()),
                })
            }
            else {
                Err(anyhow::anyhow!(
                    "No foreground application backend was compiled in. Enable one of the `win`, `x11` or `macos` features"
                ))
            }
        }
    }
}

impl ForegroundApp for SystemForegroundApp {
    fn current_foreground_app(&mut self) -> Result<String> {
        self.inner.current_foreground_app()
    }
}
