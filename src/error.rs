use chrono::NaiveDate;
use thiserror::Error;

use crate::session::state::SessionState;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("can't {operation} a session that is {from}")]
    InvalidTransition {
        from: SessionState,
        operation: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upload rejected with status {status}: {description}")]
    Rejected { status: u16, description: String },
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("no statistics were recorded on {0}")]
    NoData(NaiveDate),
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
