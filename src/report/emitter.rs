use std::{path::PathBuf, sync::Arc};

use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info};

use crate::{error::ReportError, error::UploadError, usage::report::ReportLocale};

use super::{upload::Uploader, Report};

/// Progress of the most recent upload, meant for a status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Idle,
    InProgress(PathBuf),
    Delivered(PathBuf),
    Failed(String),
}

pub struct EmittedReport {
    pub path: PathBuf,
    /// Present when an uploader is configured. The upload runs on its own task.
    pub upload: Option<JoinHandle<Result<(), UploadError>>>,
}

/// Writes reports into a directory and hands them to the uploader without waiting for it.
pub struct ReportEmitter {
    dir: PathBuf,
    locale: ReportLocale,
    uploader: Option<Arc<dyn Uploader>>,
    status: Arc<watch::Sender<UploadStatus>>,
}

impl ReportEmitter {
    pub fn new(dir: PathBuf, locale: ReportLocale, uploader: Option<Arc<dyn Uploader>>) -> Self {
        let (status, _) = watch::channel(UploadStatus::Idle);
        Self {
            dir,
            locale,
            uploader,
            status: Arc::new(status),
        }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadStatus> {
        self.status.subscribe()
    }

    pub async fn emit(&self, report: &Report) -> Result<EmittedReport, ReportError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let file_name = report.scope.file_name(report.date);
        let path = self.dir.join(&file_name);
        let content = report.render(self.locale);
        tokio::fs::write(&path, &content).await?;
        info!("Wrote {:?} report to {path:?}", report.scope);

        let upload = self.uploader.clone().map(|uploader| {
            let caption = report.caption(self.locale);
            let status = self.status.clone();
            let path = path.clone();
            status.send_replace(UploadStatus::InProgress(path.clone()));
            tokio::spawn(async move {
                let result = uploader
                    .upload(&file_name, content.into_bytes(), &caption)
                    .await;
                match &result {
                    Ok(()) => {
                        info!("Uploaded {path:?}");
                        status.send_replace(UploadStatus::Delivered(path));
                    }
                    Err(e) => {
                        error!("Failed to upload {path:?}: {e}");
                        status.send_replace(UploadStatus::Failed(e.to_string()));
                    }
                }
                result
            })
        });

        Ok(EmittedReport { path, upload })
    }
}
