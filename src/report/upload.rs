use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::UploadError;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Destination for written reports. Receives the rendered text, so later reports reusing the
/// same file name can't replace it before delivery.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, file_name: &str, content: Vec<u8>, caption: &str)
        -> Result<(), UploadError>;
}

/// Sends reports as documents through the Telegram Bot API.
pub struct TelegramUploader {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
}

#[derive(Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

impl TelegramUploader {
    pub fn new(token: String, chat_id: String, api_base: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base
                .unwrap_or_else(|| TELEGRAM_API_BASE.into())
                .trim_end_matches('/')
                .to_string(),
            token,
            chat_id,
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }
}

#[async_trait]
impl Uploader for TelegramUploader {
    #[instrument(skip(self, content, caption))]
    async fn upload(
        &self,
        file_name: &str,
        content: Vec<u8>,
        caption: &str,
    ) -> Result<(), UploadError> {
        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption.to_string())
            .part(
                "document",
                Part::bytes(content).file_name(file_name.to_string()),
            );

        let response = self
            .client
            .post(self.api_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body: Option<TelegramResponse> = response.json().await.ok();
        debug!("sendDocument answered {status}");

        match body {
            Some(TelegramResponse { ok: true, .. }) if status.is_success() => Ok(()),
            Some(TelegramResponse { description, .. }) => Err(UploadError::Rejected {
                status: status.as_u16(),
                description: description.unwrap_or_else(|| "unknown".into()),
            }),
            None => Err(UploadError::Rejected {
                status: status.as_u16(),
                description: "unreadable response".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TelegramUploader;

    #[test]
    fn test_api_url() {
        let uploader = TelegramUploader::new(
            "123:abc".into(),
            "42".into(),
            Some("http://localhost:8081/".into()),
        );
        assert_eq!(
            uploader.api_url("sendDocument"),
            "http://localhost:8081/bot123:abc/sendDocument"
        );

        let default = TelegramUploader::new("t".into(), "1".into(), None);
        assert_eq!(
            default.api_url("sendDocument"),
            "https://api.telegram.org/bott/sendDocument"
        );
    }
}
