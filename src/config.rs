use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};

use crate::{usage::report::ReportLocale, utils::time::parse_time_of_day};

pub const CONFIG_FILE: &str = "config.json";

/// Contents of `config.json` in the application directory. Only the upload credentials are
/// required.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(rename = "TOKEN")]
    pub token: String,
    #[serde(deserialize_with = "string_or_number")]
    pub chat_id: String,
    #[serde(default)]
    pub report_dir: Option<PathBuf>,
    #[serde(default, deserialize_with = "optional_time")]
    pub send_time: Option<chrono::NaiveTime>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub locale: Option<ReportLocale>,
}

impl Config {
    /// Loads the config from `app_dir`. A missing or malformed file is an error, tracking must not
    /// start without it.
    pub fn load(app_dir: &Path) -> Result<Self> {
        let path = app_dir.join(CONFIG_FILE);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration {path:?}"))?;
        Self::parse(&content).with_context(|| format!("Invalid configuration in {path:?}"))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

/// Chat ids are numbers for users and groups but `@name` strings for channels.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ChatId {
        Text(String),
        Number(i64),
    }

    Ok(match ChatId::deserialize(deserializer)? {
        ChatId::Text(v) => v,
        ChatId::Number(v) => v.to_string(),
    })
}

fn optional_time<'de, D>(deserializer: D) -> Result<Option<chrono::NaiveTime>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|v| parse_time_of_day(&v).map_err(serde::de::Error::custom))
        .transpose()
}
