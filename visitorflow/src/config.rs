//! Process-level configuration loaded from the environment.
//!
//! A `.env` file in the working directory is read first when present.
//! Unset credentials switch the matching backend to its in-memory mock.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::VisitorflowError;
use crate::observability::LogFormat;
use crate::pipeline::PipelineConfig;

/// Default record-store account URL.
pub const DEFAULT_ACCOUNT_URL: &str = "https://sqla-studio.monday.com";
/// Default sender address.
pub const DEFAULT_FROM_EMAIL: &str = "visitors@sqla-visitors.com";
/// Default sender name.
pub const DEFAULT_FROM_NAME: &str = "SQLA Studio";

/// Builds links to visitor records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLinks {
    /// Account base URL.
    pub account_url: String,
    /// Visitors board id.
    pub board_id: Option<String>,
}

impl Default for RecordLinks {
    fn default() -> Self {
        Self {
            account_url: DEFAULT_ACCOUNT_URL.to_string(),
            board_id: None,
        }
    }
}

impl RecordLinks {
    /// Links into `board_id` under `account_url`.
    #[must_use]
    pub fn new(account_url: impl Into<String>, board_id: impl Into<String>) -> Self {
        Self {
            account_url: account_url.into().trim_end_matches('/').to_string(),
            board_id: Some(board_id.into()),
        }
    }

    /// `{account}/boards/{board}/pulses/{id}`, or `None` without a board.
    #[must_use]
    pub fn url_for(&self, item_id: u64) -> Option<String> {
        self.board_id
            .as_ref()
            .map(|board| format!("{}/boards/{board}/pulses/{item_id}", self.account_url))
    }
}

/// Kiosk deployment settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KioskConfig {
    /// Record store API key.
    pub monday_api_key: Option<String>,
    /// Record links.
    pub links: RecordLinks,
    /// Email provider API key.
    pub resend_api_key: Option<String>,
    /// Sender address.
    pub from_email: String,
    /// Sender display name.
    pub from_name: String,
    /// Chat webhook URL.
    pub chat_webhook_url: Option<String>,
    /// Log output format.
    pub log_format: LogFormat,
    /// Step retry policy.
    pub pipeline: PipelineConfig,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            monday_api_key: None,
            links: RecordLinks::default(),
            resend_api_key: None,
            from_email: DEFAULT_FROM_EMAIL.to_string(),
            from_name: DEFAULT_FROM_NAME.to_string(),
            chat_webhook_url: None,
            log_format: LogFormat::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl KioskConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, VisitorflowError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, VisitorflowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = PipelineConfig::default();

        let pipeline = PipelineConfig {
            max_retries: parse_or(&get, "VISITORFLOW_MAX_RETRIES", defaults.max_retries)?,
            retry_delay_ms: parse_or(&get, "VISITORFLOW_RETRY_DELAY_MS", defaults.retry_delay_ms)?,
            timeout_ms: parse_or(&get, "VISITORFLOW_TIMEOUT_MS", defaults.timeout_ms)?,
            continue_on_failure: parse_or(
                &get,
                "VISITORFLOW_CONTINUE_ON_FAILURE",
                defaults.continue_on_failure,
            )?,
        };

        Ok(Self {
            monday_api_key: get("MONDAY_API_KEY"),
            links: RecordLinks {
                account_url: get("MONDAY_ACCOUNT_URL")
                    .map_or_else(|| DEFAULT_ACCOUNT_URL.to_string(), |u| u.trim_end_matches('/').to_string()),
                board_id: get("MONDAY_VISITORS_BOARD_ID"),
            },
            resend_api_key: get("RESEND_API_KEY"),
            from_email: get("RESEND_FROM_EMAIL").unwrap_or_else(|| DEFAULT_FROM_EMAIL.to_string()),
            from_name: get("RESEND_FROM_NAME").unwrap_or_else(|| DEFAULT_FROM_NAME.to_string()),
            chat_webhook_url: get("GOOGLE_CHAT_WEBHOOK_URL"),
            log_format: get("VISITORFLOW_LOG_FORMAT")
                .map(|v| v.parse::<LogFormat>())
                .transpose()?
                .unwrap_or_default(),
            pipeline,
        })
    }

    /// True when no record store credentials are configured.
    #[must_use]
    pub fn use_mock_records(&self) -> bool {
        self.monday_api_key.is_none()
    }

    /// True when no email API key is configured.
    #[must_use]
    pub fn use_mock_email(&self) -> bool {
        self.resend_api_key.is_none()
    }

    /// True when no chat webhook is configured.
    #[must_use]
    pub fn use_mock_chat(&self) -> bool {
        self.chat_webhook_url.is_none()
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, VisitorflowError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| VisitorflowError::config(format!("{key}='{raw}': {e}"))),
    }
}
