//! Startup-time backend selection.

use std::sync::Arc;
use tracing::info;

use super::memory::{InMemoryChatService, InMemoryEmailService, InMemoryRecordStore};
use super::ports::{ChatService, EmailService, RecordStore};
use crate::config::KioskConfig;

/// The collaborator set a pipeline is built from.
#[derive(Clone)]
pub struct Backends {
    /// Visitor record store.
    pub records: Arc<dyn RecordStore>,
    /// Email provider.
    pub email: Arc<dyn EmailService>,
    /// Team chat.
    pub chat: Arc<dyn ChatService>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}

impl Backends {
    /// Everything in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            records: Arc::new(InMemoryRecordStore::new()),
            email: Arc::new(InMemoryEmailService::new()),
            chat: Arc::new(InMemoryChatService::new()),
        }
    }

    /// Picks HTTP backends where credentials are configured and in-memory
    /// ones elsewhere. The record store client lives outside this crate and
    /// is passed in.
    #[must_use]
    pub fn from_config(config: &KioskConfig, records: Arc<dyn RecordStore>) -> Self {
        let email = Self::email_backend(config);
        let chat = Self::chat_backend(config);
        Self {
            records,
            email,
            chat,
        }
    }

    #[cfg(feature = "http")]
    fn email_backend(config: &KioskConfig) -> Arc<dyn EmailService> {
        match &config.resend_api_key {
            Some(key) if !config.use_mock_email() => {
                info!(from = %config.from_email, "Using HTTP email backend");
                Arc::new(super::http::HttpEmailService::new(
                    key.clone(),
                    &config.from_email,
                    &config.from_name,
                ))
            }
            _ => {
                info!("Email service running in mock mode");
                Arc::new(InMemoryEmailService::new())
            }
        }
    }

    #[cfg(not(feature = "http"))]
    fn email_backend(_config: &KioskConfig) -> Arc<dyn EmailService> {
        info!("Email service running in mock mode");
        Arc::new(InMemoryEmailService::new())
    }

    #[cfg(feature = "http")]
    fn chat_backend(config: &KioskConfig) -> Arc<dyn ChatService> {
        match &config.chat_webhook_url {
            Some(url) if !config.use_mock_chat() => {
                info!("Using chat webhook backend");
                Arc::new(super::http::WebhookChatService::new(url.clone()))
            }
            _ => {
                info!("Chat service running in mock mode");
                Arc::new(InMemoryChatService::new())
            }
        }
    }

    #[cfg(not(feature = "http"))]
    fn chat_backend(_config: &KioskConfig) -> Arc<dyn ChatService> {
        info!("Chat service running in mock mode");
        Arc::new(InMemoryChatService::new())
    }
}
