//! HTTP backends: a Resend-style email API and a chat webhook.

use async_trait::async_trait;
use base64::Engine;
use serde_json::json;
use tracing::{debug, instrument, warn};

use super::ports::{ChatService, EmailService};
use super::templates::{
    host_notification_email, visitor_arrival_card, welcome_attachments, welcome_email,
    Attachment, EmailTemplate, StudioInfo,
};
use crate::errors::ServiceError;
use crate::recovery::{send_checked, NETWORK_TIMEOUT};
use crate::registration::{HostNotification, SendOutcome, VisitorRegistration, WelcomePackageOptions};
use crate::utils::{generate_message_id, now_utc};

/// Email sent through a Resend-compatible REST API.
#[derive(Clone)]
pub struct HttpEmailService {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    from: String,
    studio: StudioInfo,
}

impl std::fmt::Debug for HttpEmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmailService")
            .field("api_base", &self.api_base)
            .field("from", &self.from)
            .field("has_api_key", &!self.api_key.is_empty())
            .finish()
    }
}

impl HttpEmailService {
    /// Production API endpoint.
    pub const DEFAULT_API_BASE: &'static str = "https://api.resend.com";

    /// Creates a sender for `from_name <from_email>`.
    #[must_use]
    pub fn new(
        api_key: impl Into<String>,
        from_email: impl AsRef<str>,
        from_name: impl AsRef<str>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: Self::DEFAULT_API_BASE.to_string(),
            api_key: api_key.into(),
            from: format!("{} <{}>", from_name.as_ref(), from_email.as_ref()),
            studio: StudioInfo::default(),
        }
    }

    /// Points the service at another API host.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Overrides the studio details printed in welcome emails.
    #[must_use]
    pub fn with_studio_info(mut self, studio: StudioInfo) -> Self {
        self.studio = studio;
        self
    }

    /// The `From` header value.
    #[must_use]
    pub fn from_header(&self) -> &str {
        &self.from
    }

    #[instrument(skip(self, template, attachments), fields(subject = %template.subject))]
    async fn send(
        &self,
        to: &str,
        template: EmailTemplate,
        attachments: Vec<Attachment>,
    ) -> Result<SendOutcome, ServiceError> {
        let engine = base64::engine::general_purpose::STANDARD;
        let attachments: Vec<serde_json::Value> = attachments
            .into_iter()
            .map(|a| {
                json!({
                    "filename": a.filename,
                    "content": engine.encode(&a.content),
                    "type": a.content_type,
                })
            })
            .collect();

        let body = json!({
            "from": self.from,
            "to": [to],
            "subject": template.subject,
            "html": template.html,
            "text": template.text,
            "attachments": attachments,
        });

        let request = self
            .client
            .post(format!("{}/emails", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body);
        let response = send_checked(request, NETWORK_TIMEOUT).await?;
        let message_id = response_field(response, "id")
            .await
            .unwrap_or_else(|| generate_message_id("email"));
        debug!(message_id = %message_id, "Email accepted");

        Ok(SendOutcome::sent(message_id))
    }
}

#[async_trait]
impl EmailService for HttpEmailService {
    async fn send_host_notification(
        &self,
        notification: &HostNotification,
    ) -> Result<SendOutcome, ServiceError> {
        let template = host_notification_email(notification);
        self.send(&notification.host_email, template, Vec::new()).await
    }

    async fn send_welcome_package(
        &self,
        registration: &VisitorRegistration,
        options: &WelcomePackageOptions,
    ) -> Result<SendOutcome, ServiceError> {
        let visit_date = now_utc().format("%Y-%m-%d").to_string();
        let template = welcome_email(registration, &visit_date, &self.studio);
        let attachments = welcome_attachments(registration, options);
        self.send(&registration.email, template, attachments).await
    }
}

/// Team notifications posted to an incoming chat webhook.
#[derive(Debug, Clone)]
pub struct WebhookChatService {
    client: reqwest::Client,
    webhook_url: String,
}

impl WebhookChatService {
    /// Creates a poster for the given webhook.
    #[must_use]
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: webhook_url.into(),
        }
    }
}

#[async_trait]
impl ChatService for WebhookChatService {
    #[instrument(skip(self, registration))]
    async fn notify_team_of_visitor(
        &self,
        registration: &VisitorRegistration,
        record_url: Option<String>,
    ) -> Result<SendOutcome, ServiceError> {
        let arrival = now_utc().format("%Y-%m-%d %H:%M UTC").to_string();
        let card = visitor_arrival_card(registration, &arrival, record_url.as_deref());

        let request = self.client.post(&self.webhook_url).json(&card);
        let response = send_checked(request, NETWORK_TIMEOUT).await?;
        let message_id = response_field(response, "name")
            .await
            .unwrap_or_else(|| generate_message_id("chat"));

        Ok(SendOutcome::sent(message_id))
    }
}

/// Reads a string field from an accepted response.
///
/// The request was already delivered, so an unreadable or non-JSON body
/// yields `None` instead of an error.
async fn response_field(response: reqwest::Response, field: &str) -> Option<String> {
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e.without_url(), "Failed to read response body");
            return None;
        }
    };
    serde_json::from_slice::<serde_json::Value>(&body)
        .ok()?
        .get(field)?
        .as_str()
        .map(str::to_string)
}
