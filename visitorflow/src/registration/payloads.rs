//! Payloads derived from a registration and the outcomes of sending them.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::visitor::VisitorRegistration;
use crate::errors::ServiceError;

/// Data for the host-arrival email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostNotification {
    /// Host display name.
    pub host_name: String,
    /// Recipient address.
    pub host_email: String,
    /// Visitor full name.
    pub visitor_name: String,
    /// Visitor email address.
    pub visitor_email: String,
    /// Visitor organisation.
    pub visitor_company: Option<String>,
    /// Arrival time as shown to the host.
    pub visit_time: String,
    /// Link to the visitor record.
    pub record_url: Option<String>,
}

impl HostNotification {
    /// Builds the notification for a registration.
    #[must_use]
    pub fn for_registration(
        reg: &VisitorRegistration,
        visit_time: impl Into<String>,
        record_url: Option<String>,
    ) -> Self {
        Self {
            host_name: reg.host_name.clone(),
            host_email: reg.host_email.clone(),
            visitor_name: reg.full_name(),
            visitor_email: reg.email.clone(),
            visitor_company: reg.company_name.clone(),
            visit_time: visit_time.into(),
            record_url,
        }
    }
}

/// What to attach to the welcome email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomePackageOptions {
    /// Attach the signed NDA.
    pub include_pdf: bool,
    /// Attach the studio map.
    pub include_studio_map: bool,
    /// Attach WiFi and access information.
    pub include_wifi_info: bool,
}

impl WelcomePackageOptions {
    /// Standard package: the NDA when one was signed, plus studio documents.
    #[must_use]
    pub fn for_registration(reg: &VisitorRegistration) -> Self {
        Self {
            include_pdf: reg.has_pdf(),
            include_studio_map: true,
            include_wifi_info: true,
        }
    }
}

/// Channel a notification went out on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Email provider.
    Email,
    /// Team chat webhook.
    Chat,
}

impl NotificationKind {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Chat => "chat",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery outcome recorded against the visitor record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Accepted by the provider.
    Sent,
    /// Refused or errored.
    Failed,
}

impl DeliveryStatus {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an email or chat provider reported for one send.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    /// Whether the provider accepted the message.
    pub success: bool,
    /// Provider message id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Provider error text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendOutcome {
    /// A delivered message.
    #[must_use]
    pub fn sent(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    /// A message the provider refused.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }

    /// Status to record against the visitor record.
    #[must_use]
    pub fn delivery_status(&self) -> DeliveryStatus {
        if self.success {
            DeliveryStatus::Sent
        } else {
            DeliveryStatus::Failed
        }
    }

    /// Turns a refused send into [`ServiceError::Rejected`].
    ///
    /// # Errors
    ///
    /// Returns the provider's error when `success` is false.
    pub fn into_result(self) -> Result<Self, ServiceError> {
        if self.success {
            Ok(self)
        } else {
            Err(ServiceError::rejected(
                self.error.unwrap_or_else(|| "send reported failure".to_string()),
            ))
        }
    }
}
