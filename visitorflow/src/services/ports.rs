//! Collaborator interfaces consumed by the pipeline.
//!
//! Each external system is a capability trait with an in-memory and an HTTP
//! implementation; the backend is chosen once when the pipeline is built.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::registration::{
    DeliveryStatus, HostNotification, NotificationKind, SendOutcome, VisitorRegistration,
    WelcomePackageOptions,
};
use crate::upload::VisitorFile;
use crate::utils::{now_utc, Timestamp};

/// Column values written to a record.
pub type ColumnValues = serde_json::Map<String, serde_json::Value>;

/// Status label given to freshly created visitor records.
pub const REGISTERED_STATUS: &str = "Registered";

/// Fields of a visitor record about to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVisitorRecord {
    /// Given name.
    pub name: String,
    /// Family name.
    pub surname: String,
    /// Visitor email.
    pub email: String,
    /// Visitor organisation.
    pub organization: Option<String>,
    /// Host staff id.
    pub host_id: String,
    /// Host display name.
    pub host_name: String,
    /// Visit timestamp.
    pub visit_date: Timestamp,
    /// Initial status label.
    pub status: String,
}

impl NewVisitorRecord {
    /// Record fields for a registration, stamped now.
    #[must_use]
    pub fn from_registration(reg: &VisitorRegistration) -> Self {
        Self {
            name: reg.first_name.clone(),
            surname: reg.last_name.clone(),
            email: reg.email.clone(),
            organization: reg.company_name.clone(),
            host_id: reg.host_id.clone(),
            host_name: reg.host_name.clone(),
            visit_date: now_utc(),
            status: REGISTERED_STATUS.to_string(),
        }
    }

    /// Item name shown in the record store.
    #[must_use]
    pub fn item_name(&self) -> String {
        format!("{} {}", self.name, self.surname)
    }
}

/// Handle to a created record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    /// Record id.
    pub id: u64,
    /// Item name.
    pub name: String,
}

/// Descriptor returned after a file upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Record the file was attached to.
    pub item_id: u64,
    /// Column holding the file.
    pub column_id: String,
    /// Stored filename.
    pub filename: String,
    /// Size in bytes.
    pub size: usize,
    /// Public URL, when the store exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One delivery outcome tracked against a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEntry {
    /// Channel.
    pub kind: NotificationKind,
    /// Outcome.
    pub status: DeliveryStatus,
    /// Provider message id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// When it was recorded.
    pub timestamp: Timestamp,
}

/// Processing state of a record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStatus {
    /// Status label.
    pub status: String,
    /// Tracked notifications, oldest first.
    pub notifications: Vec<NotificationEntry>,
    /// Last write to the record.
    pub last_updated: Option<Timestamp>,
}

/// The work-management board holding visitor records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Creates a visitor record.
    async fn create_visitor_record(&self, record: NewVisitorRecord)
        -> Result<RecordRef, ServiceError>;

    /// Writes column values onto a record.
    async fn update_item(&self, item_id: u64, columns: ColumnValues) -> Result<(), ServiceError>;

    /// Attaches a file to a record column.
    async fn upload_file(
        &self,
        item_id: u64,
        column_id: &str,
        file: &VisitorFile,
    ) -> Result<UploadedFile, ServiceError>;

    /// Records the outcome of a notification send.
    async fn track_notification_status(
        &self,
        item_id: u64,
        kind: NotificationKind,
        status: DeliveryStatus,
        message_id: Option<String>,
    ) -> Result<(), ServiceError>;

    /// Reads a record's processing state.
    async fn get_item_status(&self, item_id: u64) -> Result<ItemStatus, ServiceError>;
}

/// Outbound email.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailService: Send + Sync {
    /// Tells the host their visitor has arrived.
    async fn send_host_notification(
        &self,
        notification: &HostNotification,
    ) -> Result<SendOutcome, ServiceError>;

    /// Sends the visitor their welcome package.
    async fn send_welcome_package(
        &self,
        registration: &VisitorRegistration,
        options: &WelcomePackageOptions,
    ) -> Result<SendOutcome, ServiceError>;
}

/// Team chat notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Announces a visitor to the team.
    async fn notify_team_of_visitor(
        &self,
        registration: &VisitorRegistration,
        record_url: Option<String>,
    ) -> Result<SendOutcome, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_from_registration() {
        let reg = VisitorRegistration::new("John", "Doe", "j@x.com")
            .with_host("1", "Sarah", "sarah@sqla.com")
            .with_company("Acme");

        let record = NewVisitorRecord::from_registration(&reg);
        assert_eq!(record.item_name(), "John Doe");
        assert_eq!(record.status, "Registered");
        assert_eq!(record.organization.as_deref(), Some("Acme"));
    }

    #[tokio::test]
    async fn test_record_store_is_mockable() {
        let mut store = MockRecordStore::new();
        store
            .expect_get_item_status()
            .withf(|id| *id == 7)
            .returning(|_| {
                Ok(ItemStatus {
                    status: "Registered".into(),
                    ..ItemStatus::default()
                })
            });

        let status = store.get_item_status(7).await.unwrap();
        assert_eq!(status.status, "Registered");
    }
}
