//! In-process backends.
//!
//! Used when no credentials are configured and throughout the tests. They
//! log what would have been sent and answer with generated ids. Each one can
//! be told to fail so error paths can be driven deterministically.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::info;

use super::ports::{
    ChatService, ColumnValues, EmailService, ItemStatus, NewVisitorRecord, NotificationEntry,
    RecordRef, RecordStore, UploadedFile,
};
use super::templates::{host_notification_email, welcome_attachments};
use crate::errors::ServiceError;
use crate::registration::{
    DeliveryStatus, HostNotification, NotificationKind, SendOutcome, VisitorRegistration,
    WelcomePackageOptions,
};
use crate::upload::VisitorFile;
use crate::utils::{generate_message_id, now_utc, Timestamp};

/// Scripted failures for an in-memory backend.
#[derive(Debug, Default)]
struct FailurePlan {
    inner: Mutex<Option<(ServiceError, Option<u32>)>>,
}

impl FailurePlan {
    fn set(&self, error: ServiceError, times: Option<u32>) {
        *self.inner.lock() = Some((error, times));
    }

    fn clear(&self) {
        *self.inner.lock() = None;
    }

    /// Returns the error to fail the current call with, if any.
    fn check(&self) -> Result<(), ServiceError> {
        let mut guard = self.inner.lock();
        match guard.take() {
            None | Some((_, Some(0))) => Ok(()),
            Some((error, None)) => {
                *guard = Some((error.clone(), None));
                Err(error)
            }
            Some((error, Some(remaining))) => {
                if remaining > 1 {
                    *guard = Some((error.clone(), Some(remaining - 1)));
                }
                Err(error)
            }
        }
    }
}

/// A stored visitor record.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Fields it was created with.
    pub record: NewVisitorRecord,
    /// Columns written since.
    pub columns: ColumnValues,
    /// Uploaded files.
    pub files: Vec<UploadedFile>,
    /// Tracked notifications.
    pub notifications: Vec<NotificationEntry>,
    /// Last write.
    pub last_updated: Timestamp,
}

/// Record store kept in a concurrent map.
#[derive(Debug)]
pub struct InMemoryRecordStore {
    records: DashMap<u64, StoredRecord>,
    next_id: AtomicU64,
    failures: FailurePlan,
    calls: AtomicUsize,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRecordStore {
    /// First id handed out.
    pub const FIRST_ID: u64 = 1001;

    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            next_id: AtomicU64::new(Self::FIRST_ID),
            failures: FailurePlan::default(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails every call with `error`.
    pub fn fail_always(&self, error: ServiceError) {
        self.failures.set(error, None);
    }

    /// Fails the next `times` calls with `error`.
    pub fn fail_next(&self, times: u32, error: ServiceError) {
        self.failures.set(error, Some(times));
    }

    /// Stops failing.
    pub fn recover(&self) {
        self.failures.clear();
    }

    /// Snapshot of a record.
    #[must_use]
    pub fn record(&self, id: u64) -> Option<StoredRecord> {
        self.records.get(&id).map(|r| r.clone())
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no record exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Calls received, failed ones included.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.failures.check()
    }

    fn not_found(id: u64) -> ServiceError {
        ServiceError::other(format!("Item not found: {id}"))
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create_visitor_record(
        &self,
        record: NewVisitorRecord,
    ) -> Result<RecordRef, ServiceError> {
        self.enter()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let name = record.item_name();

        info!(item_id = id, name = %name, "Created visitor record");
        self.records.insert(
            id,
            StoredRecord {
                record,
                columns: ColumnValues::new(),
                files: Vec::new(),
                notifications: Vec::new(),
                last_updated: now_utc(),
            },
        );

        Ok(RecordRef { id, name })
    }

    async fn update_item(&self, item_id: u64, columns: ColumnValues) -> Result<(), ServiceError> {
        self.enter()?;
        let mut entry = self.records.get_mut(&item_id).ok_or_else(|| Self::not_found(item_id))?;
        entry.columns.extend(columns);
        entry.last_updated = now_utc();
        Ok(())
    }

    async fn upload_file(
        &self,
        item_id: u64,
        column_id: &str,
        file: &VisitorFile,
    ) -> Result<UploadedFile, ServiceError> {
        self.enter()?;
        let mut entry = self.records.get_mut(&item_id).ok_or_else(|| Self::not_found(item_id))?;

        let uploaded = UploadedFile {
            item_id,
            column_id: column_id.to_string(),
            filename: file.filename.clone(),
            size: file.size(),
            url: Some(format!(
                "https://mock-cdn.sqla.com/files/{item_id}/{}",
                file.filename
            )),
        };
        info!(item_id, column = column_id, filename = %file.filename, "Uploaded file");

        entry.files.push(uploaded.clone());
        entry.last_updated = now_utc();
        Ok(uploaded)
    }

    async fn track_notification_status(
        &self,
        item_id: u64,
        kind: NotificationKind,
        status: DeliveryStatus,
        message_id: Option<String>,
    ) -> Result<(), ServiceError> {
        self.enter()?;
        let mut entry = self.records.get_mut(&item_id).ok_or_else(|| Self::not_found(item_id))?;
        let timestamp = now_utc();
        entry.notifications.push(NotificationEntry {
            kind,
            status,
            message_id,
            timestamp,
        });
        entry.last_updated = timestamp;
        Ok(())
    }

    async fn get_item_status(&self, item_id: u64) -> Result<ItemStatus, ServiceError> {
        self.enter()?;
        let entry = self.records.get(&item_id).ok_or_else(|| Self::not_found(item_id))?;

        let status = entry
            .columns
            .get("status")
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| entry.record.status.clone(), str::to_string);

        Ok(ItemStatus {
            status,
            notifications: entry.notifications.clone(),
            last_updated: Some(entry.last_updated),
        })
    }
}

/// A message an in-memory backend accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Recipient address, or the channel for chat.
    pub to: String,
    /// Subject or card title.
    pub subject: String,
    /// Attachment filenames.
    pub attachments: Vec<String>,
    /// Generated message id.
    pub message_id: String,
}

/// Email backend that records instead of sending.
#[derive(Debug, Default)]
pub struct InMemoryEmailService {
    sent: RwLock<Vec<SentMessage>>,
    failures: FailurePlan,
    calls: AtomicUsize,
}

impl InMemoryEmailService {
    /// Creates the service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every send with `error`.
    pub fn fail_always(&self, error: ServiceError) {
        self.failures.set(error, None);
    }

    /// Fails the next `times` sends with `error`.
    pub fn fail_next(&self, times: u32, error: ServiceError) {
        self.failures.set(error, Some(times));
    }

    /// Stops failing.
    pub fn recover(&self) {
        self.failures.clear();
    }

    /// Messages accepted so far.
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.read().clone()
    }

    /// Send attempts, failed ones included.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn deliver(
        &self,
        to: &str,
        subject: String,
        attachments: Vec<String>,
    ) -> Result<SendOutcome, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.failures.check()?;

        let message_id = generate_message_id("mock-email");
        info!(to, subject = %subject, attachments = ?attachments, "Mock email sent");
        self.sent.write().push(SentMessage {
            to: to.to_string(),
            subject,
            attachments,
            message_id: message_id.clone(),
        });
        Ok(SendOutcome::sent(message_id))
    }
}

#[async_trait]
impl EmailService for InMemoryEmailService {
    async fn send_host_notification(
        &self,
        notification: &HostNotification,
    ) -> Result<SendOutcome, ServiceError> {
        let template = host_notification_email(notification);
        self.deliver(&notification.host_email, template.subject, Vec::new())
    }

    async fn send_welcome_package(
        &self,
        registration: &VisitorRegistration,
        options: &WelcomePackageOptions,
    ) -> Result<SendOutcome, ServiceError> {
        let attachments = welcome_attachments(registration, options)
            .into_iter()
            .map(|a| a.filename)
            .collect();
        self.deliver(
            &registration.email,
            "Welcome to SQLA Studio - Visit Information".to_string(),
            attachments,
        )
    }
}

/// Chat backend that records instead of posting.
#[derive(Debug, Default)]
pub struct InMemoryChatService {
    sent: RwLock<Vec<SentMessage>>,
    failures: FailurePlan,
    calls: AtomicUsize,
}

impl InMemoryChatService {
    /// Creates the service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every post with `error`.
    pub fn fail_always(&self, error: ServiceError) {
        self.failures.set(error, None);
    }

    /// Fails the next `times` posts with `error`.
    pub fn fail_next(&self, times: u32, error: ServiceError) {
        self.failures.set(error, Some(times));
    }

    /// Stops failing.
    pub fn recover(&self) {
        self.failures.clear();
    }

    /// Messages accepted so far.
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.read().clone()
    }

    /// Post attempts, failed ones included.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatService for InMemoryChatService {
    async fn notify_team_of_visitor(
        &self,
        registration: &VisitorRegistration,
        record_url: Option<String>,
    ) -> Result<SendOutcome, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.failures.check()?;

        let message_id = generate_message_id("mock-chat");
        let subject = format!("Visitor: {}", registration.full_name());
        info!(subject = %subject, record_url = ?record_url, "Mock chat message posted");
        self.sent.write().push(SentMessage {
            to: "team".to_string(),
            subject,
            attachments: Vec::new(),
            message_id: message_id.clone(),
        });
        Ok(SendOutcome::sent(message_id))
    }
}
