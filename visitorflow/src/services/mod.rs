//! External collaborators: record store, email and chat.
//!
//! - [`ports`] defines the capability traits and their data types
//! - [`memory`] holds the in-process backends
//! - `http` holds the email API and chat webhook clients
//! - [`templates`] renders message content
//! - [`factory`] chooses backends at startup

pub mod factory;
#[cfg(feature = "http")]
pub mod http;
pub mod memory;
pub mod ports;
pub mod templates;

pub use factory::Backends;
#[cfg(feature = "http")]
pub use http::{HttpEmailService, WebhookChatService};
#[cfg(test)]
pub use ports::{MockChatService, MockEmailService, MockRecordStore};
pub use memory::{
    InMemoryChatService, InMemoryEmailService, InMemoryRecordStore, SentMessage, StoredRecord,
};
pub use ports::{
    ChatService, ColumnValues, EmailService, ItemStatus, NewVisitorRecord, NotificationEntry,
    RecordRef, RecordStore, UploadedFile, REGISTERED_STATUS,
};
pub use templates::{Attachment, EmailTemplate, StudioInfo};
