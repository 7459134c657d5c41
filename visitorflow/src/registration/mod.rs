//! Visitor registration data and the notification payloads derived from it.

mod payloads;
mod visitor;

pub use payloads::{
    DeliveryStatus, HostNotification, NotificationKind, SendOutcome, WelcomePackageOptions,
};
pub use visitor::VisitorRegistration;
