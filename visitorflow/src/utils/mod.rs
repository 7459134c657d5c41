//! Utility functions for identifiers and timestamp handling.

pub mod timestamps;
mod uuid_utils;

pub use timestamps::{
    elapsed_ms, file_safe_timestamp, format_iso8601, iso_timestamp, now_utc, time_based_id,
    Timestamp,
};
pub use uuid_utils::{generate_message_id, generate_uuid};
