//! Message identifier generation.

use uuid::Uuid;

/// Generates a new UUID v4.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Generates a prefixed, time-ordered message id such as `mock-email-0190…`.
#[must_use]
pub fn generate_message_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::now_v7().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uuid_is_v4() {
        assert_eq!(generate_uuid().get_version_num(), 4);
    }

    #[test]
    fn test_message_ids_are_prefixed_and_unique() {
        let a = generate_message_id("mock-chat");
        let b = generate_message_id("mock-chat");
        assert!(a.starts_with("mock-chat-"));
        assert_ne!(a, b);
    }
}
