//! Common type definitions shared across the subsystem.
//!
//! All entity IDs are UUIDs wrapped in type aliases for better type safety:
//!
//! - [`IdentityId`]: Customer account identifier
//! - [`TokenId`]: Verification/reset token identifier
//! - [`OrderId`]: Order identifier (owned by the ordering subsystem, referenced here)
//! - [`EventId`]: Security event identifier
//! - [`PaymentLogId`]: Payment log row identifier

use uuid::Uuid;

// Type aliases for IDs
pub type IdentityId = Uuid;
pub type TokenId = Uuid;
pub type OrderId = Uuid;
pub type EventId = Uuid;
pub type PaymentLogId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }
}
