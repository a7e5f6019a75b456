//! Database entity models and request/response types.

pub mod identities;
pub mod payment_logs;
pub mod security_events;
pub mod verification_tokens;
