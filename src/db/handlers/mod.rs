//! Postgres implementations of the store contracts.
//!
//! Each handler wraps a [`sqlx::PgPool`] and implements the trait its
//! service consumes; the services themselves never see SQL. All conditional
//! updates are single guarded statements so the compare-and-set semantics
//! hold under concurrent connections.

pub mod identities;
pub mod payment_logs;
pub mod security_events;
pub mod verification_tokens;

pub use identities::PgIdentityStore;
pub use payment_logs::PgPaymentLogStore;
pub use security_events::PgSecurityEventStore;
pub use verification_tokens::PgTokenStore;
