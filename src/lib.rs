//! # trustlayer: trust and integrity services for the storefront backend
//!
//! `trustlayer` owns the security-sensitive plumbing the rest of the
//! e-commerce backend leans on: password credential storage, single-use
//! verification tokens, request rate limiting, the security event log, and
//! payment-ledger reconciliation. It is a library first; the `trustctl`
//! binary exposes the operator batch jobs (salt migration, token purge,
//! payment reconciliation) as subcommands.
//!
//! ## Components
//!
//! - [`auth::password`]: Argon2id credential hashing with explicit
//!   per-identity salts, a distinct legacy (saltless) verification path for
//!   pre-migration rows, and the one-time salt backfill
//!   ([`auth::migration`]).
//! - [`auth::tokens`]: issue and verify single-use email-verification and
//!   password-reset tokens. Only digests are stored; verification is a
//!   constant-time scan over a bounded candidate set.
//! - [`limits`]: fixed-window rate limiting keyed by client address and
//!   route, with a pluggable counter store.
//! - [`audit`]: append-only security event log. Write failures never fail
//!   the operation that produced the event.
//! - [`payments`]: reconciliation of payment-log rows that ended up sharing
//!   one external payment id.
//!
//! ## Architecture
//!
//! Each service defines a store trait at its persistence seam
//! ([`auth::IdentityStore`], [`auth::tokens::TokenStore`],
//! [`audit::SecurityEventStore`], [`payments::PaymentLogStore`],
//! [`limits::RateLimitStore`]); the [`db::handlers`] module provides the
//! Postgres implementations. Services are constructed from `Arc`s of their
//! stores plus the relevant [`config::Config`] section, so request handlers
//! can share them freely across tasks.

pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod limits;
pub mod payments;
pub mod telemetry;
pub mod types;

pub use config::Config;
pub use errors::{Error, Result};
