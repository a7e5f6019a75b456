//! Database models for the append-only security event log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

use crate::types::{EventId, IdentityId};

/// Ordinal classification of a security event's importance.
///
/// Serialized as the uppercase wire form (`"LOW"`, `"MEDIUM"`, `"HIGH"`,
/// `"CRITICAL"`). Unrecognized values are rejected at the boundary, never
/// silently defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "event_severity", rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(format!("unrecognized severity: {other}")),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Database entity model. Rows are immutable once written; nothing in this
/// subsystem updates or deletes them.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SecurityEvent {
    pub id: EventId,
    pub user_id: Option<IdentityId>,
    pub action: String,
    pub ip_address: String,
    pub severity: Severity,
    pub details: serde_json::Value,
    pub blocked: bool,
    pub created_at: DateTime<Utc>,
}

/// Database request for appending a security event
#[derive(Debug, Clone)]
pub struct SecurityEventCreateDBRequest {
    pub user_id: Option<IdentityId>,
    pub action: String,
    pub ip_address: String,
    pub severity: Severity,
    pub details: serde_json::Value,
    pub blocked: bool,
}
