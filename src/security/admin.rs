//! Admin read surface over the audit log.
//!
//! SECURITY: The shared secret is held only as a SHA-256 digest and compared
//! in constant time. A gate built without a secret rejects every request.
//! Reads are authorized by a presented secret only, never by a query
//! parameter that could be logged by a proxy.

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::security::audit::{AuditEntry, SecurityStats};
use crate::security::guard::{SecurityGuard, DEFAULT_AUDIT_LIMIT};
use crate::telemetry::{self, SecurityEvent};

/// What the admin asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminAction {
    #[default]
    Stats,
    Logs,
}

impl AdminAction {
    pub fn parse(name: &str) -> Result<Self, AdminError> {
        match name.trim() {
            "" | "stats" => Ok(Self::Stats),
            "logs" => Ok(Self::Logs),
            other => Err(AdminError::InvalidAction(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stats => "stats",
            Self::Logs => "logs",
        }
    }
}

/// A parsed admin request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminQuery {
    pub action: AdminAction,
    /// Entries to return for `logs`; ignored for `stats`.
    pub limit: usize,
}

impl Default for AdminQuery {
    fn default() -> Self {
        Self {
            action: AdminAction::Stats,
            limit: DEFAULT_AUDIT_LIMIT,
        }
    }
}

impl AdminQuery {
    /// Parse raw `action` / `limit` query values.
    pub fn parse(action: Option<&str>, limit: Option<&str>) -> Result<Self, AdminError> {
        let action = match action {
            Some(a) => AdminAction::parse(a)?,
            None => AdminAction::Stats,
        };
        let limit = match limit.map(str::trim) {
            None | Some("") => DEFAULT_AUDIT_LIMIT,
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(AdminError::InvalidLimit(raw.to_string())),
            },
        };
        Ok(Self { action, limit })
    }
}

/// Payload of a successful admin read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AdminData {
    Stats(SecurityStats),
    Logs(Vec<AuditEntry>),
}

/// `{ "success": true, "data": ..., "count"?: n }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminResponse {
    pub success: bool,
    pub data: AdminData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl AdminResponse {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdminError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Invalid action: {0}")]
    InvalidAction(String),
    #[error("Invalid limit: {0}")]
    InvalidLimit(String),
}

impl AdminError {
    /// HTTP status a web surface should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::InvalidAction(_) | Self::InvalidLimit(_) => 400,
        }
    }

    /// `{ "error": "..." }` body.
    pub fn to_json(&self) -> String {
        serde_json::json!({ "error": self.to_string() }).to_string()
    }
}

/// Shared-secret gate for admin reads.
pub struct AdminGate {
    secret_hash: Option<Vec<u8>>,
}

impl AdminGate {
    /// An empty or missing secret leaves the gate closed.
    pub fn new(secret: Option<&str>) -> Self {
        let secret_hash = secret
            .filter(|s| !s.is_empty())
            .map(|s| Sha256::digest(s.as_bytes()).to_vec());
        Self { secret_hash }
    }

    pub fn is_configured(&self) -> bool {
        self.secret_hash.is_some()
    }

    /// Check a presented secret.
    pub fn authorize(&self, presented: Option<&str>) -> bool {
        match (&self.secret_hash, presented) {
            (Some(expected), Some(presented)) => {
                let presented = Sha256::digest(presented.as_bytes());
                constant_time_compare(expected, presented.as_slice())
            }
            _ => false,
        }
    }

    /// Check an `Authorization: Bearer <secret>` header value.
    pub fn authorize_bearer(&self, header: Option<&str>) -> bool {
        self.authorize(header.and_then(|h| h.strip_prefix("Bearer ")))
    }

    /// Authorize, then serve the query from the guard's audit state.
    pub fn handle(
        &self,
        guard: &SecurityGuard,
        presented: Option<&str>,
        query: &AdminQuery,
    ) -> Result<AdminResponse, AdminError> {
        if !self.authorize(presented) {
            telemetry::log_security_event(
                SecurityEvent::AdminUnauthorized,
                "admin read rejected",
                &[("configured", if self.is_configured() { "true" } else { "false" })],
            );
            return Err(AdminError::Unauthorized);
        }

        telemetry::log_security_event(
            SecurityEvent::AdminAccess,
            "admin read",
            &[("action", query.action.as_str())],
        );

        Ok(match query.action {
            AdminAction::Stats => AdminResponse {
                success: true,
                data: AdminData::Stats(guard.security_stats()),
                count: None,
            },
            AdminAction::Logs => {
                let logs = guard.audit_logs(query.limit);
                AdminResponse {
                    success: true,
                    count: Some(logs.len()),
                    data: AdminData::Logs(logs),
                }
            }
        })
    }
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
