//! Security module for the SetMyBizz guard
//!
//! This module sits between untrusted chat text and the AI co-founder:
//! - Per-user, per-role rate limiting
//! - Prompt and code injection detection
//! - Input sanitization
//! - Output redaction with a role-based disclosure policy
//! - Bounded in-memory audit trail and admin read surface

pub mod admin;
pub mod audit;
pub mod clock;
pub mod guard;
pub mod prompt_injection;
pub mod rate_limit;
pub mod redaction;
pub mod sanitize;

pub use admin::{AdminAction, AdminData, AdminError, AdminGate, AdminQuery, AdminResponse};
pub use audit::{AlertSink, AuditEntry, AuditLog, AuditText, SecurityStats, TracingAlertSink};
pub use clock::{Clock, ManualClock, SystemClock};
pub use guard::{GuardConfig, GuardState, SecurityGuard, DEFAULT_AUDIT_LIMIT};
pub use prompt_injection::{InjectionCategory, InjectionMatch, InjectionSignature, PromptInjectionFilter};
pub use rate_limit::{InMemoryRateLimitStore, RateLimitDecision, RateLimitStore};
pub use redaction::{ExtraRedaction, OutputRedactor, RedactionOutcome, RedactionRule, RuleScope};
pub use sanitize::{sanitize_input, InputSanitizer};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity attached to a single guard decision.
///
/// Independent of whether the request was allowed: a rate-limited request is
/// `Medium` and refused, a clean request is `Low` and allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller role, used for rate budgets and output disclosure.
///
/// Parsing never fails: anything unrecognised is treated as `User`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum UserRole {
    Owner,
    Manager,
    Employee,
    #[default]
    User,
}

impl UserRole {
    /// Parse a role name. Case-insensitive; unknown names map to `User`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "owner" => Self::Owner,
            "manager" => Self::Manager,
            "employee" => Self::Employee,
            _ => Self::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Manager => "manager",
            Self::Employee => "employee",
            Self::User => "user",
        }
    }

    /// Default requests per rate-limit window for this role.
    pub fn rate_limit_per_window(&self) -> u32 {
        RoleLimits::default().for_role(*self)
    }

    /// Whether business-sensitive AI output may be shown unredacted.
    pub fn sees_sensitive_output(&self) -> bool {
        matches!(self, Self::Owner)
    }
}

impl From<&str> for UserRole {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl From<String> for UserRole {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requests allowed per window, per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleLimits {
    pub owner: u32,
    pub manager: u32,
    pub employee: u32,
    pub user: u32,
}

impl RoleLimits {
    pub fn for_role(&self, role: UserRole) -> u32 {
        match role {
            UserRole::Owner => self.owner,
            UserRole::Manager => self.manager,
            UserRole::Employee => self.employee,
            UserRole::User => self.user,
        }
    }
}

impl Default for RoleLimits {
    fn default() -> Self {
        Self {
            owner: 60,
            manager: 30,
            employee: 20,
            user: 10,
        }
    }
}

/// Outcome of `SecurityGuard::validate_input`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityCheckResult {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanitized_input: Option<String>,
    pub risk_level: RiskLevel,
}

impl SecurityCheckResult {
    pub fn allow(sanitized: String) -> Self {
        Self {
            allowed: true,
            reason: None,
            sanitized_input: Some(sanitized),
            risk_level: RiskLevel::Low,
        }
    }

    pub fn deny(reason: impl Into<String>, risk_level: RiskLevel) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            sanitized_input: None,
            risk_level,
        }
    }
}

/// Errors raised while building a guard. Checks themselves never fail.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("invalid pattern for rule '{name}': {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::High > RiskLevel::Medium);
        assert!(RiskLevel::Medium > RiskLevel::Low);
    }

    #[test]
    fn test_risk_level_serializes_lowercase() {
        let json = serde_json::to_string(&RiskLevel::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }

    #[test]
    fn test_unknown_role_maps_to_user() {
        assert_eq!(UserRole::parse("superadmin"), UserRole::User);
        assert_eq!(UserRole::parse(""), UserRole::User);
        assert_eq!(UserRole::parse("OWNER"), UserRole::Owner);
        assert_eq!(UserRole::from(" manager "), UserRole::Manager);
    }

    #[test]
    fn test_role_deserialization_is_infallible() {
        let role: UserRole = serde_json::from_str("\"Manager\"").unwrap();
        assert_eq!(role, UserRole::Manager);
        let role: UserRole = serde_json::from_str("\"superadmin\"").unwrap();
        assert_eq!(role, UserRole::User);
        assert_eq!(serde_json::to_string(&UserRole::Owner).unwrap(), "\"owner\"");
    }

    #[test]
    fn test_default_role_limits() {
        let limits = RoleLimits::default();
        assert_eq!(limits.for_role(UserRole::Owner), 60);
        assert_eq!(limits.for_role(UserRole::Manager), 30);
        assert_eq!(limits.for_role(UserRole::Employee), 20);
        assert_eq!(limits.for_role(UserRole::User), 10);
        assert_eq!(limits.for_role(UserRole::parse("intern")), 10);
        assert_eq!(UserRole::Manager.rate_limit_per_window(), 30);
    }

    #[test]
    fn test_check_result_json_shape() {
        let result = SecurityCheckResult::allow("hello".to_string());
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"sanitizedInput\":\"hello\""));
        assert!(json.contains("\"riskLevel\":\"low\""));
        assert!(!json.contains("reason"));
    }
}
