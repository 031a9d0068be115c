//! Security event logging for the guard.
//!
//! SECURITY: Every guard decision worth investigating goes through here as a
//! single structured line. Message text is never passed as a detail; callers
//! log identifiers, rule names and counts only.

use chrono::Utc;

/// Security event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    /// Request over the role's budget.
    RateLimited,
    /// Input passed every check.
    InputAccepted,
    /// Empty or oversized input.
    InputRejected,
    /// Prompt-manipulation signature matched.
    PromptInjection,
    /// Markup or script signature matched.
    CodeInjection,
    /// AI output had content redacted.
    OutputRedacted,
    /// Critical incident routed to the alert sink.
    CriticalAlert,
    /// Allowed interaction recorded.
    InteractionLogged,
    /// Admin read with a missing or wrong secret.
    AdminUnauthorized,
    /// Admin read served.
    AdminAccess,
}

impl SecurityEvent {
    pub fn severity(&self) -> SecuritySeverity {
        match self {
            Self::RateLimited => SecuritySeverity::Warning,
            Self::InputAccepted => SecuritySeverity::Debug,
            Self::InputRejected => SecuritySeverity::Info,
            Self::PromptInjection => SecuritySeverity::Warning,
            Self::CodeInjection => SecuritySeverity::Error,
            Self::OutputRedacted => SecuritySeverity::Info,
            Self::CriticalAlert => SecuritySeverity::Critical,
            Self::InteractionLogged => SecuritySeverity::Debug,
            Self::AdminUnauthorized => SecuritySeverity::Warning,
            Self::AdminAccess => SecuritySeverity::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::InputAccepted => "input_accepted",
            Self::InputRejected => "input_rejected",
            Self::PromptInjection => "prompt_injection",
            Self::CodeInjection => "code_injection",
            Self::OutputRedacted => "output_redacted",
            Self::CriticalAlert => "critical_alert",
            Self::InteractionLogged => "interaction_logged",
            Self::AdminUnauthorized => "admin_unauthorized",
            Self::AdminAccess => "admin_access",
        }
    }
}

/// Severity levels for security events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecuritySeverity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl SecuritySeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Format the structured line without emitting it.
pub fn format_security_event(event: SecurityEvent, message: &str, details: &[(&str, &str)]) -> String {
    let details_str = details
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ");

    let head = format!(
        "[{}] SECURITY {} {}: {}",
        Utc::now().timestamp(),
        event.severity().as_str(),
        event.as_str(),
        message
    );

    if details_str.is_empty() {
        head
    } else {
        format!("{} | {}", head, details_str)
    }
}

/// Log a security event with structured details.
///
/// # Example
/// ```
/// use setmybizz_guard::telemetry::{log_security_event, SecurityEvent};
///
/// log_security_event(
///     SecurityEvent::RateLimited,
///     "request over role budget",
///     &[("user_id", "u-42"), ("limit", "10")]
/// );
/// ```
pub fn log_security_event(event: SecurityEvent, message: &str, details: &[(&str, &str)]) {
    let line = format_security_event(event, message, details);
    let event_type = event.as_str();

    match event.severity() {
        SecuritySeverity::Debug => tracing::debug!(event = event_type, "{}", line),
        SecuritySeverity::Info => tracing::info!(event = event_type, "{}", line),
        SecuritySeverity::Warning => tracing::warn!(event = event_type, "{}", line),
        SecuritySeverity::Error => tracing::error!(event = event_type, "{}", line),
        SecuritySeverity::Critical => tracing::error!(event = event_type, alert = true, "🚨 {}", line),
    }
}

/// Convenience macro for logging security events.
#[macro_export]
macro_rules! security_log {
    ($event:expr, $message:expr) => {
        $crate::telemetry::security_log::log_security_event($event, $message, &[])
    };
    ($event:expr, $message:expr, $($key:expr => $value:expr),+) => {
        $crate::telemetry::security_log::log_security_event(
            $event,
            $message,
            &[$(($key, $value)),+]
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_severity() {
        assert_eq!(SecurityEvent::CriticalAlert.severity(), SecuritySeverity::Critical);
        assert_eq!(SecurityEvent::RateLimited.severity(), SecuritySeverity::Warning);
        assert_eq!(SecurityEvent::InteractionLogged.severity(), SecuritySeverity::Debug);
        assert_eq!(SecurityEvent::InputAccepted.severity(), SecuritySeverity::Debug);
    }

    #[test]
    fn test_event_as_str() {
        assert_eq!(SecurityEvent::CodeInjection.as_str(), "code_injection");
        assert_eq!(SecurityEvent::AdminUnauthorized.as_str(), "admin_unauthorized");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(SecuritySeverity::Critical > SecuritySeverity::Error);
        assert!(SecuritySeverity::Error > SecuritySeverity::Warning);
        assert!(SecuritySeverity::Warning > SecuritySeverity::Info);
        assert!(SecuritySeverity::Info > SecuritySeverity::Debug);
    }

    #[test]
    fn test_format_with_details() {
        let line = format_security_event(
            SecurityEvent::RateLimited,
            "over budget",
            &[("user_id", "u1"), ("limit", "10")],
        );
        assert!(line.contains("SECURITY WARNING rate_limited: over budget | user_id=u1 limit=10"));
    }

    #[test]
    fn test_format_without_details() {
        let line = format_security_event(SecurityEvent::AdminAccess, "stats read", &[]);
        assert!(line.ends_with("SECURITY INFO admin_access: stats read"));
    }

    #[test]
    fn test_macro_forms() {
        crate::security_log!(SecurityEvent::InputRejected, "empty input");
        crate::security_log!(SecurityEvent::InputRejected, "empty input", "user_id" => "u1");
    }
}
