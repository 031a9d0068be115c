//! SetMyBizz Guard
//!
//! The security layer between untrusted chat text and the SetMyBizz AI
//! co-founder. It decides whether a message may reach the model and scrubs
//! what the model says before a viewer sees it.
//!
//! # Layers
//!
//! - **Inbound**: per-role rate limiting, size checks, prompt and code
//!   injection signatures, sanitization
//! - **Outbound**: credential, identity and contact redaction, plus a
//!   role-based disclosure policy for business strategy
//! - **Audit**: bounded in-memory trail with statistics and a gated admin
//!   read surface
//!
//! # Boundaries
//!
//! - No network access: the model is reached through [`chat::TextGenerator`]
//! - Raw message text is never written to the audit trail or logs
//! - Request-time checks never fail or panic; only construction can

pub mod chat;
pub mod cli;
pub mod config;
pub mod security;
pub mod telemetry;

use std::sync::Arc;

use config::EnvConfig;
use security::{AdminGate, GuardError, GuardState, SecurityGuard, TracingAlertSink};

/// A configured guard with its admin gate.
pub struct GuardRuntime {
    pub guard: Arc<SecurityGuard>,
    pub admin: AdminGate,
}

impl GuardRuntime {
    /// Build a runtime with process-local state on the wall clock.
    pub fn new(config: &EnvConfig) -> Result<Self, GuardError> {
        let state = GuardState::in_memory(config.guard.audit_capacity);
        Self::with_state(config, state)
    }

    /// Build a runtime over injected state.
    pub fn with_state(config: &EnvConfig, state: GuardState) -> Result<Self, GuardError> {
        let guard = SecurityGuard::new(config.guard.clone(), state, Arc::new(TracingAlertSink))?;
        tracing::debug!(
            max_input_chars = config.guard.max_input_chars,
            audit_capacity = config.guard.audit_capacity,
            admin_configured = config.admin_secret.is_some(),
            "guard runtime ready"
        );
        Ok(Self {
            guard: Arc::new(guard),
            admin: AdminGate::new(config.admin_secret.as_deref()),
        })
    }
}
