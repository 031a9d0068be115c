//! Guard counters, published through the `metrics` facade.
//!
//! With no recorder installed every call is a no-op, so the library never
//! requires an exporter.

use metrics::{counter, describe_counter};

use crate::security::RiskLevel;

const DECISIONS: &str = "guard_decisions_total";
const REDACTIONS: &str = "guard_redactions_total";
const AUDIT_EVICTIONS: &str = "guard_audit_evictions_total";

/// Register counter descriptions with the installed recorder.
pub fn init_metrics() {
    describe_counter!(DECISIONS, "Input validation decisions by outcome and risk level");
    describe_counter!(REDACTIONS, "Substrings replaced in AI output");
    describe_counter!(AUDIT_EVICTIONS, "Audit entries dropped at capacity");
}

pub fn record_decision(allowed: bool, risk: RiskLevel) {
    let outcome = if allowed { "allowed" } else { "blocked" };
    counter!(DECISIONS, "outcome" => outcome, "risk" => risk.as_str()).increment(1);
}

pub fn record_redactions(count: usize) {
    counter!(REDACTIONS).increment(count as u64);
}

pub fn record_audit_evictions(count: usize) {
    counter!(AUDIT_EVICTIONS).increment(count as u64);
}
