//! Fuzz target for output redaction.
//!
//! Arbitrary model output must never panic the redactor, and filtering an
//! already filtered text must not grow it without bound.

#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use setmybizz_guard::security::{SecurityGuard, UserRole};

static GUARD: OnceLock<SecurityGuard> = OnceLock::new();

fuzz_target!(|data: &str| {
    let guard = GUARD.get_or_init(|| SecurityGuard::in_memory().unwrap());

    for role in [UserRole::Owner, UserRole::User] {
        let outcome = guard.redact_output(data, role);
        if outcome.redactions == 0 {
            assert_eq!(outcome.output, data, "text changed without a redaction");
            assert!(outcome.rules_hit.is_empty());
        }

        // Markers are bounded, so output grows at most by a fixed factor.
        assert!(
            outcome.output.len() <= data.len() * 30 + 64,
            "redacted output unexpectedly large"
        );
    }
});
