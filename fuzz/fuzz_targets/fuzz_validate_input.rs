//! Fuzz target for inbound message validation.
//!
//! Arbitrary text and role strings must never panic the guard, and every
//! decision must be internally consistent.

#![no_main]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use setmybizz_guard::security::{InputSanitizer, RiskLevel, SecurityGuard, UserRole};

#[derive(Debug, Arbitrary)]
struct Message {
    text: String,
    role: String,
}

static GUARD: OnceLock<SecurityGuard> = OnceLock::new();
static SANITIZER: OnceLock<InputSanitizer> = OnceLock::new();
static NEXT_USER: AtomicU64 = AtomicU64::new(0);

fuzz_target!(|msg: Message| {
    let guard = GUARD.get_or_init(|| SecurityGuard::in_memory().unwrap());
    let sanitizer = SANITIZER.get_or_init(|| InputSanitizer::new().unwrap());

    // A fresh user per run keeps the rate limiter out of the way.
    let user = format!("fuzz-{}", NEXT_USER.fetch_add(1, Ordering::Relaxed));
    let check = guard.validate_input(&msg.text, &user, UserRole::parse(&msg.role));

    if check.allowed {
        assert_eq!(check.risk_level, RiskLevel::Low);
        assert!(check.reason.is_none());
        let sanitized = check.sanitized_input.expect("allowed without sanitized input");
        assert_eq!(sanitizer.sanitize(&sanitized), sanitized, "sanitize not idempotent");
    } else {
        assert!(check.reason.is_some(), "denied without a reason");
        assert!(check.sanitized_input.is_none());
    }
});
