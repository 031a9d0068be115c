//! Output Redaction
//!
//! Scrubs AI co-founder responses before they are shown to a viewer.
//! Redaction is best-effort and never blocks a response: every rule in the
//! ordered table is applied in turn and the text is passed through.
//!
//! Rules scoped to `NonOwner` implement the disclosure policy: business
//! strategy text is never shown to anyone but the owner, regardless of
//! whether the model chose to reveal it.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::security::{GuardError, UserRole};

/// Who a redaction rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    /// Applied for every viewer.
    Everyone,
    /// Applied for every viewer except the owner.
    NonOwner,
}

impl RuleScope {
    fn applies_to(&self, role: UserRole) -> bool {
        match self {
            Self::Everyone => true,
            Self::NonOwner => !role.sees_sensitive_output(),
        }
    }
}

/// A compiled `(pattern, replacement)` rule.
#[derive(Debug, Clone)]
pub struct RedactionRule {
    pub name: String,
    pub pattern: Regex,
    pub replacement: String,
    pub scope: RuleScope,
}

impl RedactionRule {
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        replacement: impl Into<String>,
        scope: RuleScope,
    ) -> Result<Self, GuardError> {
        let name = name.into();
        let pattern = Regex::new(pattern).map_err(|source| GuardError::InvalidPattern {
            name: name.clone(),
            source,
        })?;
        Ok(Self {
            name,
            pattern,
            replacement: replacement.into(),
            scope,
        })
    }
}

/// Operator-supplied rule, as read from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraRedaction {
    pub pattern: String,
    #[serde(default = "default_replacement")]
    pub replacement: String,
}

fn default_replacement() -> String {
    "[REDACTED]".to_string()
}

/// Built-in table: `(name, pattern, replacement, scope)`, in application order.
///
/// Digits and word boundaries are ASCII-only.
const BUILTIN_RULES: &[(&str, &str, &str, RuleScope)] = &[
    // Credentials
    ("google_api_key", r"AIza[0-9A-Za-z_-]{35}", "[API_KEY_REDACTED]", RuleScope::Everyone),
    ("openai_secret_key", r"sk-[a-zA-Z0-9]{48}", "[API_KEY_REDACTED]", RuleScope::Everyone),
    ("hex_token", r"[a-f0-9]{32}", "[TOKEN_REDACTED]", RuleScope::Everyone),
    ("password_value", r#"(?i)(password)\s*[:=]\s*["']?[^"'\s]+["']?"#, "${1}: [REDACTED]", RuleScope::Everyone),
    ("token_value", r#"(?i)(token)\s*[:=]\s*["']?[^"'\s]+["']?"#, "${1}: [REDACTED]", RuleScope::Everyone),
    ("secret_value", r#"(?i)(secret)\s*[:=]\s*["']?[^"'\s]+["']?"#, "${1}: [REDACTED]", RuleScope::Everyone),
    // Indian government identifiers
    ("aadhaar", r"(?-u:\b)[0-9]{12}(?-u:\b)", "[AADHAAR_REDACTED]", RuleScope::Everyone),
    ("pan", r"(?-u:\b)[A-Z]{5}[0-9]{4}[A-Z](?-u:\b)", "[PAN_REDACTED]", RuleScope::Everyone),
    ("gstin", r"(?-u:\b)[0-9]{2}[A-Z]{5}[0-9]{4}[A-Z][A-Z0-9]Z[A-Z0-9](?-u:\b)", "[GSTIN_REDACTED]", RuleScope::Everyone),
    // Pricing internals
    ("cost_price", r"(?i)cost\s+price\s*[:=]?\s*₹?[0-9,]+", "cost price: [REDACTED]", RuleScope::Everyone),
    ("margin", r"(?i)margin\s*[:=]?\s*[0-9.]+%", "margin: [REDACTED]%", RuleScope::Everyone),
    ("wholesale_price", r"(?i)wholesale\s+price\s*[:=]?\s*₹?[0-9,]+", "wholesale price: [REDACTED]", RuleScope::Everyone),
    ("supplier_cost", r"(?i)supplier\s+cost\s*[:=]?\s*₹?[0-9,]+", "supplier cost: [REDACTED]", RuleScope::Everyone),
    // Contact details
    ("email", r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}", "[EMAIL_REDACTED]", RuleScope::Everyone),
    ("indian_phone", r"(\+91|0)?[6-9][0-9]{9}", "[PHONE_REDACTED]", RuleScope::Everyone),
    // Leaked system prompt preamble
    ("system_preamble", r"(?i)You are (an|a) AI (assistant|co-founder).{0,500}instructions?:", "", RuleScope::Everyone),
    // Owner-only business strategy
    ("pricing_strategy", r"(?i)pricing\s+strategy.{0,200}", "[PRICING_STRATEGY_REDACTED]", RuleScope::NonOwner),
    ("competitive_advantage", r"(?i)competitive\s+advantage.{0,200}", "[COMPETITIVE_INFO_REDACTED]", RuleScope::NonOwner),
];

/// Result of a redaction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionOutcome {
    pub output: String,
    /// Total substrings replaced.
    pub redactions: usize,
    /// Names of the rules that fired, in table order.
    pub rules_hit: Vec<String>,
}

impl RedactionOutcome {
    pub fn modified(&self) -> bool {
        self.redactions > 0
    }
}

/// Ordered redaction table.
#[derive(Debug, Clone)]
pub struct OutputRedactor {
    rules: Vec<RedactionRule>,
}

impl OutputRedactor {
    /// Built-in table only.
    pub fn new() -> Result<Self, GuardError> {
        Self::with_extra(&[])
    }

    /// Built-in table followed by operator rules (applied to every viewer).
    pub fn with_extra(extra: &[ExtraRedaction]) -> Result<Self, GuardError> {
        let mut rules = BUILTIN_RULES
            .iter()
            .map(|(name, pattern, replacement, scope)| {
                RedactionRule::new(*name, pattern, *replacement, *scope)
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (i, rule) in extra.iter().enumerate() {
            rules.push(RedactionRule::new(
                format!("extra_{}", i),
                &rule.pattern,
                rule.replacement.clone(),
                RuleScope::Everyone,
            )?);
        }

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[RedactionRule] {
        &self.rules
    }

    /// Apply every rule that applies to `role`, in order.
    pub fn redact(&self, text: &str, role: UserRole) -> RedactionOutcome {
        let mut output = text.to_string();
        let mut redactions = 0;
        let mut rules_hit = Vec::new();

        for rule in self.rules.iter().filter(|r| r.scope.applies_to(role)) {
            let hits = rule.pattern.find_iter(&output).count();
            if hits == 0 {
                continue;
            }
            output = rule
                .pattern
                .replace_all(&output, rule.replacement.as_str())
                .into_owned();
            redactions += hits;
            rules_hit.push(rule.name.clone());
        }

        RedactionOutcome {
            output,
            redactions,
            rules_hit,
        }
    }
}
