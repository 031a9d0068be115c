//! Prompt Injection Protection
//!
//! Detects prompt injection, secret extraction and script/SQL injection in
//! user messages before they reach the AI co-founder.
//!
//! All signatures live in one ordered table, each tagged with the risk level
//! it produces. The table is compiled once into a case-insensitive `RegexSet`
//! so a clean message costs a single pass.

use regex::{RegexSet, RegexSetBuilder};
use unicode_normalization::UnicodeNormalization;

use crate::security::{GuardError, RiskLevel};

/// Family a signature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InjectionCategory {
    InstructionOverride,
    RoleManipulation,
    PromptExtraction,
    SecretExtraction,
    CodeInjection,
    SqlInjection,
}

impl InjectionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InstructionOverride => "instruction_override",
            Self::RoleManipulation => "role_manipulation",
            Self::PromptExtraction => "prompt_extraction",
            Self::SecretExtraction => "secret_extraction",
            Self::CodeInjection => "code_injection",
            Self::SqlInjection => "sql_injection",
        }
    }

    /// Tag recorded in the audit trail for an incident of this family.
    pub fn incident_tag(&self) -> &'static str {
        match self {
            Self::CodeInjection => "code_injection",
            _ => "prompt_injection",
        }
    }
}

/// One row of the detection table.
#[derive(Debug, Clone, Copy)]
pub struct InjectionSignature {
    pub name: &'static str,
    pub category: InjectionCategory,
    pub pattern: &'static str,
    pub risk: RiskLevel,
}

const fn sig(
    name: &'static str,
    category: InjectionCategory,
    pattern: &'static str,
    risk: RiskLevel,
) -> InjectionSignature {
    InjectionSignature {
        name,
        category,
        pattern,
        risk,
    }
}

use self::InjectionCategory::*;
use crate::security::RiskLevel::{Critical, High};

/// Built-in detection table, in evaluation order.
pub const SIGNATURES: &[InjectionSignature] = &[
    // Direct instruction override
    sig("ignore_previous", InstructionOverride, r"ignore\s+(all\s+)?(previous|above|prior)\s+(instructions?|commands?|rules?)", High),
    sig("forget_everything", InstructionOverride, r"forget\s+(everything|all|what|previous)", High),
    sig("disregard_previous", InstructionOverride, r"disregard\s+(all\s+)?(previous|above|prior)", High),
    sig("new_instructions", InstructionOverride, r"new\s+(instructions?|commands?|rules?):", High),
    // Role manipulation
    sig("you_are_now", RoleManipulation, r"(you\s+are|you're)\s+now\s+", High),
    sig("act_as", RoleManipulation, r"act\s+as\s+(if|a|an)\s+", High),
    sig("pretend", RoleManipulation, r"pretend\s+(you\s+are|to\s+be)", High),
    sig("behave_like", RoleManipulation, r"behave\s+like", High),
    // System prompt extraction
    sig("ask_instructions", PromptExtraction, r"what\s+(is|are)\s+(your|the)\s+(system\s+)?(instructions?|rules?|prompt)", High),
    sig("show_system_prompt", PromptExtraction, r"show\s+(me\s+)?(your|the)\s+(system|original)\s+prompt", High),
    sig("repeat_instructions", PromptExtraction, r"repeat\s+(your|the)\s+(instructions?|prompt)", High),
    sig("system_prompt_label", PromptExtraction, r"system\s+prompt:", High),
    // Secret extraction
    sig("reveal_secret", SecretExtraction, r"reveal\s+(your|the|all)\s+((api|secret|private)\s+)?(secret|password|key|token)", High),
    sig("show_key", SecretExtraction, r"show\s+(me\s+)?(all\s+)?(api|secret|private)\s+key", High),
    sig("ask_key", SecretExtraction, r"what\s+(is|are)\s+(your|the)\s+(api|secret)\s+key", High),
    sig("dump_data", SecretExtraction, r"dump\s+(database|data|table)", High),
    // Markup and script injection
    sig("script_tag", CodeInjection, r"<script[^>]*>", Critical),
    sig("javascript_uri", CodeInjection, r"javascript:", Critical),
    sig("onerror_handler", CodeInjection, r"onerror\s*=", Critical),
    sig("onclick_handler", CodeInjection, r"onclick\s*=", Critical),
    sig("eval_call", CodeInjection, r"eval\s*\(", Critical),
    sig("execute_call", CodeInjection, r"\.execute\(", Critical),
    // SQL injection
    sig("tautology", SqlInjection, r"'\s*(OR|AND)\s*'?1'?\s*=\s*'?1", High),
    sig("union_select", SqlInjection, r"UNION\s+SELECT", High),
    sig("drop_table", SqlInjection, r"DROP\s+TABLE", High),
    sig("delete_from", SqlInjection, r"DELETE\s+FROM", High),
    sig("trailing_comment", SqlInjection, r"--\s*$", High),
];

/// The signature that decided a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionMatch {
    pub name: &'static str,
    pub category: InjectionCategory,
    pub risk: RiskLevel,
}

/// Compiled injection detector.
pub struct PromptInjectionFilter {
    signatures: Vec<InjectionSignature>,
    set: RegexSet,
}

impl PromptInjectionFilter {
    /// Compile the built-in table.
    pub fn new() -> Result<Self, GuardError> {
        Self::with_signatures(SIGNATURES.to_vec())
    }

    /// Compile an arbitrary ordered table.
    pub fn with_signatures(signatures: Vec<InjectionSignature>) -> Result<Self, GuardError> {
        let set = RegexSetBuilder::new(signatures.iter().map(|s| s.pattern))
            .case_insensitive(true)
            .build()
            .map_err(|source| GuardError::InvalidPattern {
                name: "injection_signatures".to_string(),
                source,
            })?;

        Ok(Self { signatures, set })
    }

    pub fn signatures(&self) -> &[InjectionSignature] {
        &self.signatures
    }

    /// Scan raw text and return the most severe matching signature.
    ///
    /// Ties go to the earliest row in the table. The NFKC form of the text is
    /// scanned too, so full-width and decomposed look-alikes still match.
    pub fn scan(&self, text: &str) -> Option<InjectionMatch> {
        let mut hits: Vec<usize> = self.set.matches(text).into_iter().collect();

        let normalized: String = text.nfkc().collect();
        if normalized != text {
            hits.extend(self.set.matches(&normalized).into_iter());
        }

        hits.sort_unstable();
        hits.dedup();

        let mut best: Option<&InjectionSignature> = None;
        for idx in hits {
            let candidate = &self.signatures[idx];
            if best.map_or(true, |b| candidate.risk > b.risk) {
                best = Some(candidate);
            }
        }

        best.map(|s| InjectionMatch {
            name: s.name,
            category: s.category,
            risk: s.risk,
        })
    }

    /// True when no signature matches.
    pub fn is_clean(&self, text: &str) -> bool {
        self.scan(text).is_none()
    }
}
