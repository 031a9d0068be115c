//! Guarded AI co-founder chat.
//!
//! Runs one chat turn end to end: validate the message, compose the prompt
//! from the business profile and recent history, call the generator, scrub
//! the reply for the caller's role and record the interaction.
//!
//! The model itself is behind [`TextGenerator`]; this crate never talks to a
//! model vendor directly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Instrument;

use crate::security::{RiskLevel, SecurityGuard, UserRole};

/// Conversation turns carried into the prompt.
pub const HISTORY_TURNS: usize = 6;

/// Default upper bound on one generator call.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("text generation failed: {0}")]
    Generator(String),
    #[error("text generation timed out after {0:?}")]
    Timeout(Duration),
}

/// Response depth requested by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[default]
    Quick,
    Deep,
}

/// The AI collaborator.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, mode: ChatMode) -> Result<String, ChatError>;
}

/// Onboarding answers about the business.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BusinessProfile {
    pub business_name: Option<String>,
    pub industry: Option<String>,
    pub team_size: Option<String>,
    pub challenges: Vec<String>,
    pub goals: Vec<String>,
    pub channels: Vec<String>,
    pub current_tools: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

/// One inbound chat message with its context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub user_id: String,
    pub user_role: UserRole,
    pub business_profile: BusinessProfile,
    pub conversation_history: Vec<ChatTurn>,
    pub mode: ChatMode,
    pub chat_name: Option<String>,
    /// The user is replying to an earlier AI message.
    pub replying_to: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub response: String,
    pub tokens_used: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ChatOutcome {
    #[serde(rename_all = "camelCase")]
    Blocked { reason: String, risk_level: RiskLevel },
    Answered(ChatReply),
}

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(prompt: &str) -> u32 {
    let chars = prompt.chars().count();
    u32::try_from(chars.div_ceil(4)).unwrap_or(u32::MAX)
}

fn or_default<'a>(value: &'a Option<String>, default: &'a str) -> &'a str {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => default,
    }
}

fn join_or<'a>(values: &[String], default: &'a str) -> String {
    if values.is_empty() {
        default.to_string()
    } else {
        values.join(", ")
    }
}

/// Compose the co-founder prompt around an already sanitized message.
pub fn build_prompt(request: &ChatRequest, sanitized_message: &str) -> String {
    let profile = &request.business_profile;

    let skip = request.conversation_history.len().saturating_sub(HISTORY_TURNS);
    let history = request
        .conversation_history
        .iter()
        .skip(skip)
        .map(|turn| {
            let speaker = match turn.role {
                TurnRole::User => "User",
                TurnRole::Assistant => "AI",
            };
            format!("{}: {}", speaker, turn.content)
        })
        .collect::<Vec<_>>();
    let history = if history.is_empty() {
        "None".to_string()
    } else {
        history.join("\n")
    };

    let mode = match request.mode {
        ChatMode::Deep => {
            "MODE: DEEP ANALYSIS\n\
             - Provide comprehensive, detailed responses\n\
             - Include step-by-step breakdowns\n\
             - Offer multiple perspectives and options\n\
             - Use examples and case studies when relevant\n\
             - Go deeper into strategic implications"
        }
        ChatMode::Quick => {
            "MODE: QUICK CHAT\n\
             - Keep responses concise and actionable (2-4 sentences)\n\
             - Focus on immediate next steps\n\
             - Be direct and to the point"
        }
    };

    let chat_context = request
        .chat_name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .map(|n| format!("\nCURRENT CHAT: {}", n))
        .unwrap_or_default();
    let reply_context = if request.replying_to {
        "\n[User is replying to a previous message - provide contextual follow-up]"
    } else {
        ""
    };

    format!(
        "You are an AI Co-Founder helping a business owner in India.

BUSINESS CONTEXT:
- Business Name: {name}
- Industry: {industry}
- Team Size: {team}
- Main Challenges: {challenges}
- Business Goals: {goals}
- Sales Channels: {channels}
- Current Tools: {tools}
{chat_context}

YOUR ROLE:
You are a helpful, friendly business advisor who gives practical, actionable advice.
- Give specific, India-relevant advice (use ₹, mention GST, Indian platforms, etc.)
{mode}
- Be encouraging and supportive
- If you suggest an action, explain HOW to do it
- Use simple language, avoid jargon

RECENT CONVERSATION:
{history}
{reply_context}

USER MESSAGE: {message}

AI CO-FOUNDER RESPONSE:",
        name = or_default(&profile.business_name, "Not provided"),
        industry = or_default(&profile.industry, "General business"),
        team = or_default(&profile.team_size, "Not specified"),
        challenges = join_or(&profile.challenges, "Not specified"),
        goals = join_or(&profile.goals, "Not specified"),
        channels = join_or(&profile.channels, "Not specified"),
        tools = join_or(&profile.current_tools, "Not specified"),
        chat_context = chat_context,
        mode = mode,
        history = history,
        reply_context = reply_context,
        message = sanitized_message,
    )
}

/// Chat pipeline with the guard on both sides of the generator.
pub struct GuardedChat<G> {
    guard: Arc<SecurityGuard>,
    generator: G,
    timeout: Duration,
}

impl<G: TextGenerator> GuardedChat<G> {
    pub fn new(guard: Arc<SecurityGuard>, generator: G) -> Self {
        Self {
            guard,
            generator,
            timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn guard(&self) -> &SecurityGuard {
        &self.guard
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Run one chat turn.
    ///
    /// A blocked message is an `Ok(ChatOutcome::Blocked)`; only generator
    /// failures are errors.
    pub async fn respond(&self, request: &ChatRequest) -> Result<ChatOutcome, ChatError> {
        let span = tracing::info_span!(
            "chat_turn",
            user_id = %request.user_id,
            role = %request.user_role,
            mode = ?request.mode,
            status = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
            tokens_used = tracing::field::Empty,
        );
        self.respond_inner(request).instrument(span).await
    }

    async fn respond_inner(&self, request: &ChatRequest) -> Result<ChatOutcome, ChatError> {
        let span = tracing::Span::current();
        let started = Instant::now();

        let check = self
            .guard
            .validate_input(&request.message, &request.user_id, request.user_role);
        if !check.allowed {
            span.record("status", "blocked");
            return Ok(ChatOutcome::Blocked {
                reason: check
                    .reason
                    .unwrap_or_else(|| "Invalid request".to_string()),
                risk_level: check.risk_level,
            });
        }

        let sanitized = check
            .sanitized_input
            .unwrap_or_else(|| request.message.clone());
        let prompt = build_prompt(request, &sanitized);
        let tokens_used = estimate_tokens(&prompt);

        let generated = tokio::time::timeout(self.timeout, self.generator.generate(&prompt, request.mode))
            .await
            .map_err(|_| ChatError::Timeout(self.timeout))
            .and_then(|r| r);
        let raw = match generated {
            Ok(raw) => raw,
            Err(e) => {
                span.record("status", "error");
                tracing::warn!(error = %e, "text generation failed");
                return Err(e);
            }
        };

        let filtered = self.guard.filter_output(&raw, request.user_role);
        self.guard
            .log_interaction(&request.user_id, &sanitized, &filtered, tokens_used);

        span.record("status", "ok");
        span.record("latency_ms", started.elapsed().as_millis() as u64);
        span.record("tokens_used", tokens_used);

        Ok(ChatOutcome::Answered(ChatReply {
            response: filtered.trim().to_string(),
            tokens_used,
        }))
    }
}
