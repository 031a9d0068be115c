//! Guard configuration from environment variables and an optional TOML file.
//!
//! Values are loaded from `SMB_GUARD_*` environment variables on top of
//! defaults (or on top of a TOML file via [`load_file`]). Invalid values fall
//! back to the underlying value without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `SMB_GUARD_MAX_INPUT_CHARS` | 2000 | Max message length (characters) |
//! | `SMB_GUARD_RATE_WINDOW_SECS` | 60 | Rate-limit window (secs, max 86400) |
//! | `SMB_GUARD_LIMIT_OWNER` | 60 | Requests per window, owner |
//! | `SMB_GUARD_LIMIT_MANAGER` | 30 | Requests per window, manager |
//! | `SMB_GUARD_LIMIT_EMPLOYEE` | 20 | Requests per window, employee |
//! | `SMB_GUARD_LIMIT_USER` | 10 | Requests per window, anyone else |
//! | `SMB_GUARD_AUDIT_CAPACITY` | 1000 | Audit entries retained |
//! | `SMB_GUARD_AUDIT_PREVIEWS` | false | Keep truncated text previews in audit |
//! | `SMB_GUARD_ADMIN_SECRET` | unset | Admin read secret (unset = closed) |
//! | `SMB_GUARD_LOG_LEVEL` | info | Tracing filter directive |
//! | `SMB_GUARD_LOG_FORMAT` | json | `json` or `pretty` |
//! | `SMB_GUARD_LOG_FILE` | unset | Append logs to this file instead of stderr |
//!
//! The admin secret is read from the environment only; it is never taken
//! from the TOML file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::security::guard::MAX_RATE_WINDOW_SECS;
use crate::security::{GuardConfig, GuardError, OutputRedactor};
use crate::telemetry::{LogConfig, LogFormat};

const MAX_INPUT_CHARS_CEILING: usize = 100_000;

/// Effective configuration summary (serializable).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub max_input_chars: usize,
    pub rate_window_secs: u64,
    pub limit_owner: u32,
    pub limit_manager: u32,
    pub limit_employee: u32,
    pub limit_user: u32,
    pub audit_capacity: usize,
    pub audit_previews: bool,
    pub extra_redactions: usize,
    pub admin_configured: bool,
    pub log_level: String,
    pub log_format: LogFormat,
    pub log_file: Option<PathBuf>,
}

/// All guard configuration.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub guard: GuardConfig,
    pub log: LogConfig,
    pub admin_secret: Option<String>,
}

/// On-disk layout of a TOML config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    guard: GuardConfig,
    log: LogConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Guard(#[from] GuardError),
    #[error("invalid log filter '{0}'")]
    LogLevel(String),
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u32` env var, returning `default` on missing or invalid.
fn parse_u32(key: &str, default: u32) -> u32 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u32>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a boolean env var (`1/0/true/false/yes/no/on/off`).
fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Overlay guard tuning from environment, then apply floors and ceilings.
fn apply_guard_env(guard: &mut GuardConfig) {
    guard.max_input_chars = parse_usize("SMB_GUARD_MAX_INPUT_CHARS", guard.max_input_chars);
    guard.rate_window_secs = parse_u64("SMB_GUARD_RATE_WINDOW_SECS", guard.rate_window_secs);
    guard.role_limits.owner = parse_u32("SMB_GUARD_LIMIT_OWNER", guard.role_limits.owner);
    guard.role_limits.manager = parse_u32("SMB_GUARD_LIMIT_MANAGER", guard.role_limits.manager);
    guard.role_limits.employee = parse_u32("SMB_GUARD_LIMIT_EMPLOYEE", guard.role_limits.employee);
    guard.role_limits.user = parse_u32("SMB_GUARD_LIMIT_USER", guard.role_limits.user);
    guard.audit_capacity = parse_usize("SMB_GUARD_AUDIT_CAPACITY", guard.audit_capacity);
    guard.audit_previews = parse_bool("SMB_GUARD_AUDIT_PREVIEWS", guard.audit_previews);
    apply_floors(guard);
}

fn apply_floors(guard: &mut GuardConfig) {
    guard.max_input_chars = guard.max_input_chars.clamp(1, MAX_INPUT_CHARS_CEILING);
    guard.rate_window_secs = guard.rate_window_secs.clamp(1, MAX_RATE_WINDOW_SECS);
    guard.role_limits.owner = guard.role_limits.owner.max(1);
    guard.role_limits.manager = guard.role_limits.manager.max(1);
    guard.role_limits.employee = guard.role_limits.employee.max(1);
    guard.role_limits.user = guard.role_limits.user.max(1);
    guard.audit_capacity = guard.audit_capacity.max(1);
}

/// Overlay logging settings from environment.
fn apply_log_env(log: &mut LogConfig) {
    if let Some(level) = non_empty_var("SMB_GUARD_LOG_LEVEL") {
        log.level = level;
    }
    if let Some(format) = non_empty_var("SMB_GUARD_LOG_FORMAT") {
        log.format = format.parse().unwrap_or(log.format);
    }
    if let Some(file) = non_empty_var("SMB_GUARD_LOG_FILE") {
        log.output_path = Some(PathBuf::from(file));
    }
}

fn apply_env(mut config: EnvConfig) -> EnvConfig {
    apply_guard_env(&mut config.guard);
    apply_log_env(&mut config.log);
    config.admin_secret = non_empty_var("SMB_GUARD_ADMIN_SECRET");
    config
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    apply_env(EnvConfig::default())
}

/// Load a TOML file, then overlay environment variables on top of it.
pub fn load_file(path: impl AsRef<Path>) -> Result<EnvConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file: ConfigFile = toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(apply_env(EnvConfig {
        guard: file.guard,
        log: file.log,
        admin_secret: None,
    }))
}

impl EnvConfig {
    /// Check everything that can only fail at guard construction time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        OutputRedactor::with_extra(&self.guard.extra_redactions)?;
        tracing_subscriber::EnvFilter::try_new(&self.log.level)
            .map_err(|_| ConfigError::LogLevel(self.log.level.clone()))?;
        Ok(())
    }

    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            max_input_chars: self.guard.max_input_chars,
            rate_window_secs: self.guard.rate_window_secs,
            limit_owner: self.guard.role_limits.owner,
            limit_manager: self.guard.role_limits.manager,
            limit_employee: self.guard.role_limits.employee,
            limit_user: self.guard.role_limits.user,
            audit_capacity: self.guard.audit_capacity,
            audit_previews: self.guard.audit_previews,
            extra_redactions: self.guard.extra_redactions.len(),
            admin_configured: self.admin_secret.is_some(),
            log_level: self.log.level.clone(),
            log_format: self.log.format,
            log_file: self.log.output_path.clone(),
        }
    }
}
