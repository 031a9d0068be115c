// Copyright 2024-2026 SetMyBizz Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommands for running the guard over stdin.
//!
//! ## Usage
//!
//! ```bash
//! setmybizz-guard check --user u-42 --role employee < messages.txt
//! setmybizz-guard filter --role user < reply.txt
//! setmybizz-guard config show
//! ```

pub mod check_cmd;
pub mod config_cmd;
pub mod filter_cmd;

use std::path::PathBuf;

use thiserror::Error;

use crate::config::{self, ConfigError, EnvConfig};
use crate::security::{GuardError, UserRole};

pub use check_cmd::{run_check, CheckSummary};
pub use filter_cmd::run_filter;

/// Environment variable naming a TOML config file.
pub const CONFIG_PATH_ENV: &str = "SMB_GUARD_CONFIG";

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Guard(#[from] GuardError),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => 1,
            Self::Config(_) | Self::Guard(_) => 2,
            Self::Io(_) | Self::Json(_) => 3,
        }
    }
}

/// Flags shared by the subcommands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOptions {
    pub user_id: Option<String>,
    pub role: UserRole,
    pub report: bool,
    pub config_path: Option<PathBuf>,
    /// File to receive the retained audit trail as JSON.
    pub audit_out: Option<PathBuf>,
}

impl CliOptions {
    /// Parse flags following the subcommand name.
    pub fn parse(args: &[String]) -> Result<Self, CliError> {
        let mut opts = Self::default();
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--user" => {
                    opts.user_id = Some(flag_value(args, i, "--user")?.to_string());
                    i += 2;
                }
                "--role" => {
                    opts.role = UserRole::parse(flag_value(args, i, "--role")?);
                    i += 2;
                }
                "--config" => {
                    opts.config_path = Some(PathBuf::from(flag_value(args, i, "--config")?));
                    i += 2;
                }
                "--audit-out" => {
                    opts.audit_out = Some(PathBuf::from(flag_value(args, i, "--audit-out")?));
                    i += 2;
                }
                "--report" => {
                    opts.report = true;
                    i += 1;
                }
                other => return Err(CliError::Usage(format!("Unknown argument: {}", other))),
            }
        }
        Ok(opts)
    }

    /// `--config` if given, else `SMB_GUARD_CONFIG`.
    pub fn resolved_config_path(&self) -> Option<PathBuf> {
        self.config_path.clone().or_else(|| {
            std::env::var(CONFIG_PATH_ENV)
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
        })
    }

    /// Load configuration from the resolved file (if any) and environment.
    pub fn load_config(&self) -> Result<EnvConfig, CliError> {
        match self.resolved_config_path() {
            Some(path) => Ok(config::load_file(path)?),
            None => Ok(config::load()),
        }
    }
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, CliError> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| CliError::Usage(format!("Missing value for {}", flag)))
}
