// Copyright 2024-2026 SetMyBizz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.
//!
//! These commands read configuration from the environment (and the config
//! file, when one is given) without building a guard.

use std::io::Write;

use crate::cli::{CliError, CliOptions};
use crate::config::{EffectiveConfig, EnvConfig};

/// Print effective config as key-value pairs.
pub fn run_show<W: Write>(opts: &CliOptions, out: W) -> Result<(), CliError> {
    let cfg = opts.load_config()?.effective_config();
    print_config(&cfg, out)?;
    Ok(())
}

/// Print default config values (no file, no env overrides).
pub fn run_defaults<W: Write>(out: W) -> Result<(), CliError> {
    print_config(&EnvConfig::default().effective_config(), out)?;
    Ok(())
}

/// Validate configuration.
///
/// Returns 0 if valid, 1 if there are warnings, 2 on a hard error.
pub fn run_validate<W: Write>(opts: &CliOptions, mut out: W) -> i32 {
    let env = match opts.load_config() {
        Ok(env) => env,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return 2;
        }
    };
    if let Err(e) = env.validate() {
        eprintln!("ERROR: {}", e);
        return 2;
    }

    let cfg = env.effective_config();
    let mut warnings = 0;

    if !cfg.admin_configured {
        eprintln!("WARNING: SMB_GUARD_ADMIN_SECRET is unset; admin reads are disabled");
        warnings += 1;
    }

    if cfg.audit_previews {
        eprintln!("WARNING: audit previews are enabled; audit entries will contain message fragments");
        warnings += 1;
    }

    if cfg.limit_owner < cfg.limit_user {
        eprintln!(
            "WARNING: owner limit ({}) is below the default user limit ({})",
            cfg.limit_owner, cfg.limit_user
        );
        warnings += 1;
    }

    if warnings == 0 {
        let _ = writeln!(out, "Configuration is valid.");
        0
    } else {
        1
    }
}

fn print_config<W: Write>(cfg: &EffectiveConfig, mut out: W) -> std::io::Result<()> {
    writeln!(out, "SMB_GUARD_MAX_INPUT_CHARS={}", cfg.max_input_chars)?;
    writeln!(out, "SMB_GUARD_RATE_WINDOW_SECS={}", cfg.rate_window_secs)?;
    writeln!(out, "SMB_GUARD_LIMIT_OWNER={}", cfg.limit_owner)?;
    writeln!(out, "SMB_GUARD_LIMIT_MANAGER={}", cfg.limit_manager)?;
    writeln!(out, "SMB_GUARD_LIMIT_EMPLOYEE={}", cfg.limit_employee)?;
    writeln!(out, "SMB_GUARD_LIMIT_USER={}", cfg.limit_user)?;
    writeln!(out, "SMB_GUARD_AUDIT_CAPACITY={}", cfg.audit_capacity)?;
    writeln!(out, "SMB_GUARD_AUDIT_PREVIEWS={}", cfg.audit_previews)?;
    writeln!(out, "SMB_GUARD_ADMIN_SECRET={}", if cfg.admin_configured { "<set>" } else { "<unset>" })?;
    writeln!(out, "SMB_GUARD_LOG_LEVEL={}", cfg.log_level)?;
    writeln!(out, "SMB_GUARD_LOG_FORMAT={}", match cfg.log_format {
        crate::telemetry::LogFormat::Json => "json",
        crate::telemetry::LogFormat::Pretty => "pretty",
    })?;
    writeln!(
        out,
        "SMB_GUARD_LOG_FILE={}",
        cfg.log_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    )?;
    writeln!(out, "extra_redactions={}", cfg.extra_redactions)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_listing() {
        let mut out = Vec::new();
        run_defaults(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("SMB_GUARD_MAX_INPUT_CHARS=2000\n"));
        assert!(text.contains("SMB_GUARD_LIMIT_OWNER=60\n"));
        assert!(text.contains("SMB_GUARD_ADMIN_SECRET=<unset>\n"));
        assert!(text.contains("SMB_GUARD_LOG_FORMAT=json\n"));
    }

    #[test]
    fn test_secret_value_never_printed() {
        let env = EnvConfig {
            admin_secret: Some("hunter2".to_string()),
            ..Default::default()
        };
        let mut out = Vec::new();
        print_config(&env.effective_config(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("SMB_GUARD_ADMIN_SECRET=<set>"));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn test_validate_missing_file_is_hard_error() {
        let opts = CliOptions {
            config_path: Some("/definitely/not/here.toml".into()),
            ..Default::default()
        };
        assert_eq!(run_validate(&opts, Vec::new()), 2);
    }
}
