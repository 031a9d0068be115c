// Copyright 2024-2026 SetMyBizz Contributors
// SPDX-License-Identifier: Apache-2.0

//! `filter`: redact AI output read from input for a viewer role.

use std::io::{Read, Write};

use crate::cli::{CliError, CliOptions};
use crate::security::{RedactionOutcome, SecurityGuard};

/// Redact all of `input` as one response and write it to `out`.
pub fn run_filter<R: Read, W: Write>(
    guard: &SecurityGuard,
    opts: &CliOptions,
    mut input: R,
    mut out: W,
) -> Result<RedactionOutcome, CliError> {
    let mut text = String::new();
    input.read_to_string(&mut text)?;

    let outcome = guard.redact_output(&text, opts.role);
    out.write_all(outcome.output.as_bytes())?;
    out.flush()?;
    Ok(outcome)
}
