//! setmybizz-guard entry point.
//!
//! Runs the guard over stdin for offline checks and operator tooling:
//! - `check` validates one message per line
//! - `filter` redacts an AI response
//! - `config` shows or validates configuration

use std::io::{self, BufWriter};
use std::process::ExitCode;

use setmybizz_guard::cli::{self, config_cmd, CliError, CliOptions};
use setmybizz_guard::config::EnvConfig;
use setmybizz_guard::telemetry::{init_logging, init_metrics};
use setmybizz_guard::GuardRuntime;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");
    let rest = args.get(2..).unwrap_or(&[]);

    match command {
        "check" => exit_with(run_guarded(rest, |runtime, opts| {
            let stdin = io::stdin();
            let stdout = io::stdout();
            cli::run_check(&runtime.guard, opts, stdin.lock(), BufWriter::new(stdout.lock()))?;
            Ok(())
        })),
        "filter" => exit_with(run_guarded(rest, |runtime, opts| {
            let stdin = io::stdin();
            let stdout = io::stdout();
            cli::run_filter(&runtime.guard, opts, stdin.lock(), stdout.lock())?;
            Ok(())
        })),
        "config" => {
            let subcommand = rest.first().map(|s| s.as_str()).unwrap_or("show");
            let opts = match CliOptions::parse(rest.get(1..).unwrap_or(&[])) {
                Ok(opts) => opts,
                Err(e) => return exit_with(Err(e)),
            };
            match subcommand {
                "show" => exit_with(config_cmd::run_show(&opts, io::stdout().lock())),
                "defaults" => exit_with(config_cmd::run_defaults(io::stdout().lock())),
                "validate" => {
                    let code = config_cmd::run_validate(&opts, io::stdout().lock());
                    ExitCode::from(code as u8)
                }
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("setmybizz-guard {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

/// Parse flags, load config, start telemetry and build the guard.
fn run_guarded<F>(args: &[String], body: F) -> Result<(), CliError>
where
    F: FnOnce(&GuardRuntime, &CliOptions) -> Result<(), CliError>,
{
    let opts = CliOptions::parse(args)?;
    let config = opts.load_config()?;
    start_telemetry(&config);
    config.validate()?;
    let runtime = GuardRuntime::new(&config)?;
    body(&runtime, &opts)
}

fn start_telemetry(config: &EnvConfig) {
    if let Err(e) = init_logging(&config.log) {
        eprintln!("Logging disabled: {}", e);
    }
    init_metrics();
}

fn exit_with(result: Result<(), CliError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "setmybizz-guard - AI chat security guard v{}

USAGE:
    setmybizz-guard <COMMAND> [OPTIONS]

COMMANDS:
    check        Validate one message per stdin line, print JSON results
    filter       Redact AI output from stdin for a viewer role
    config       Manage configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

OPTIONS:
    --user ID      User id for rate limiting and audit (default: cli)
    --role ROLE    owner, manager, employee or user (default: user)
    --config FILE  TOML configuration file
    --report       (check) Print stats and audit logs after the results
    --audit-out FILE  (check) Write the retained audit trail as JSON to FILE

EXAMPLES:
    setmybizz-guard check --user u-42 --role employee < messages.txt
    setmybizz-guard check --report < messages.txt
    setmybizz-guard filter --role manager < reply.txt
    setmybizz-guard config validate --config /etc/setmybizz/guard.toml

ENVIRONMENT:
    SMB_GUARD_CONFIG        TOML configuration file
    SMB_GUARD_ADMIN_SECRET  Admin read secret
    SMB_GUARD_LOG_LEVEL     Log filter (debug, info, warn, error)
    SMB_GUARD_LOG_FORMAT    json or pretty

EXIT CODES:
    0  Success
    1  Usage error / configuration warnings
    2  Configuration error
    3  I/O error
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "check" => {
            eprintln!(
                "setmybizz-guard check - Validate messages

USAGE:
    setmybizz-guard check [--user ID] [--role ROLE] [--config FILE] [--report]
                          [--audit-out FILE]

DESCRIPTION:
    Reads one message per line from stdin. Each line is one guarded request
    (rate limit included) and produces one JSON result line on stdout:

    {{\"allowed\":true,\"sanitizedInput\":\"...\",\"riskLevel\":\"low\"}}

    With --report, a final line holds {{\"stats\":...,\"logs\":[...]}}.
    With --audit-out FILE, every retained audit entry is written to FILE as a
    JSON array.
"
            );
        }
        "filter" => {
            eprintln!(
                "setmybizz-guard filter - Redact AI output

USAGE:
    setmybizz-guard filter [--role ROLE] [--config FILE]

DESCRIPTION:
    Reads an AI response from stdin and writes it to stdout with
    credentials, identity numbers, contact details and pricing internals
    redacted. Strategy text is also redacted unless --role owner.
"
            );
        }
        "config" => {
            eprintln!(
                "setmybizz-guard config - Manage configuration

USAGE:
    setmybizz-guard config <SUBCOMMAND> [--config FILE]

SUBCOMMANDS:
    show           Show effective configuration
    defaults       Show default configuration
    validate       Validate configuration (exit 0 valid, 1 warnings, 2 errors)
"
            );
        }
        _ => {
            eprintln!(
                "No detailed help available for '{}'. Use 'setmybizz-guard help' for general usage.",
                command
            );
        }
    }
}
