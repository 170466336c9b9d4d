mod cli;
mod dispatch;
mod output;
mod stdout_io;

use std::process::ExitCode;

use clap::{Parser, error::ErrorKind};
use glwatch_engine::EngineError;
use stdout_io::write_stdout_text;
use tracing_subscriber::EnvFilter;

const LOG_ENV_VAR: &str = "GLWATCH_LOG";

const ROOT_HELP: &str = "glwatch - GL aggregation and anomaly detection

Usage:
  glwatch <command>

Start here:
  glwatch analyze --help
  glwatch analyze <ledger.csv>
  glwatch snapshot list
";

const TOP_LEVEL_HELP: &str = "glwatch - GL aggregation and anomaly detection

USAGE: glwatch <command>

Analyze a GL extract:
  glwatch analyze <path>                          Totals, z-score, change and sign anomalies
  glwatch analyze <path> --json                   Same report as a JSON envelope
  glwatch analyze <path> --grouping range         Group by 10,000,000-wide GL ranges

Track periods:
  1. glwatch analyze <path> --save-snapshot --period 2024-01
  2. glwatch analyze <next-path>                  Compares against the latest snapshot
  glwatch snapshot list                           List saved snapshots
  glwatch snapshot show <snapshot-id>             Show one snapshot's aggregates

Other commands:
  glwatch aggregate <path>                        Group totals only

Run `glwatch <command> --help` for command usage.
Set GLWATCH_HOME to relocate the snapshot store and GLWATCH_LOG for diagnostics.
";

fn main() -> ExitCode {
    init_tracing();
    match run() {
        Ok(code) => code,
        Err(code) => code,
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run() -> Result<ExitCode, ExitCode> {
    let raw_args = std::env::args().collect::<Vec<String>>();
    if raw_args.len() == 1 {
        if write_stdout_text(ROOT_HELP).is_err() {
            return Err(ExitCode::from(2));
        }
        return Ok(ExitCode::SUCCESS);
    }

    let cli = match cli::Cli::try_parse() {
        Ok(value) => value,
        Err(err) => return Err(handle_parse_error(&err, &raw_args)),
    };
    let mode = output::mode_for_command(&cli.command);

    match dispatch::dispatch(&cli) {
        Ok(success) => {
            if output::print_success(&success, mode).is_err() {
                return Err(ExitCode::from(2));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => {
            if output::print_failure(&error, mode).is_err() {
                return Err(ExitCode::from(2));
            }
            Err(exit_code_for_error(&error))
        }
    }
}

fn handle_parse_error(err: &clap::Error, raw_args: &[String]) -> ExitCode {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            let text = if is_top_level_help_request(raw_args) {
                TOP_LEVEL_HELP.to_string()
            } else {
                err.to_string()
            };
            if write_stdout_text(&text).is_err() {
                return ExitCode::from(2);
            }
            ExitCode::SUCCESS
        }
        ErrorKind::DisplayVersion => {
            if write_stdout_text(&err.to_string()).is_err() {
                return ExitCode::from(2);
            }
            ExitCode::SUCCESS
        }
        _ => {
            let clean_message = strip_clap_boilerplate(&err.to_string());
            let parse_error = EngineError::invalid_argument_for_command(
                &clean_message,
                command_path_from_args(raw_args).as_deref(),
            );
            let mode = infer_requested_output_mode(raw_args);
            if output::print_failure(&parse_error, mode).is_err() {
                return ExitCode::from(2);
            }
            ExitCode::from(1)
        }
    }
}

fn is_top_level_help_request(raw_args: &[String]) -> bool {
    raw_args.len() == 2 && matches!(raw_args[1].as_str(), "--help" | "-h")
}

/// Drops clap's trailing usage block so the "What to do next" section is
/// the only guidance printed.
fn strip_clap_boilerplate(message: &str) -> String {
    let trimmed = if let Some(pos) = message.find("\n\nUsage:") {
        &message[..pos]
    } else if let Some(pos) = message.find("\nFor more information") {
        &message[..pos]
    } else {
        message
    };
    trimmed.trim_start_matches("error: ").trim_end().to_string()
}

fn command_path_from_args(raw_args: &[String]) -> Option<String> {
    let non_flags = raw_args
        .iter()
        .skip(1)
        .filter(|value| !value.starts_with('-'))
        .map(String::as_str)
        .collect::<Vec<&str>>();

    let hint = match non_flags.as_slice() {
        ["analyze", ..] => "analyze",
        ["aggregate", ..] => "aggregate",
        ["snapshot", "list", ..] => "snapshot list",
        ["snapshot", "show", ..] => "snapshot show",
        ["snapshot", ..] => "snapshot",
        _ => return None,
    };
    Some(hint.to_string())
}

fn exit_code_for_error(error: &EngineError) -> ExitCode {
    if error.is_internal() {
        ExitCode::from(2)
    } else {
        ExitCode::from(1)
    }
}

fn infer_requested_output_mode(raw_args: &[String]) -> output::OutputMode {
    if raw_args.iter().skip(1).any(|value| value == "--json") {
        return output::OutputMode::Json;
    }
    output::OutputMode::Text
}

#[cfg(test)]
mod tests {
    use super::{command_path_from_args, strip_clap_boilerplate};

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn command_hint_follows_subcommand_path() {
        assert_eq!(
            command_path_from_args(&args(&["glwatch", "snapshot", "show", "--json"])).as_deref(),
            Some("snapshot show")
        );
        assert_eq!(
            command_path_from_args(&args(&["glwatch", "analyze", "--bogus"])).as_deref(),
            Some("analyze")
        );
        assert_eq!(command_path_from_args(&args(&["glwatch", "nope"])), None);
    }

    #[test]
    fn clap_usage_block_is_stripped() {
        let message = "error: unexpected argument '--bogus' found\n\nUsage: glwatch analyze [PATH]\n";
        assert_eq!(
            strip_clap_boilerplate(message),
            "unexpected argument '--bogus' found"
        );
    }
}
