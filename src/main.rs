//! Main application entry point.
//!
//! Parses the command line and dispatches to the matching command handler.
//! The library does all the work; this file only maps actions to handlers and
//! results to exit codes.

use anyhow::Result;

use adaptive_lighting::args::{self, CliAction, ParsedArgs};
use adaptive_lighting::commands::preview::{PreviewOptions, run_preview_command};
use adaptive_lighting::common::constants::{EXIT_FAILURE, EXIT_SUCCESS};
use adaptive_lighting::common::logger::{Log, LoggerGuard};
use adaptive_lighting::{log_end, log_error};

fn main() {
    let parsed_args = ParsedArgs::from_env();

    // Keep the guard alive until every line, errors included, is written
    let mut log_guard: Option<LoggerGuard> = None;

    let result = match parsed_args.action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            args::display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            args::display_help();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::Preview {
            debug_enabled,
            config_path,
            date,
            step_minutes,
            sleep,
            log_file,
        } => {
            Log::set_debug(debug_enabled);
            start_file_logging(log_file, &mut log_guard).and_then(|()| {
                run_preview_command(PreviewOptions {
                    config_path,
                    date,
                    step_minutes,
                    sleep,
                })
            })
        }
    };

    let code = match result {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            log_error!("{e:#}");
            log_end!();
            EXIT_FAILURE
        }
    };

    // process::exit skips destructors, flush the file first
    drop(log_guard);
    std::process::exit(code);
}

fn start_file_logging(path: Option<String>, guard: &mut Option<LoggerGuard>) -> Result<()> {
    if let Some(path) = path {
        Log::set_timestamps(true);
        *guard = Some(Log::start_file_logging(path)?);
    }
    Ok(())
}
