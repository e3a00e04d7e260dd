//! Command-line argument parsing and processing.
//!
//! The binary has a single command, `preview`, which prints what every
//! configured switch would send over the course of a day. The usual help,
//! version and debug flags are handled here as well.

use chrono::NaiveDate;

/// Default spacing of preview rows in minutes.
pub const DEFAULT_PREVIEW_STEP_MINUTES: u32 = 60;

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Print each switch's sun events and settings over one day
    Preview {
        debug_enabled: bool,
        config_path: Option<String>,
        date: Option<NaiveDate>,
        step_minutes: u32,
        sleep: bool,
        log_file: Option<String>,
    },
    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// The first item is the program name and is skipped. Help and version
    /// flags win over everything else.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        if args_vec
            .iter()
            .any(|arg| arg == "--version" || arg == "-V" || arg == "-v")
        {
            return ParsedArgs {
                action: CliAction::ShowVersion,
            };
        }
        if args_vec.iter().any(|arg| arg == "--help" || arg == "-h") {
            return ParsedArgs {
                action: CliAction::ShowHelp,
            };
        }

        let mut debug_enabled = false;
        let mut command: Option<String> = None;
        let mut config_path: Option<String> = None;
        let mut date: Option<NaiveDate> = None;
        let mut step_minutes = DEFAULT_PREVIEW_STEP_MINUTES;
        let mut sleep = false;
        let mut log_file: Option<String> = None;
        let mut unknown_arg_found = false;

        let mut i = 0;
        while i < args_vec.len() {
            let arg_str = &args_vec[i];
            match arg_str.as_str() {
                "--debug" | "-d" => debug_enabled = true,
                "--sleep" | "-s" => sleep = true,
                "--config" | "-c" => {
                    // Parse: --config <path>
                    if i + 1 < args_vec.len() && !args_vec[i + 1].starts_with('-') {
                        config_path = Some(args_vec[i + 1].clone());
                        i += 1;
                    } else {
                        log_warning!("Missing path for --config. Usage: --config <path>");
                        unknown_arg_found = true;
                    }
                }
                "--log" | "-l" => {
                    // Parse: --log <path>
                    if i + 1 < args_vec.len() && !args_vec[i + 1].starts_with('-') {
                        log_file = Some(args_vec[i + 1].clone());
                        i += 1;
                    } else {
                        log_warning!("Missing path for --log. Usage: --log <path>");
                        unknown_arg_found = true;
                    }
                }
                "--date" => {
                    // Parse: --date YYYY-MM-DD
                    match args_vec
                        .get(i + 1)
                        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
                    {
                        Some(Ok(parsed)) => {
                            date = Some(parsed);
                            i += 1;
                        }
                        Some(Err(_)) => {
                            log_error!("Invalid date '{}'. Use YYYY-MM-DD", args_vec[i + 1]);
                            unknown_arg_found = true;
                            i += 1;
                        }
                        None => {
                            log_warning!("Missing value for --date. Usage: --date YYYY-MM-DD");
                            unknown_arg_found = true;
                        }
                    }
                }
                "--step" => {
                    // Parse: --step <minutes>, 1 to 720
                    match args_vec.get(i + 1).map(|s| s.parse::<u32>()) {
                        Some(Ok(minutes)) if (1..=720).contains(&minutes) => {
                            step_minutes = minutes;
                            i += 1;
                        }
                        Some(_) => {
                            log_error!(
                                "Invalid step '{}'. Must be between 1 and 720 minutes",
                                args_vec[i + 1]
                            );
                            unknown_arg_found = true;
                            i += 1;
                        }
                        None => {
                            log_warning!("Missing value for --step. Usage: --step <minutes>");
                            unknown_arg_found = true;
                        }
                    }
                }
                _ => {
                    if arg_str.starts_with('-') {
                        log_warning!("Unknown option: {arg_str}");
                        unknown_arg_found = true;
                    } else if command.is_none() {
                        command = Some(arg_str.clone());
                    } else {
                        log_error!("Unexpected argument: {arg_str}");
                        unknown_arg_found = true;
                    }
                }
            }
            i += 1;
        }

        let action = match command.as_deref() {
            _ if unknown_arg_found => CliAction::ShowHelpDueToError,
            Some("preview" | "p") => CliAction::Preview {
                debug_enabled,
                config_path,
                date,
                step_minutes,
                sleep,
                log_file,
            },
            Some(other) => {
                log_warning!("Unknown command: {other}");
                CliAction::ShowHelpDueToError
            }
            None => CliAction::ShowHelp,
        };

        ParsedArgs { action }
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("adaptive-lighting [OPTIONS] <COMMAND>");
    log_block_start!("Options:");
    log_indented!("-c, --config <path>    Use a specific configuration file");
    log_indented!("-d, --debug            Enable detailed debug output");
    log_indented!("-l, --log <path>       Write output to a file instead of stdout");
    log_indented!("-h, --help             Print help information");
    log_indented!("-V, --version          Print version information");
    log_block_start!("Commands:");
    log_indented!("preview, p             Print sun events and light settings over a day");
    log_indented!("    --date YYYY-MM-DD  Day to preview (default: today)");
    log_indented!("    --step <minutes>   Spacing of the rows (default: 60)");
    log_indented!("    -s, --sleep        Preview with sleep mode on");
    log_end!();
}
