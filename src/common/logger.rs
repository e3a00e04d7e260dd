//! Structured logging with visual formatting.
//!
//! All crate output goes through the macros defined here. Lines are drawn with
//! the same box characters everywhere so that interleaved output from many
//! concurrently adapting lights stays readable:
//!
//! ```text
//! ┏ adaptive-lighting v0.4.0 ━━╸
//! ┃
//! ┣ living_room: adapting 2 lights
//! ┃   light.desk -> 74% 3850K
//! ┣[DEBUG] light.desk: skipping redundant color call
//! ╹
//! ```
//!
//! ## Logging Conventions
//!
//! - **`log_block_start!`** opens a conceptual block (pipe spacer + `┣ message`).
//! - **`log_decorated!`** continues a block (`┣ message`).
//! - **`log_indented!`** nests details under the previous line (`┃   message`).
//! - **`log_pipe!`** inserts a spacer, typically before a semantic level line.
//! - **`log_version!`** / **`log_end!`** frame a whole run.
//! - **`log_info!`**, **`log_warning!`**, **`log_error!`**, **`log_critical!`**
//!   print a colored `[LEVEL]` tag. **`log_debug!`** only prints in debug mode.
//!
//! Output can be silenced at runtime (`Log::set_enabled`) and routed to a file
//! through a background writer thread (`Log::start_file_logging`).

use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);
static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);
static TIMESTAMPS_ENABLED: AtomicBool = AtomicBool::new(false);

// Channel for routing output to file when --log is active
static LOG_CHANNEL: OnceLock<Sender<LogMessage>> = OnceLock::new();

enum LogMessage {
    Formatted(String),
    Shutdown,
}

/// Kind of line produced by a logging macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Decorated,
    Indented,
    BlockStart,
    Pipe,
    End,
    Info,
    Warning,
    Error,
    Debug,
    Critical,
}

impl Line {
    fn render(self, prefix: &str, message: &str) -> String {
        match self {
            Line::Decorated => format!("{prefix}┣ {message}\n"),
            Line::Indented => format!("{prefix}┃   {message}\n"),
            Line::BlockStart => format!("{prefix}┃\n{prefix}┣ {message}\n"),
            Line::Pipe => format!("{prefix}┃\n"),
            Line::End => format!("{prefix}╹\n"),
            Line::Info => format!("{prefix}┣[\x1b[32mINFO\x1b[0m] {message}\n"),
            Line::Warning => format!("{prefix}┣[\x1b[33mWARNING\x1b[0m] {message}\n"),
            Line::Error => format!("{prefix}┣[\x1b[31mERROR\x1b[0m] {message}\n"),
            Line::Debug => format!("{prefix}┣[\x1b[32mDEBUG\x1b[0m] {message}\n"),
            Line::Critical => format!("{prefix}┣[\x1b[31mCRITICAL\x1b[0m] {message}\n"),
        }
    }
}

/// Global switchboard for the logging macros.
pub struct Log;

impl Log {
    /// Enable or disable all output.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Enable or disable `log_debug!` output.
    pub fn set_debug(enabled: bool) {
        DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_debug() -> bool {
        Self::is_enabled() && DEBUG_ENABLED.load(Ordering::SeqCst)
    }

    /// Prefix every line with the local wall-clock time.
    pub fn set_timestamps(enabled: bool) {
        TIMESTAMPS_ENABLED.store(enabled, Ordering::SeqCst);
    }

    /// Start file logging to the specified path.
    ///
    /// Lines are written by a dedicated thread so that logging from async
    /// tasks never blocks on file I/O. Dropping the returned guard flushes and
    /// joins the writer.
    pub fn start_file_logging(file_path: String) -> anyhow::Result<LoggerGuard> {
        let (tx, rx) = channel();

        LOG_CHANNEL
            .set(tx.clone())
            .map_err(|_| anyhow::anyhow!("Logger channel already initialized"))?;

        let handle = std::thread::spawn(move || {
            let mut file = std::fs::File::create(&file_path)?;

            loop {
                match rx.recv() {
                    Ok(LogMessage::Formatted(text)) => {
                        file.write_all(text.as_bytes())?;
                    }
                    Ok(LogMessage::Shutdown) | Err(_) => {
                        file.flush()?;
                        break;
                    }
                }
            }

            Ok::<(), anyhow::Error>(())
        });

        Ok(LoggerGuard {
            tx,
            handle: Some(handle),
        })
    }

    fn timestamp_prefix() -> String {
        if TIMESTAMPS_ENABLED.load(Ordering::SeqCst) {
            format!("[{}] ", chrono::Local::now().format("%H:%M:%S"))
        } else {
            String::new()
        }
    }
}

/// Guard for file logging that ensures clean shutdown.
pub struct LoggerGuard {
    tx: Sender<LogMessage>,
    handle: Option<std::thread::JoinHandle<anyhow::Result<()>>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(LogMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        // LOG_CHANNEL stays set; OnceLock can only be written once per process.
    }
}

/// Remove ANSI color sequences (`ESC [ ... m`) from a line.
pub(crate) fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == 'm' {
                    break;
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Render and route a single line. Called by the macros.
pub fn emit(line: Line, message: &str) {
    if !Log::is_enabled() {
        return;
    }
    let text = line.render(&Log::timestamp_prefix(), message);
    write_output(&text);
}

fn write_output(text: &str) {
    if let Some(tx) = LOG_CHANNEL.get() {
        let _ = tx.send(LogMessage::Formatted(strip_ansi_codes(text)));
    } else {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}

// # Logging Macros

/// Log a decorated message, typically as part of an existing block.
#[macro_export]
macro_rules! log_decorated {
    ($fmt:literal $($arg:tt)*) => {
        $crate::common::logger::emit($crate::common::logger::Line::Decorated, &format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::common::logger::emit($crate::common::logger::Line::Decorated, &format!("{}", $expr))
    };
}

/// Log an indented message for sub-items or details within a block.
#[macro_export]
macro_rules! log_indented {
    ($fmt:literal $($arg:tt)*) => {
        $crate::common::logger::emit($crate::common::logger::Line::Indented, &format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::common::logger::emit($crate::common::logger::Line::Indented, &format!("{}", $expr))
    };
}

/// Log a block start message, initiating a new conceptual block of information.
#[macro_export]
macro_rules! log_block_start {
    ($fmt:literal $($arg:tt)*) => {
        $crate::common::logger::emit($crate::common::logger::Line::BlockStart, &format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::common::logger::emit($crate::common::logger::Line::BlockStart, &format!("{}", $expr))
    };
}

/// Log a visual pipe separator for vertical spacing.
#[macro_export]
macro_rules! log_pipe {
    () => {
        $crate::common::logger::emit($crate::common::logger::Line::Pipe, "")
    };
}

/// Log the application version header.
#[macro_export]
macro_rules! log_version {
    () => {
        $crate::common::logger::emit(
            $crate::common::logger::Line::Decorated,
            &format!("adaptive-lighting v{} ━━╸", env!("CARGO_PKG_VERSION")),
        )
    };
}

/// Log the final termination marker.
#[macro_export]
macro_rules! log_end {
    () => {
        $crate::common::logger::emit($crate::common::logger::Line::End, "")
    };
}

/// Log an informational message with a green `[INFO]` tag.
#[macro_export]
macro_rules! log_info {
    ($fmt:literal $($arg:tt)*) => {
        $crate::common::logger::emit($crate::common::logger::Line::Info, &format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::common::logger::emit($crate::common::logger::Line::Info, &format!("{}", $expr))
    };
}

/// Log a warning message with a yellow `[WARNING]` tag.
#[macro_export]
macro_rules! log_warning {
    ($fmt:literal $($arg:tt)*) => {
        $crate::common::logger::emit($crate::common::logger::Line::Warning, &format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::common::logger::emit($crate::common::logger::Line::Warning, &format!("{}", $expr))
    };
}

/// Log an error message with a red `[ERROR]` tag.
#[macro_export]
macro_rules! log_error {
    ($fmt:literal $($arg:tt)*) => {
        $crate::common::logger::emit($crate::common::logger::Line::Error, &format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::common::logger::emit($crate::common::logger::Line::Error, &format!("{}", $expr))
    };
}

/// Log an operational detail; only printed when debug mode is enabled.
#[macro_export]
macro_rules! log_debug {
    ($fmt:literal $($arg:tt)*) => {
        if $crate::common::logger::Log::is_debug() {
            $crate::common::logger::emit($crate::common::logger::Line::Debug, &format!($fmt $($arg)*))
        }
    };
    ($expr:expr) => {
        if $crate::common::logger::Log::is_debug() {
            $crate::common::logger::emit($crate::common::logger::Line::Debug, &format!("{}", $expr))
        }
    };
}

/// Log a critical message with a red `[CRITICAL]` tag.
#[macro_export]
macro_rules! log_critical {
    ($fmt:literal $($arg:tt)*) => {
        $crate::common::logger::emit($crate::common::logger::Line::Critical, &format!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::common::logger::emit($crate::common::logger::Line::Critical, &format!("{}", $expr))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn strip_ansi_removes_color_sequences() {
        let colored = "┣[\x1b[33mWARNING\x1b[0m] light.desk unreachable\n";
        assert_eq!(
            strip_ansi_codes(colored),
            "┣[WARNING] light.desk unreachable\n"
        );
    }

    #[test]
    fn strip_ansi_keeps_lone_escape() {
        assert_eq!(strip_ansi_codes("a\x1bb"), "a\x1bb");
    }

    #[test]
    fn render_block_start_adds_spacer() {
        assert_eq!(
            Line::BlockStart.render("", "Loading configuration"),
            "┃\n┣ Loading configuration\n"
        );
        assert_eq!(Line::Indented.render("", "x"), "┃   x\n");
    }

    #[test]
    #[serial]
    fn debug_requires_logging_enabled() {
        Log::set_debug(true);
        Log::set_enabled(false);
        assert!(!Log::is_debug());
        Log::set_enabled(true);
        assert!(Log::is_debug());
        Log::set_debug(false);
        assert!(!Log::is_debug());
    }
}
