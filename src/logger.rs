//! Structured console logging with box-drawing output.
//!
//! Every line the binary prints goes through these macros so that command
//! output, scheduler transitions and errors share one visual style:
//!
//! ```text
//! ┏ sunrise-alarm v0.3.0 ━━╸
//! ┃
//! ┣ Scheduling sunrise alarm
//! ┃   Location: Lisbon
//! ┃   Fire time: 06:41:12 (+00:00)
//! ╹
//! ```
//!
//! ## Conventions
//!
//! - **`log_block_start!`** opens a new conceptual block (`┃` spacer, then `┣ message`).
//! - **`log_decorated!`** continues the current block (`┣ message`).
//! - **`log_indented!`** prints nested detail (`┃   message`).
//! - **`log_pipe!`** prints a lone `┃`, used before a semantic message that starts
//!   a block of its own.
//! - **`log_info!`, `log_warning!`** carry a colored `[LEVEL]` tag.
//! - **`log_error_exit!`** closes the output with an error.
//! - **`log_debug!`** only prints once debug output has been switched on with
//!   [`Log::set_debug`].
//! - **`log_version!`** / **`log_end!`** open and close the whole output.
//!
//! Output can be redirected to a file with [`Log::start_file_logging`]; ANSI
//! color codes are stripped from the file output.

use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);
static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

// Set once when --log is active
static LOG_CHANNEL: OnceLock<Sender<LogMessage>> = OnceLock::new();

enum LogMessage {
    Formatted(String),
    Shutdown,
}

/// Runtime switches for the logging macros.
pub struct Log;

impl Log {
    /// Enable or disable all output (used by `--quiet` and by tests).
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Enable `log_debug!` output.
    pub fn set_debug(enabled: bool) {
        DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_debug() -> bool {
        DEBUG_ENABLED.load(Ordering::SeqCst)
    }

    /// Send all output to `file_path` instead of stdout until the guard is dropped.
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
}

/// Flushes and joins the file logging thread on drop.
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
    }
}

fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            // Skip until the terminating 'm'
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

/// Route a fully formatted line to stdout or the file logger.
pub fn write_output(text: &str) {
    if let Some(tx) = LOG_CHANNEL.get() {
        let _ = tx.send(LogMessage::Formatted(strip_ansi_codes(text)));
    } else {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }
}

/// Format a message with the given line prefix and emit it if logging is on.
///
/// Used by the macros; not meant to be called directly.
pub fn emit(prefix: &str, message: std::fmt::Arguments<'_>) {
    if Log::is_enabled() {
        write_output(&format!("{prefix}{message}\n"));
    }
}

/// Like [`emit`], but only when debug output is on.
pub fn emit_debug(message: std::fmt::Arguments<'_>) {
    if Log::is_debug() {
        emit("┣[\x1b[36mDEBUG\x1b[0m] ", message);
    }
}

// # Logging Macros

/// Continue the current block: `┣ message`.
#[macro_export]
macro_rules! log_decorated {
    ($($arg:tt)*) => {
        $crate::logger::emit("┣ ", format_args!($($arg)*))
    };
}

/// Nested detail: `┃   message`.
#[macro_export]
macro_rules! log_indented {
    ($($arg:tt)*) => {
        $crate::logger::emit("┃   ", format_args!($($arg)*))
    };
}

/// Vertical spacer: `┃`.
#[macro_export]
macro_rules! log_pipe {
    () => {
        $crate::logger::emit("┃", format_args!(""))
    };
}

/// Start a new block: `┃` followed by `┣ message`.
#[macro_export]
macro_rules! log_block_start {
    ($($arg:tt)*) => {{
        $crate::log_pipe!();
        $crate::logger::emit("┣ ", format_args!($($arg)*));
    }};
}

/// Application header.
#[macro_export]
macro_rules! log_version {
    () => {
        $crate::logger::emit(
            "┏ ",
            format_args!("sunrise-alarm v{} ━━╸", env!("CARGO_PKG_VERSION")),
        )
    };
}

/// Final termination marker.
#[macro_export]
macro_rules! log_end {
    () => {
        $crate::logger::emit("╹", format_args!(""))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::emit("┣[\x1b[32mINFO\x1b[0m] ", format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)*) => {
        $crate::logger::emit("┣[\x1b[33mWARNING\x1b[0m] ", format_args!($($arg)*))
    };
}

/// Error that ends the output: `┃` followed by `┗[ERROR] message`.
#[macro_export]
macro_rules! log_error_exit {
    ($($arg:tt)*) => {{
        $crate::log_pipe!();
        $crate::logger::emit("┗[\x1b[31mERROR\x1b[0m] ", format_args!($($arg)*));
    }};
}

/// Operational detail, printed only with `--debug`.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logger::emit_debug(format_args!($($arg)*))
    };
}
