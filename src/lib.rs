//! iocsh-split: the EPICS IOC shell line splitter.
//!
//! A line of startup-script or interactive input is turned into an argument
//! vector, a map of numbered file-descriptor redirects, and an optional
//! error, following the IOC shell's own quoting, backslash and redirection
//! rules. Commands are never executed and redirect targets are never opened.
//!
//! # Architecture
//!
//! - **[`parse`]**: The single-pass word/redirect splitter, its result and error types, string codecs.
//! - **[`line`]**: Line preprocessing: echo decision, macro expansion, comment filtering.
//! - **[`macros`]**: The expansion hook trait and a table-backed default expander.
//! - **[`script`]**: Whole-script driver that tags each result with its load context.
//! - **[`config`]**: Configuration loading: embedded defaults + user overlay merge.
//! - **[`logging`]**: Logger setup and the error log at `~/.local/share/iocsh-split/errors.log`.

/// Configuration types, loading, and overlay merge logic.
pub mod config;
/// Line preprocessor and the per-line result type.
pub mod line;
/// Logger initialization and file-based error logging.
pub mod logging;
/// Macro expansion hook.
pub mod macros;
/// Word/redirect splitting: state machine, result types, codecs.
pub mod parse;
/// Script-level driver.
pub mod script;

pub use line::{LoadContext, ShellResult, parse_line};
pub use parse::{ParseResult, Redirect, RedirectMode, SplitError, StringEncoding, split};

/// Preprocess and split a line with the default settings and no macros.
///
/// This is the main entry point for tests and simple usage.
/// For scripts, macros or a custom encoding, use [`script::ScriptReader`].
pub fn split_line(line: &str) -> ShellResult {
    parse_line(line, &config::Settings::default(), None)
}
