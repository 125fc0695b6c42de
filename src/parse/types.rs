//! Types produced by the line splitter and consumed by the interpreter layer.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::SplitError;

/// Bytes that separate words outside quotes: space, tab, parens, comma, CR.
pub const IFS: &[u8] = b" \t(),\r";

/// Number of redirectable file descriptors (0 through 4).
pub const NREDIRECTS: u8 = 5;

/// Key a rejected out-of-range `N>` is recorded under before scanning stops.
pub const OVERFLOW_REDIRECT_FD: u8 = 1;

/// fd used by a bare `>`.
pub const DEFAULT_OUTPUT_FD: u8 = 1;

/// fd used by `<`.
pub const INPUT_FD: u8 = 0;

/// How a redirect target is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedirectMode {
    /// `<`
    #[serde(rename = "r")]
    Read,
    /// `>` or `N>`
    #[serde(rename = "w")]
    Write,
    /// `>>` or `N>>`
    #[serde(rename = "a")]
    Append,
}

impl RedirectMode {
    /// fopen-style mode string.
    pub fn as_str(self) -> &'static str {
        match self {
            RedirectMode::Read => "r",
            RedirectMode::Write => "w",
            RedirectMode::Append => "a",
        }
    }

    /// The shell operator that produces this mode.
    pub fn operator(self) -> &'static str {
        match self {
            RedirectMode::Read => "<",
            RedirectMode::Write => ">",
            RedirectMode::Append => ">>",
        }
    }
}

impl fmt::Display for RedirectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `<`, `>`, `>>`, `N>` or `N>>` directive. The target is never opened here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    /// Target file name; empty only for redirects that also carry an error.
    pub name: String,
    pub mode: RedirectMode,
}

/// Everything the splitter recovered from one line.
///
/// When `error` is set, `argv` and `redirects` still hold what was
/// accumulated before the failure so callers can report it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseResult {
    pub argv: Vec<String>,
    pub redirects: BTreeMap<u8, Redirect>,
    pub error: Option<SplitError>,
}

impl ParseResult {
    /// True when the line split cleanly.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The command name, if any words were produced.
    pub fn command(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    /// The `<` redirect, which the interpreter treats as "read commands from".
    pub fn input_redirect(&self) -> Option<&Redirect> {
        self.redirects
            .get(&INPUT_FD)
            .filter(|r| r.mode == RedirectMode::Read)
    }

    /// Output redirects in fd order.
    pub fn output_redirects(&self) -> impl Iterator<Item = (u8, &Redirect)> {
        self.redirects
            .iter()
            .filter(|(_, r)| r.mode != RedirectMode::Read)
            .map(|(fd, r)| (*fd, r))
    }
}
