//! Malformations the splitter reports through [`ParseResult::error`](super::ParseResult).

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

use super::encoding::StringEncoding;
use super::types::RedirectMode;

/// Snapshot of a redirect at the moment it was found to be malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectState {
    pub fd: u8,
    pub mode: RedirectMode,
    /// `None` when the redirect never received a target.
    pub name: Option<String>,
}

impl fmt::Display for RedirectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.fd, self.mode.operator())?;
        if let Some(name) = &self.name {
            write!(f, " {name:?}")?;
        }
        Ok(())
    }
}

/// Why a line could not be split cleanly.
///
/// The messages follow the IOC shell's own diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    /// A redirect opened while another was pending, a fd assigned twice,
    /// or a redirect left without a target.
    #[error("Illegal redirection. ({redirect})")]
    IllegalRedirection { redirect: RedirectState },

    /// `N>` with `N` at or above the supported redirect count.
    #[error("Illegal redirection. ({fd}> out of range)")]
    RedirectFdOutOfRange { fd: u8 },

    /// Scan ended inside a quote after at least one word.
    #[error("Unbalanced quote. ({quote})")]
    UnbalancedQuote { quote: char },

    /// Scan ended with an unconsumed backslash after at least one word.
    #[error("Trailing backslash.")]
    TrailingBackslash,

    /// The line holds a char the configured codec cannot represent.
    #[error("Cannot encode {ch:?} as {encoding}.")]
    Unencodable { ch: char, encoding: StringEncoding },
}

impl SplitError {
    /// True for every member of the malformed-redirect family.
    pub fn is_redirect_error(&self) -> bool {
        matches!(
            self,
            SplitError::IllegalRedirection { .. } | SplitError::RedirectFdOutOfRange { .. }
        )
    }
}

impl Serialize for SplitError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
