//! Line preprocessing: echo decision, macro expansion and comment filtering
//! in front of the splitter.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::config::Settings;
use crate::macros::MacroExpander;
use crate::parse::{self, Redirect, SplitError};

/// Where a line came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadContext {
    /// Script name, e.g. `st.cmd`.
    pub name: String,
    /// 1-based line number.
    pub line: usize,
}

impl fmt::Display for LoadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.line)
    }
}

/// Outcome of preprocessing and splitting one shell line.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShellResult {
    pub context: Option<LoadContext>,
    /// The line as it was read.
    pub line: String,
    /// Text the shell would echo for this line.
    pub outputs: Vec<String>,
    pub argv: Vec<String>,
    pub redirects: BTreeMap<u8, Redirect>,
    pub error: Option<SplitError>,
    /// Reserved for whatever dispatches `argv`; never set here.
    pub result: Option<serde_json::Value>,
}

impl ShellResult {
    /// True when there is a command to dispatch.
    pub fn is_command(&self) -> bool {
        self.error.is_none() && !self.argv.is_empty()
    }

    /// argv rendered back as a shell-quoted command line.
    pub fn command_line(&self) -> String {
        shlex::try_join(self.argv.iter().map(String::as_str))
            .unwrap_or_else(|_| self.argv.join(" "))
    }
}

fn is_echoed(line: &str) -> bool {
    !line.is_empty() && !line.starts_with("#-")
}

/// Preprocess and split a single line.
///
/// Leading whitespace is trimmed, the line is echoed unless it starts with
/// `#-`, and macros are expanded when an expander is given. Without a prompt
/// the echo is decided again on the expanded text. Lines that are empty or
/// start with `#` after expansion are not split.
pub fn parse_line(
    line: &str,
    settings: &Settings,
    expander: Option<&dyn MacroExpander>,
) -> ShellResult {
    let mut result = ShellResult {
        line: line.to_string(),
        ..Default::default()
    };

    let trimmed = line.trim_start();
    if is_echoed(trimmed) {
        result.outputs.push(trimmed.to_string());
    }

    let expanded = match expander {
        Some(expander) => expander.expand(trimmed),
        None => trimmed.to_string(),
    };
    let expanded = expanded.trim_start();

    if !settings.has_prompt() && expanded != trimmed {
        result.outputs.clear();
        if is_echoed(expanded) {
            result.outputs.push(expanded.to_string());
        }
    }

    if expanded.is_empty() || expanded.starts_with('#') {
        return result;
    }

    let parsed = parse::split_with_encoding(expanded, settings.string_encoding);
    result.argv = parsed.argv;
    result.redirects = parsed.redirects;
    result.error = parsed.error;
    result
}
