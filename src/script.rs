//! Run the preprocessor over every line of a startup script.

use std::path::Path;

use crate::config::{ConfigError, Settings};
use crate::line::{LoadContext, ShellResult, parse_line};
use crate::macros::MacroExpander;

/// Splits whole scripts, tagging each result with its script name and line.
pub struct ScriptReader<'a> {
    settings: &'a Settings,
    expander: Option<&'a dyn MacroExpander>,
}

impl<'a> ScriptReader<'a> {
    pub fn new(settings: &'a Settings, expander: Option<&'a dyn MacroExpander>) -> Self {
        Self { settings, expander }
    }

    /// Parse one line under `context`.
    pub fn parse_line(&self, line: &str, context: LoadContext) -> ShellResult {
        let mut result = parse_line(line, self.settings, self.expander);
        if let Some(error) = &result.error {
            log::warn!("{context}: {error}");
        }
        result.context = Some(context);
        result
    }

    /// Parse every line of `lines`, numbering from 1.
    pub fn parse_script<I, S>(&self, lines: I, name: &str) -> Vec<ShellResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        lines
            .into_iter()
            .enumerate()
            .map(|(i, line)| {
                let context = LoadContext {
                    name: name.to_string(),
                    line: i + 1,
                };
                self.parse_line(line.as_ref(), context)
            })
            .collect()
    }

    /// Parse a script held in raw bytes, decoded with the configured codec.
    pub fn parse_bytes(&self, bytes: &[u8], name: &str) -> Vec<ShellResult> {
        let text = self.settings.string_encoding.decode(bytes);
        self.parse_script(text.lines(), name)
    }

    /// Read and parse a script file.
    pub fn parse_script_file(&self, path: &Path) -> Result<Vec<ShellResult>, ConfigError> {
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("read {} byte(s) from {}", bytes.len(), path.display());
        Ok(self.parse_bytes(&bytes, &path.display().to_string()))
    }
}
