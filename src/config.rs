use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parse::StringEncoding;

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

/// Errors raised while loading configuration, scripts or log files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to open log file '{path}': {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ── Final (merged) config types ──

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub macros: MacroConfig,
}

/// Settings consulted by the line preprocessor and the splitter.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// PS1, e.g. `epics>`. Only its emptiness matters to the preprocessor.
    #[serde(default = "default_prompt")]
    pub prompt: String,
    #[serde(default)]
    pub string_encoding: StringEncoding,
}

fn default_prompt() -> String {
    "epics>".into()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            string_encoding: StringEncoding::default(),
        }
    }
}

impl Settings {
    /// A non-empty prompt means the shell is interactive.
    pub fn has_prompt(&self) -> bool {
        !self.prompt.is_empty()
    }
}

/// Starting bindings for the default macro expander.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MacroConfig {
    /// Resolve names missing from `definitions` from the process environment.
    #[serde(default)]
    pub use_environment: bool,
    #[serde(default)]
    pub definitions: BTreeMap<String, String>,
}

// ── Overlay types (user config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    settings: SettingsOverlay,
    #[serde(default)]
    macros: MacrosOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct SettingsOverlay {
    prompt: Option<String>,
    string_encoding: Option<StringEncoding>,
}

#[derive(Debug, Deserialize, Default)]
struct MacrosOverlay {
    #[serde(default)]
    replace: bool,
    use_environment: Option<bool>,
    #[serde(default)]
    definitions: BTreeMap<String, String>,
    #[serde(default)]
    remove: Vec<String>,
}

// ── Merge logic ──

/// Merge user definitions into the defaults.
/// In replace mode: user table replaces the default entirely.
/// In merge mode: remove names first, then insert additions (overriding).
fn merge_map(
    base: &mut BTreeMap<String, String>,
    add: BTreeMap<String, String>,
    remove: &[String],
    replace: bool,
) {
    if replace {
        *base = add;
    } else {
        base.retain(|name, _| !remove.contains(name));
        base.extend(add);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Location of the user overlay: `~/.config/iocsh-split/config.toml`.
    pub fn user_config_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(Path::new(&home).join(".config/iocsh-split/config.toml"))
    }

    /// Load configuration with resolution order:
    /// 1. Start with embedded defaults
    /// 2. Merge user overlay from ~/.config/iocsh-split/config.toml (if exists)
    ///
    /// Scalars override; macro definitions extend. Set `replace = true` in
    /// `[macros]` to drop the default definitions, or list names in `remove`.
    pub fn load() -> Self {
        let mut config = Self::default_config();
        if let Some(path) = Self::user_config_path().filter(|p| p.exists()) {
            match Self::read_overlay(&path) {
                Ok(overlay) => config.apply_overlay(overlay),
                Err(e) => log::warn!("ignoring user config: {e}"),
            }
        }
        config
    }

    /// Defaults merged with an explicit overlay file. Unlike [`load`](Self::load),
    /// a missing or malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default_config();
        config.apply_overlay(Self::read_overlay(path)?);
        Ok(config)
    }

    fn read_overlay(path: &Path) -> Result<ConfigOverlay, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply an overlay on top of this config (merge semantics).
    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        // Settings: scalar overrides
        if let Some(v) = overlay.settings.prompt {
            self.settings.prompt = v;
        }
        if let Some(v) = overlay.settings.string_encoding {
            self.settings.string_encoding = v;
        }

        let m = overlay.macros;
        if let Some(v) = m.use_environment {
            self.macros.use_environment = v;
        }
        merge_map(&mut self.macros.definitions, m.definitions, &m.remove, m.replace);
    }

    /// Render the merged configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses() {
        let config = Config::default_config();
        assert_eq!(config.settings.prompt, "epics>");
        assert_eq!(config.settings.string_encoding, StringEncoding::Latin1);
        assert!(!config.macros.use_environment);
        assert!(config.macros.definitions.is_empty());
    }

    #[test]
    fn default_has_prompt() {
        assert!(Config::default_config().settings.has_prompt());
    }

    #[test]
    fn settings_default_matches_embedded() {
        let embedded = Config::default_config().settings;
        let built = Settings::default();
        assert_eq!(embedded.prompt, built.prompt);
        assert_eq!(embedded.string_encoding, built.string_encoding);
    }

    // ── Merge semantics ──

    #[test]
    fn overlay_overrides_settings() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [settings]
            prompt = ""
            string_encoding = "UTF8"
        "#,
        );
        assert!(!config.settings.has_prompt());
        assert_eq!(config.settings.string_encoding, StringEncoding::Utf8);
    }

    #[test]
    fn overlay_omitted_settings_unchanged() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [settings]
            string_encoding = "ascii"
        "#,
        );
        assert_eq!(config.settings.prompt, "epics>");
        assert_eq!(config.settings.string_encoding, StringEncoding::Ascii);
    }

    #[test]
    fn overlay_rejects_unknown_encoding() {
        let result: Result<ConfigOverlay, _> = toml::from_str(
            r#"
            [settings]
            string_encoding = "ebcdic"
        "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn overlay_extends_definitions() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [macros.definitions]
            IOC = "ioc-tst-01"
        "#,
        );
        config.apply_overlay_str(
            r#"
            [macros.definitions]
            P = "TST:"
        "#,
        );
        assert_eq!(config.macros.definitions["IOC"], "ioc-tst-01");
        assert_eq!(config.macros.definitions["P"], "TST:");
    }

    #[test]
    fn overlay_overrides_definition() {
        let mut config = Config::default_config();
        config.macros.definitions.insert("P".into(), "OLD:".into());
        config.apply_overlay_str(
            r#"
            [macros.definitions]
            P = "NEW:"
        "#,
        );
        assert_eq!(config.macros.definitions["P"], "NEW:");
    }

    #[test]
    fn overlay_removes_definition() {
        let mut config = Config::default_config();
        config.macros.definitions.insert("P".into(), "TST:".into());
        config.macros.definitions.insert("R".into(), "m1".into());
        config.apply_overlay_str(
            r#"
            [macros]
            remove = ["P"]
        "#,
        );
        assert!(!config.macros.definitions.contains_key("P"));
        assert!(config.macros.definitions.contains_key("R"));
    }

    #[test]
    fn overlay_replace_definitions() {
        let mut config = Config::default_config();
        config.macros.definitions.insert("P".into(), "TST:".into());
        config.apply_overlay_str(
            r#"
            [macros]
            replace = true
            [macros.definitions]
            R = "m1"
        "#,
        );
        assert_eq!(config.macros.definitions.len(), 1);
        assert_eq!(config.macros.definitions["R"], "m1");
    }

    #[test]
    fn overlay_use_environment() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [macros]
            use_environment = true
        "#,
        );
        assert!(config.macros.use_environment);
    }

    #[test]
    fn empty_overlay_changes_nothing() {
        let mut config = Config::default_config();
        config.apply_overlay_str("");
        assert_eq!(config.settings.prompt, "epics>");
        assert!(config.macros.definitions.is_empty());
    }

    #[test]
    fn toml_dump_reloads() {
        let mut config = Config::default_config();
        config.macros.definitions.insert("P".into(), "TST:".into());
        let dumped = config.to_toml().unwrap();
        let reloaded: Config = toml::from_str(&dumped).unwrap();
        assert_eq!(reloaded.settings.string_encoding, StringEncoding::Latin1);
        assert_eq!(reloaded.macros.definitions["P"], "TST:");
    }

    #[test]
    fn load_from_missing_file_is_error() {
        let err = Config::load_from(Path::new("/nonexistent/iocsh-split.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
