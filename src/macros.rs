//! Macro expansion hook applied to a line before it is split.
//!
//! The preprocessor only needs something that turns text into text; IOC
//! macro semantics live behind [`MacroExpander`]. [`MacroContext`] is a
//! small table-backed implementation handling `$(NAME)` and `${NAME}`.
//! A bare `$NAME` is not a reference and stays in the text.

use std::collections::BTreeMap;

use crate::config::MacroConfig;

/// Text substitution applied to a raw line.
pub trait MacroExpander {
    fn expand(&self, text: &str) -> String;
}

impl<F> MacroExpander for F
where
    F: Fn(&str) -> String,
{
    fn expand(&self, text: &str) -> String {
        self(text)
    }
}

/// Named macro bindings with optional environment fallback.
///
/// References to names with no binding are left in the text untouched.
#[derive(Debug, Clone, Default)]
pub struct MacroContext {
    definitions: BTreeMap<String, String>,
    use_environment: bool,
}

impl MacroContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &MacroConfig) -> Self {
        Self {
            definitions: config.definitions.clone(),
            use_environment: config.use_environment,
        }
    }

    /// Fall back to process environment variables for unbound names.
    pub fn with_environment(mut self, enabled: bool) -> Self {
        self.use_environment = enabled;
        self
    }

    /// Bind `name` to `value`, returning the previous binding.
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.definitions.insert(name.into(), value.into())
    }

    pub fn undefine(&mut self, name: &str) -> Option<String> {
        self.definitions.remove(name)
    }

    /// Parse `NAME=VALUE` and bind it. Returns false when there is no `=`
    /// or the name is empty.
    pub fn define_assignment(&mut self, assignment: &str) -> bool {
        match assignment.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                self.define(name.trim(), value);
                true
            }
            _ => false,
        }
    }

    /// Value for `name` from the table, then the environment if enabled.
    pub fn get(&self, name: &str) -> Option<String> {
        self.definitions.get(name).cloned().or_else(|| {
            if self.use_environment {
                std::env::var(name).ok()
            } else {
                None
            }
        })
    }

    pub fn definitions(&self) -> &BTreeMap<String, String> {
        &self.definitions
    }

    /// Rewrite `text` into the syntax `shellexpand` reads. A `$(NAME)` with a
    /// binding becomes `${NAME}`, `${...}` passes through, and every other `$`
    /// is doubled so it comes back out as a literal.
    fn to_shellexpand(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(at) = rest.find('$') {
            out.push_str(&rest[..at]);
            let after = &rest[at + 1..];
            if after.starts_with('{')
                && let Some(close) = after.find('}')
            {
                out.push('$');
                out.push_str(&after[..=close]);
                rest = &after[close + 1..];
                continue;
            }
            if let Some(inner) = after.strip_prefix('(')
                && let Some(close) = inner.find(')')
                && !inner[..close].contains('}')
                && self.get(&inner[..close]).is_some()
            {
                out.push_str("${");
                out.push_str(&inner[..close]);
                out.push('}');
                rest = &inner[close + 1..];
                continue;
            }
            out.push_str("$$");
            rest = after;
        }
        out.push_str(rest);
        out
    }
}

impl MacroExpander for MacroContext {
    fn expand(&self, text: &str) -> String {
        if !text.contains('$') {
            return text.to_string();
        }
        let braced = self.to_shellexpand(text);
        shellexpand::env_with_context_no_errors(&braced, |name| self.get(name)).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> MacroContext {
        let mut ctx = MacroContext::new();
        ctx.define("P", "TST:");
        ctx.define("IOC", "ioc-tst-01");
        ctx
    }

    #[test]
    fn expands_braced_reference() {
        assert_eq!(
            context().expand(r#"dbLoadRecords("a.db", "P=${P}")"#),
            r#"dbLoadRecords("a.db", "P=TST:")"#
        );
    }

    #[test]
    fn expands_paren_reference() {
        assert_eq!(
            context().expand(r#"dbLoadRecords("a.db", "P=$(P)")"#),
            r#"dbLoadRecords("a.db", "P=TST:")"#
        );
    }

    #[test]
    fn mixed_references() {
        assert_eq!(context().expand("$(P)${IOC}:$(P)"), "TST:ioc-tst-01:TST:");
    }

    #[test]
    fn bare_reference_is_literal() {
        assert_eq!(context().expand("cd $IOC"), "cd $IOC");
    }

    #[test]
    fn leaves_unknown_reference() {
        assert_eq!(context().expand("echo ${MISSING}"), "echo ${MISSING}");
        assert_eq!(context().expand("echo $(MISSING)"), "echo $(MISSING)");
    }

    #[test]
    fn unterminated_reference_is_literal() {
        assert_eq!(context().expand("echo $(P"), "echo $(P");
        assert_eq!(context().expand("echo ${P"), "echo ${P");
    }

    #[test]
    fn literal_dollars_survive() {
        assert_eq!(context().expand("a$$b $ c$"), "a$$b $ c$");
    }

    #[test]
    fn braced_default_applies_when_unbound() {
        assert_eq!(context().expand("${MISSING:-x}/${P:-y}"), "x/TST:");
    }

    #[test]
    fn text_without_references_is_unchanged() {
        assert_eq!(context().expand("iocInit"), "iocInit");
    }

    #[test]
    fn define_returns_previous() {
        let mut ctx = context();
        assert_eq!(ctx.define("P", "NEW:"), Some("TST:".into()));
        assert_eq!(ctx.get("P").as_deref(), Some("NEW:"));
    }

    #[test]
    fn undefine_removes_binding() {
        let mut ctx = context();
        assert_eq!(ctx.undefine("P"), Some("TST:".into()));
        assert_eq!(ctx.expand("${P}"), "${P}");
    }

    #[test]
    fn define_assignment() {
        let mut ctx = MacroContext::new();
        assert!(ctx.define_assignment("R=m1:"));
        assert!(ctx.define_assignment("EMPTY="));
        assert!(!ctx.define_assignment("novalue"));
        assert!(!ctx.define_assignment("=x"));
        assert_eq!(ctx.get("R").as_deref(), Some("m1:"));
        assert_eq!(ctx.get("EMPTY").as_deref(), Some(""));
    }

    #[test]
    fn environment_fallback_is_opt_in() {
        let Some(home) = std::env::var_os("HOME") else {
            return;
        };
        let home = home.to_string_lossy().into_owned();
        assert_eq!(MacroContext::new().get("HOME"), None);
        assert_eq!(MacroContext::new().with_environment(true).get("HOME"), Some(home));
    }

    #[test]
    fn table_wins_over_environment() {
        let mut ctx = MacroContext::new().with_environment(true);
        ctx.define("HOME", "/ioc");
        assert_eq!(ctx.expand("${HOME}"), "/ioc");
    }

    #[test]
    fn from_config() {
        let mut config = MacroConfig::default();
        config.definitions.insert("P".into(), "X:".into());
        let ctx = MacroContext::from_config(&config);
        assert_eq!(ctx.definitions().len(), 1);
        assert_eq!(ctx.expand("$(P)"), "X:");
    }

    #[test]
    fn closures_are_expanders() {
        let upper = |text: &str| text.to_uppercase();
        assert_eq!(upper.expand("abc"), "ABC");
    }
}
