//! iocsh-split: split EPICS IOC shell scripts into argv and redirects.
//!
//! Reads each script (or stdin), writes one JSON object per line to stdout.
//!
//! Exit status:
//!   0  every line split cleanly
//!   1  at least one line carried an error
//!   2  a config, log or script file could not be read

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use iocsh_split::config::{Config, ConfigError};
use iocsh_split::line::ShellResult;
use iocsh_split::logging;
use iocsh_split::macros::{MacroContext, MacroExpander};
use iocsh_split::script::ScriptReader;

#[derive(Debug, Parser)]
#[command(name = "iocsh-split", version, about = "Split EPICS IOC shell scripts into argv and redirects")]
struct Cli {
    /// Scripts to split. Reads stdin when none are given.
    scripts: Vec<PathBuf>,

    /// Config overlay to merge over the defaults instead of the user config.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the merged configuration as TOML and exit.
    #[arg(long)]
    dump_config: bool,

    /// Define a macro (repeatable).
    #[arg(short = 'D', long = "define", value_name = "NAME=VALUE")]
    defines: Vec<String>,

    /// Split lines without macro expansion.
    #[arg(long)]
    no_macros: bool,

    /// Override the prompt; an empty prompt echoes expanded lines.
    #[arg(long)]
    prompt: Option<String>,

    /// Print only lines that failed to split.
    #[arg(long)]
    errors_only: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Write logs to FILE instead of stderr.
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(logging::level_for(cli.verbose), cli.log.as_deref()) {
        eprintln!("iocsh-split: {e}");
        return ExitCode::from(2);
    }

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            log::error!("{e}");
            eprintln!("iocsh-split: {e}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether every line split cleanly.
fn run(cli: &Cli) -> Result<bool, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    if let Some(prompt) = &cli.prompt {
        config.settings.prompt = prompt.clone();
    }

    let mut macros = MacroContext::from_config(&config.macros);
    for define in &cli.defines {
        if !macros.define_assignment(define) {
            log::warn!("ignoring malformed macro definition: {define:?}");
        }
    }
    config.macros.definitions = macros.definitions().clone();

    if cli.dump_config {
        match config.to_toml() {
            Ok(toml) => print!("{toml}"),
            Err(e) => log::error!("failed to render config: {e}"),
        }
        return Ok(true);
    }

    let expander: Option<&dyn MacroExpander> = if cli.no_macros { None } else { Some(&macros) };
    let reader = ScriptReader::new(&config.settings, expander);

    let mut clean = true;
    if cli.scripts.is_empty() {
        let mut input = Vec::new();
        std::io::stdin()
            .read_to_end(&mut input)
            .map_err(|source| ConfigError::Read {
                path: PathBuf::from("<stdin>"),
                source,
            })?;
        clean &= emit(&reader.parse_bytes(&input, "<stdin>"), cli.errors_only);
    } else {
        for path in &cli.scripts {
            log::info!("splitting {}", path.display());
            clean &= emit(&reader.parse_script_file(path)?, cli.errors_only);
        }
    }
    Ok(clean)
}

/// Print results as JSON lines; returns whether none carried an error.
fn emit(results: &[ShellResult], errors_only: bool) -> bool {
    let stdout = std::io::stdout();
    emit_to(&mut stdout.lock(), results, errors_only)
}

/// Once `out` refuses a write, printing stops but every result is still
/// checked and logged.
fn emit_to(out: &mut impl Write, results: &[ShellResult], errors_only: bool) -> bool {
    let mut clean = true;
    let mut printing = true;
    for result in results {
        if result.error.is_some() {
            clean = false;
            logging::log_result(result);
        } else if errors_only {
            continue;
        }
        if !printing {
            continue;
        }
        match serde_json::to_string(result) {
            Ok(json) => {
                if writeln!(out, "{json}").is_err() {
                    // stdout closed (e.g. piped into head)
                    printing = false;
                }
            }
            Err(e) => log::error!("failed to serialize result: {e}"),
        }
    }
    clean
}

#[cfg(test)]
mod tests {
    use super::*;
    use iocsh_split::config::Settings;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn results(lines: &[&str]) -> Vec<ShellResult> {
        let settings = Settings::default();
        ScriptReader::new(&settings, None).parse_script(lines.iter().copied(), "t.cmd")
    }

    #[test]
    fn prints_one_json_line_per_result() {
        let mut out = Vec::new();
        assert!(emit_to(&mut out, &results(&["iocInit", "dbl"]), false));
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| serde_json::from_str::<serde_json::Value>(l).is_ok()));
    }

    #[test]
    fn errors_only_skips_clean_lines() {
        let mut out = Vec::new();
        assert!(!emit_to(&mut out, &results(&["iocInit", "cmd > a > b"]), true));
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("Illegal redirection."));
    }

    #[test]
    fn closed_output_still_reports_later_errors() {
        let lines = ["iocInit", "dbl", "cmd > a > b"];
        assert!(!emit_to(&mut ClosedPipe, &results(&lines), false));
    }
}
