use std::io::Write;
use std::path::Path;

use log::LevelFilter;
use simplelog::{ColorChoice, TermLogger, TerminalMode, WriteLogger};

use crate::config::ConfigError;
use crate::line::ShellResult;

/// Map `-v` repetitions to a level: warnings by default, then info, debug, trace.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the global logger: stderr, or `log_file` when given.
/// A logger that is already installed is left in place.
pub fn init(level: LevelFilter, log_file: Option<&Path>) -> Result<(), ConfigError> {
    let config = simplelog::Config::default();
    let installed = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| ConfigError::LogFile {
                    path: path.to_path_buf(),
                    source,
                })?;
            WriteLogger::init(level, config, file)
        }
        None => TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto),
    };
    if installed.is_err() {
        log::debug!("logger already installed");
    }
    Ok(())
}

/// Append a record for a line that failed to split to
/// ~/.local/share/iocsh-split/errors.log.
/// Best-effort: failures are silently ignored (logging must never stop a run).
pub fn log_result(result: &ShellResult) {
    if result.error.is_none() {
        return;
    }
    let Some(home) = std::env::var_os("HOME") else {
        return;
    };
    let log_dir = Path::new(&home).join(".local/share/iocsh-split");
    let _ = std::fs::create_dir_all(&log_dir);

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("errors.log"))
    else {
        return;
    };

    let _ = writeln!(file, "{}", format_record(result, &timestamp_now()));
}

/// One tab-separated line: timestamp, context, error, original line.
fn format_record(result: &ShellResult, ts: &str) -> String {
    let context = result
        .context
        .as_ref()
        .map_or_else(|| "-".to_string(), |c| c.to_string());
    let error = result
        .error
        .as_ref()
        .map_or_else(String::new, |e| e.to_string());
    let line: String = result.line.trim().chars().take(200).collect();
    format!("{ts}\t{context}\t{error}\t{line}")
}

/// Simple UTC timestamp without external deps.
fn timestamp_now() -> String {
    let dur = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = dur.as_secs();
    let days = secs / 86400;
    let rem = secs % 86400;
    let (year, month, day) = epoch_days_to_date(days);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}Z",
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

/// Convert days since Unix epoch to (year, month, day).
fn epoch_days_to_date(days: u64) -> (u64, u64, u64) {
    // Civil calendar from days algorithm (Howard Hinnant)
    let z = days + 719468;
    let era = z / 146097;
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = yoe + era * 400 + u64::from(m <= 2);
    (y, m, d)
}
