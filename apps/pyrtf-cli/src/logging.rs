//! Logging initialization and log file management.
//!
//! Every command writes a JSON log file at
//! `.pyrtf/logs/<command>/<timestamp>.log`. Commands that print to the
//! terminal also get a human-readable stderr layer; the TUI does not, since
//! stderr output would tear the alternate screen.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::cli::LogContext;

/// Maximum age of log files before cleanup, in days.
const LOG_RETENTION_DAYS: u64 = 3;

/// Directory under the working directory that holds all logs.
fn logs_root(work_dir: &Path) -> PathBuf {
    work_dir.join(".pyrtf").join("logs")
}

/// Initialize the tracing subscriber for a command.
///
/// Returns the [`WorkerGuard`] of the file writer, which must be held for
/// the lifetime of the program so buffered logs are flushed. If the log file
/// cannot be opened, falls back to stderr-only logging (or none, for the
/// TUI) and returns `None`.
pub fn init_tracing(ctx: &LogContext) -> Option<WorkerGuard> {
    match open_log_writer(&ctx.work_dir, ctx.command) {
        Ok((writer, guard)) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(EnvFilter::from_default_env());

            let stderr_layer = ctx.stderr.then(|| {
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_filter(EnvFilter::from_default_env())
            });

            tracing_subscriber::registry()
                .with(file_layer)
                .with(stderr_layer)
                .init();
            Some(guard)
        }
        Err(e) => {
            if ctx.stderr {
                tracing_subscriber::fmt()
                    .with_writer(std::io::stderr)
                    .with_env_filter(EnvFilter::from_default_env())
                    .init();
                tracing::warn!(error = %e, "file logging disabled");
            }
            None
        }
    }
}

/// Create the log directory and file, returning a non-blocking writer and guard.
fn open_log_writer(
    work_dir: &Path,
    command: &str,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let log_path = build_log_path(work_dir, command);

    let log_dir = log_path.parent().context(format!(
        "failed to resolve parent directory for log path: {}",
        log_path.display(),
    ))?;

    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory: {}", log_dir.display()))?;

    let log_file = fs::File::create(&log_path)
        .with_context(|| format!("failed to create log file: {}", log_path.display()))?;

    Ok(tracing_appender::non_blocking(log_file))
}

/// Remove log files older than 3 days from `.pyrtf/logs/`.
///
/// Best effort: failures on individual files are reported with `eprintln!`
/// (tracing is not initialized yet) and skipped.
pub fn cleanup_old_logs(work_dir: &Path) {
    let logs_dir = logs_root(work_dir);
    if !logs_dir.is_dir() {
        return;
    }

    let cutoff = std::time::SystemTime::now()
        - std::time::Duration::from_secs(LOG_RETENTION_DAYS * 24 * 60 * 60);

    remove_old_log_files(&logs_dir, cutoff);
    remove_empty_dirs(&logs_dir);
}

/// Build the log file path: `.pyrtf/logs/<command>/<YYYYMMDD_HHMMSS>.log`.
fn build_log_path(work_dir: &Path, command: &str) -> PathBuf {
    let timestamp = format_utc_timestamp(std::time::SystemTime::now());
    logs_root(work_dir)
        .join(command)
        .join(format!("{timestamp}.log"))
}

/// Format a [`SystemTime`](std::time::SystemTime) as `YYYYMMDD_HHMMSS` in UTC.
fn format_utc_timestamp(time: std::time::SystemTime) -> String {
    let secs = time
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let days = secs / 86400;
    let time_of_day = secs % 86400;
    let (year, month, day) = days_to_date(days);

    format!(
        "{year:04}{month:02}{day:02}_{:02}{:02}{:02}",
        time_of_day / 3600,
        (time_of_day % 3600) / 60,
        time_of_day % 60
    )
}

/// Convert days since the Unix epoch to a Gregorian (year, month, day).
fn days_to_date(days_since_epoch: u64) -> (u64, u64, u64) {
    // civil_from_days, with the era starting on 0000-03-01.
    let z = days_since_epoch as i64 + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = (yoe as i64) + era * 400 + i64::from(month <= 2);

    (year as u64, month, day)
}

/// Recursively remove `.log` files older than `cutoff` from `dir`.
fn remove_old_log_files(dir: &Path, cutoff: std::time::SystemTime) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!(
                "warning: failed to read log directory {}: {e}",
                dir.display()
            );
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();

        if path.is_dir() {
            remove_old_log_files(&path, cutoff);
            continue;
        }

        if path.extension().and_then(|e| e.to_str()) != Some("log") {
            continue;
        }

        let is_old = fs::metadata(&path)
            .and_then(|m| m.modified())
            .is_ok_and(|modified| modified < cutoff);

        if is_old && let Err(e) = fs::remove_file(&path) {
            eprintln!(
                "warning: failed to remove old log file {}: {e}",
                path.display(),
            );
        }
    }
}

/// Remove empty subdirectories under `dir` (does not remove `dir` itself).
fn remove_empty_dirs(dir: &Path) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for path in entries.flatten().map(|e| e.path()) {
        if path.is_dir() {
            remove_empty_dirs(&path);
            // Fails when not empty.
            let _ = fs::remove_dir(&path);
        }
    }
}
