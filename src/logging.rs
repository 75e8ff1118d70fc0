//! Per-run log files. Every CLI invocation gets its own file so that a failed
//! command can point at the exact trace it produced.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_LEVEL_ENV: &str = "KANBAN_SYNC_LOG_LEVEL";
const LOG_DIR_ENV: &str = "KANBAN_SYNC_LOG_DIR";
const LOG_FILE_PREFIX: &str = "kanban-sync-";
const LOG_FILE_SUFFIX: &str = ".log";
/// Runs are short and frequent; older files beyond this are removed at startup.
const KEPT_LOG_FILES: usize = 20;

/// Keeps the background writer alive. Drop it before exiting so buffered
/// lines reach the file.
pub struct LogSession {
    path: PathBuf,
    _guard: WorkerGuard,
}

impl LogSession {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn init_logging() -> Result<LogSession> {
    let log_dir = get_log_directory()?;
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory '{}'", log_dir.display()))?;

    if let Err(err) = prune_old_logs(&log_dir, KEPT_LOG_FILES.saturating_sub(1)) {
        eprintln!("warning: failed to prune old logs: {err:#}");
    }

    let log_file_path = get_log_file_path(&log_dir);
    let file = fs::File::create(&log_file_path)
        .with_context(|| format!("failed to create log file '{}'", log_file_path.display()))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(build_log_filter())
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    tracing::info!(
        version = env!("KANBAN_SYNC_BUILD_VERSION"),
        log_file = %log_file_path.display(),
        "kanban-sync started"
    );

    Ok(LogSession {
        path: log_file_path,
        _guard: guard,
    })
}

fn build_log_filter() -> EnvFilter {
    let level = std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|raw| normalize_log_level(raw.as_str()))
        .unwrap_or("warn");
    // Dependencies stay at warn.
    EnvFilter::new(format!("warn,kanban_sync={level}"))
}

fn normalize_log_level(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

/// `KANBAN_SYNC_LOG_DIR` when set and non-empty, otherwise
/// `data_local_dir/kanban-sync/logs`.
pub fn get_log_directory() -> Result<PathBuf> {
    log_directory_from(std::env::var_os(LOG_DIR_ENV).map(PathBuf::from))
}

fn log_directory_from(override_dir: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = override_dir.filter(|dir| !dir.as_os_str().is_empty()) {
        return Ok(dir);
    }
    let data_dir =
        dirs::data_local_dir().context("failed to determine local data directory")?;
    Ok(data_dir.join("kanban-sync").join("logs"))
}

/// Timestamp first so names sort chronologically; the pid keeps two runs in
/// the same second apart.
pub fn get_log_file_path(log_dir: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    log_dir.join(format!(
        "{LOG_FILE_PREFIX}{timestamp}-{}{LOG_FILE_SUFFIX}",
        std::process::id()
    ))
}

/// Deletes all but the newest `keep` run logs in `log_dir`. Other files are left alone.
pub fn prune_old_logs(log_dir: &Path, keep: usize) -> Result<usize> {
    let mut logs = Vec::new();
    for entry in fs::read_dir(log_dir)
        .with_context(|| format!("failed to read log directory '{}'", log_dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(LOG_FILE_PREFIX) && name.ends_with(LOG_FILE_SUFFIX) {
            logs.push((name, entry.path()));
        }
    }
    if logs.len() <= keep {
        return Ok(0);
    }

    logs.sort();
    let stale = logs.len() - keep;
    for (_, path) in logs.iter().take(stale) {
        fs::remove_file(path)
            .with_context(|| format!("failed to remove old log '{}'", path.display()))?;
    }
    Ok(stale)
}
