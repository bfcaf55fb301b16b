//! Structured logging module for Daily Insights
//!
//! Writes logs to the configured log directory with categories:
//! - INSIGHTS: Orchestrator state transitions (cache hit, generate, fallback)
//! - HISTORY: Conversation and calendar aggregation
//! - ANALYSIS: AI and heuristic analysis
//! - STORE: Insights cache reads and writes
//! - ERROR: Recovered failures

use chrono::{Local, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use once_cell::sync::Lazy;

/// Log categories for structured logging
#[derive(Debug, Clone, Copy)]
pub enum LogCategory {
    Insights,
    History,
    Analysis,
    Store,
    Error,
}

impl LogCategory {
    fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Insights => "INSIGHTS",
            LogCategory::History => "HISTORY",
            LogCategory::Analysis => "ANALYSIS",
            LogCategory::Store => "STORE",
            LogCategory::Error => "ERROR",
        }
    }
}

/// Active log directory; `None` until `init_logging` runs (console only)
static LOG_DIR: Lazy<Mutex<Option<PathBuf>>> = Lazy::new(|| Mutex::new(None));

fn log_file_path(dir: &Path) -> PathBuf {
    let today = Local::now().format("%Y-%m-%d").to_string();
    dir.join(format!("insights-{}.log", today))
}

/// Initialize the logging system - creates log directory if needed
pub fn init_logging(log_dir: &Path) -> std::io::Result<()> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }

    if let Ok(mut guard) = LOG_DIR.lock() {
        *guard = Some(log_dir.to_path_buf());
    }

    log(LogCategory::Insights, None, "Daily Insights logging initialized");
    Ok(())
}

fn format_line(category: LogCategory, user_id: Option<&str>, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let user_context = user_id
        .map(|id| format!("user={} | ", id))
        .unwrap_or_default();

    format!("[{}] [{}] {}{}\n", timestamp, category.as_str(), user_context, message)
}

/// Log a message with category and optional user context
pub fn log(category: LogCategory, user_id: Option<&str>, message: &str) {
    let log_line = format_line(category, user_id, message);

    print!("{}", log_line);

    let dir = match LOG_DIR.lock() {
        Ok(guard) => guard.clone(),
        Err(_) => None,
    };
    if let Some(dir) = dir {
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file_path(&dir))
        {
            let _ = file.write_all(log_line.as_bytes());
        }
    }
}

/// Log an orchestrator state transition
pub fn log_insights(user_id: Option<&str>, message: &str) {
    log(LogCategory::Insights, user_id, message);
}

/// Log a history aggregation event
pub fn log_history(user_id: Option<&str>, message: &str) {
    log(LogCategory::History, user_id, message);
}

/// Log an analysis event
pub fn log_analysis(user_id: Option<&str>, message: &str) {
    log(LogCategory::Analysis, user_id, message);
}

/// Log a cache read or write
pub fn log_store(user_id: Option<&str>, message: &str) {
    log(LogCategory::Store, user_id, message);
}

/// Log a recovered error
pub fn log_error(user_id: Option<&str>, message: &str) {
    log(LogCategory::Error, user_id, message);
}

/// Clean up log files older than `retention_days`
pub fn cleanup_old_logs(log_dir: &Path, retention_days: i64) -> std::io::Result<usize> {
    let mut deleted = 0;

    if !log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(retention_days);

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("insights-") && n.ends_with(".log"))
            .unwrap_or(false);
        if !is_log {
            continue;
        }

        if let Ok(metadata) = entry.metadata() {
            if let Ok(modified) = metadata.modified() {
                let modified_time: chrono::DateTime<Utc> = modified.into();
                if modified_time < cutoff && fs::remove_file(&path).is_ok() {
                    deleted += 1;
                }
            }
        }
    }

    Ok(deleted)
}
