//! Tracing setup
//!
//! Diagnostics go to stderr under `RUST_LOG`. Event records are appended to a
//! daily rotated event log inside the configured log directory, with
//! `pod_lifecycle.log` linking to the file currently written.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{filter::Targets, fmt, prelude::*, EnvFilter};

/// Rotated files are named `pod_lifecycle.log.<YYYY-MM-DD>`; the bare name
/// links to the current one
pub const EVENT_LOG_FILE: &str = "pod_lifecycle.log";

/// Target of the records written by the event sink
const EVENT_TARGET: &str = "podwatch_lib::observability";

/// Rolling event log that keeps the `pod_lifecycle.log` link current
pub struct EventLogWriter {
    appender: RollingFileAppender,
    log_dir: PathBuf,
    linked: Option<String>,
}

impl EventLogWriter {
    /// Open the event log, creating the directory if needed. At most
    /// `max_files` rotated files are kept.
    pub fn open(log_dir: &Path, max_files: usize) -> Result<Self> {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(EVENT_LOG_FILE)
            .max_log_files(max_files)
            .build(log_dir)
            .with_context(|| format!("Can't write log to {}", log_dir.display()))?;

        let mut writer = Self {
            appender,
            log_dir: log_dir.to_path_buf(),
            linked: None,
        };
        writer
            .refresh_link(Utc::now())
            .with_context(|| format!("Failed to link {}", writer.current_path().display()))?;
        Ok(writer)
    }

    /// Stable path of the file currently written
    pub fn current_path(&self) -> PathBuf {
        self.log_dir.join(EVENT_LOG_FILE)
    }

    fn refresh_link(&mut self, now: DateTime<Utc>) -> io::Result<()> {
        let target = rotated_file_name(now);
        if self.linked.as_deref() == Some(target.as_str()) {
            return Ok(());
        }
        // Not created yet when the appender rotates after this check
        if !self.log_dir.join(&target).exists() {
            return Ok(());
        }

        let link = self.current_path();
        match std::fs::remove_file(&link) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
            _ => {}
        }
        symlink(&target, &link)?;
        self.linked = Some(target);
        Ok(())
    }
}

impl Write for EventLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.appender.write(buf)?;
        // A stale link never blocks the event log itself
        let _ = self.refresh_link(Utc::now());
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.appender.flush()
    }
}

/// File name the daily appender writes to on `now`'s date
pub fn rotated_file_name(now: DateTime<Utc>) -> String {
    format!("{}.{}", EVENT_LOG_FILE, now.format("%Y-%m-%d"))
}

#[cfg(unix)]
fn symlink(target: &str, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink(_target: &str, _link: &Path) -> io::Result<()> {
    Ok(())
}

/// Event records always reach the event log, whatever `RUST_LOG` says
fn event_log_filter() -> Targets {
    Targets::new().with_target(EVENT_TARGET, LevelFilter::INFO)
}

fn subscriber(
    stderr_filter: EnvFilter,
    event_log: EventLogWriter,
) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_writer(io::stderr)
                .with_filter(stderr_filter),
        )
        .with(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(Mutex::new(event_log))
                .with_filter(event_log_filter()),
        )
}

/// Install the global subscriber. Returns the stable event log path.
pub fn init(log_dir: &Path, max_files: usize) -> Result<PathBuf> {
    let event_log = EventLogWriter::open(log_dir, max_files)?;
    let path = event_log.current_path();
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    subscriber(stderr_filter, event_log)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(path)
}
