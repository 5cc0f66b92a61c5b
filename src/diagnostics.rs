use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Local;
use serde::Serialize;

use crate::error::ImportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Info => write!(f, "INFO"),
            Level::Warning => write!(f, "WARNING"),
            Level::Error => write!(f, "ERROR"),
        }
    }
}

/// Receives leveled import diagnostics.
pub trait DiagnosticsSink {
    fn record(&self, level: Level, message: &str);

    /// Backing log file, if the sink writes one.
    fn log_path(&self) -> Option<&Utf8Path> {
        None
    }

    fn info(&self, message: &str) {
        self.record(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.record(Level::Warning, message);
    }

    fn error(&self, message: &str) {
        self.record(Level::Error, message);
    }
}

fn emit_tracing(level: Level, message: &str) {
    match level {
        Level::Info => tracing::info!("{message}"),
        Level::Warning => tracing::warn!("{message}"),
        Level::Error => tracing::error!("{message}"),
    }
}

/// Forwards diagnostics to `tracing` without keeping a log file.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn record(&self, level: Level, message: &str) {
        emit_tracing(level, message);
    }
}

/// Per-run import log file; every line is mirrored to `tracing`.
pub struct ImportLog {
    path: Utf8PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl ImportLog {
    pub fn create(dir: &Utf8Path, prefix: &str) -> Result<Self, ImportError> {
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| ImportError::Filesystem(err.to_string()))?;
        let stamp = Local::now().format("%Y%m%dT%H%M%S%.3f");
        let path = dir.join(format!("{prefix}-{stamp}.log"));
        let file = File::create(path.as_std_path())
            .map_err(|err| ImportError::Filesystem(format!("create {path}: {err}")))?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl DiagnosticsSink for ImportLog {
    fn record(&self, level: Level, message: &str) {
        emit_tracing(level, message);
        if let Ok(mut writer) = self.writer.lock() {
            let stamp = Local::now().to_rfc3339();
            let _ = writeln!(writer, "{stamp} {level} {message}");
            let _ = writer.flush();
        }
    }

    fn log_path(&self) -> Option<&Utf8Path> {
        Some(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub level: Level,
    pub message: String,
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<Entry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, level: Level) -> usize {
        self.entries()
            .iter()
            .filter(|entry| entry.level == level)
            .count()
    }
}

impl DiagnosticsSink for MemorySink {
    fn record(&self, level: Level, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(Entry {
                level,
                message: message.to_string(),
            });
        }
    }
}

/// Counts warnings while forwarding to another sink.
pub struct CountingSink<'a> {
    inner: &'a dyn DiagnosticsSink,
    warnings: Mutex<usize>,
}

impl<'a> CountingSink<'a> {
    pub fn new(inner: &'a dyn DiagnosticsSink) -> Self {
        Self {
            inner,
            warnings: Mutex::new(0),
        }
    }

    pub fn warnings(&self) -> usize {
        self.warnings.lock().map(|count| *count).unwrap_or(0)
    }
}

impl DiagnosticsSink for CountingSink<'_> {
    fn record(&self, level: Level, message: &str) {
        if level == Level::Warning {
            if let Ok(mut count) = self.warnings.lock() {
                *count += 1;
            }
        }
        self.inner.record(level, message);
    }

    fn log_path(&self) -> Option<&Utf8Path> {
        self.inner.log_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_log_writes_leveled_lines() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let log = ImportLog::create(&dir, "simapro-import").unwrap();
        log.info("starting");
        log.warn("odd name");

        let content = std::fs::read_to_string(log.path().as_std_path()).unwrap();
        assert!(content.contains("INFO starting"));
        assert!(content.contains("WARNING odd name"));
        assert_eq!(log.log_path(), Some(log.path()));
    }

    #[test]
    fn tracing_sink_has_no_log_file() {
        let counting = CountingSink::new(&TracingSink);
        counting.warn("odd name");
        assert_eq!(counting.warnings(), 1);
        assert_eq!(counting.log_path(), None);
    }

    #[test]
    fn counting_sink_counts_warnings_only() {
        let memory = MemorySink::new();
        let counting = CountingSink::new(&memory);
        counting.info("a");
        counting.warn("b");
        counting.warn("c");
        assert_eq!(counting.warnings(), 2);
        assert_eq!(memory.entries().len(), 3);
    }
}
