use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    fn as_str(self) -> &'static str {
        match self {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

/// Append-only diagnostic file, `error_log_YYYYMMDD_HHMMSS.txt`.
///
/// The file is created lazily on the first record so clean runs leave no
/// empty logs behind. Write failures are reported through `log` and dropped.
pub struct ErrorLog {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl ErrorLog {
    pub fn new(log_dir: &Path) -> Self {
        let name = format!("error_log_{}.txt", Local::now().format("%Y%m%d_%H%M%S"));
        Self {
            path: log_dir.join(name),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn error(&self, message: &str) {
        self.record(Severity::Error, message);
    }

    pub fn warning(&self, message: &str) {
        self.record(Severity::Warning, message);
    }

    pub fn record(&self, severity: Severity, message: &str) {
        let line = format!(
            "{} - {} - {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            severity.as_str(),
            message
        );

        let Ok(mut guard) = self.file.lock() else {
            return;
        };
        if guard.is_none() {
            if let Some(parent) = self.path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            match OpenOptions::new().create(true).append(true).open(&self.path) {
                Ok(f) => *guard = Some(f),
                Err(e) => {
                    log::warn!("Cannot open error log {}: {}", self.path.display(), e);
                    return;
                }
            }
        }
        if let Some(file) = guard.as_mut() {
            if let Err(e) = file.write_all(line.as_bytes()) {
                log::warn!("Cannot write error log {}: {}", self.path.display(), e);
            }
        }
    }
}
