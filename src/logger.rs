/*============================================================
  Synavera Project: Syn-Pack
  Module: synpack_core::logger
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Provide structured, append-only logging for Syn-Pack-Core
    and hand out per-component child loggers.

  Security / Safety Notes:
    Entries carry package identifiers and paths only; feed
    contents are never logged.

  Dependencies:
    std::fs::File, std::sync::Mutex, chrono for UTC stamps,
    sha2 for session integrity hashing.

  Operational Scope:
    Shared by the installer, downloader, registry, and package
    records through the host Environment.

  Revision History:
    2025-11-02 COD  Component-scoped loggers sharing one sink;
                    console threshold replaces verbose flag.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Append-only logging with UTC timestamps
    - Deterministic formatting for auditability
    - Graceful error propagation on I/O failures
============================================================*/

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::error::{Result, SynpackError};

/// Structured log level, ordered from least to most severe.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

struct LogSink {
    file: Option<Mutex<BufWriter<File>>>,
    path: Option<PathBuf>,
    console_threshold: LogLevel,
}

/// Cheaply clonable logger; clones share the same sink.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<LogSink>,
    component: Arc<str>,
}

impl Logger {
    /// Build a logger that writes to stderr and optionally to a file.
    ///
    /// Every entry reaches the file. Stderr receives warnings and errors,
    /// or everything when `verbose` is set.
    pub fn new(path: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let file = match path.as_deref() {
            Some(file_path) => Some(Mutex::new(BufWriter::new(open_log_file(file_path)?))),
            None => None,
        };
        let console_threshold = if verbose {
            LogLevel::Debug
        } else {
            LogLevel::Warn
        };

        Ok(Self {
            sink: Arc::new(LogSink {
                file,
                path,
                console_threshold,
            }),
            component: Arc::from("core"),
        })
    }

    /// Derive a logger tagged with `name` that shares this logger's sink.
    pub fn component(&self, name: &str) -> Logger {
        Logger {
            sink: Arc::clone(&self.sink),
            component: Arc::from(name),
        }
    }

    /// Emit a log entry with the given level, code, and message.
    pub fn log<S: AsRef<str>>(&self, level: LogLevel, code: &str, message: S) {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let payload = format!(
            "{timestamp} [{}] [{}:{}] {}",
            level.as_str(),
            self.component,
            code,
            message.as_ref()
        );

        if level >= self.sink.console_threshold {
            eprintln!("{payload}");
        }

        let Some(file) = &self.sink.file else {
            return;
        };
        if let Ok(mut guard) = file.lock() {
            if writeln!(guard, "{payload}").is_err() || guard.flush().is_err() {
                eprintln!(
                    "{timestamp} [{}] [logger:SINK] Failed to write to log file",
                    LogLevel::Error.as_str()
                );
            }
        }
    }

    pub fn info<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Info, code, message);
    }

    pub fn warn<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Warn, code, message);
    }

    pub fn error<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Error, code, message);
    }

    pub fn debug<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Debug, code, message);
    }

    /// Return the path backing this logger, if any.
    pub fn path(&self) -> Option<&Path> {
        self.sink.path.as_deref()
    }

    /// Compute and persist SHA-256 digest of the log file next to it.
    pub fn finalize(&self) -> Result<()> {
        let Some(path) = self.path() else {
            return Ok(());
        };
        if let Some(file) = &self.sink.file {
            if let Ok(mut guard) = file.lock() {
                guard.flush()?;
            }
        }

        let data = std::fs::read(path).map_err(|err| {
            SynpackError::Filesystem(format!(
                "Failed to read log for hashing {}: {err}",
                path.display()
            ))
        })?;
        let digest = Sha256::digest(&data);

        let mut hash_os = path.as_os_str().to_os_string();
        hash_os.push(".hash");
        let hash_path = PathBuf::from(hash_os);
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        std::fs::write(&hash_path, format!("{digest:x}  {file_name}\n")).map_err(|err| {
            SynpackError::Filesystem(format!(
                "Failed to write hash file {}: {err}",
                hash_path.display()
            ))
        })?;
        Ok(())
    }
}

fn open_log_file(file_path: &Path) -> Result<File> {
    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            SynpackError::Filesystem(format!(
                "Failed to create log directory {}: {err}",
                parent.display()
            ))
        })?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(file_path)
        .map_err(|err| {
            SynpackError::Filesystem(format!(
                "Failed to open log file {}: {err}",
                file_path.display()
            ))
        })
}
