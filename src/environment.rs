/*============================================================
  Synavera Project: Syn-Pack
  Module: synpack_core::environment
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Host services shared by package records: a logger factory
    and a file-system abstraction for mount point queries.

  Security / Safety Notes:
    Read-only metadata lookups; nothing is written here.

  Dependencies:
    chrono for timestamps.

  Operational Scope:
    Constructed once by the entry point and shared by every
    ManagedPackage through an Arc.

  Revision History:
    2025-11-02 COD  Introduced Environment and FileSystem.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Injected collaborators instead of ambient globals
    - Trait seam for deterministic tests
============================================================*/

use std::io;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::logger::Logger;

/// File-system queries needed by package records.
pub trait FileSystem: Send + Sync {
    /// Last modification time of the file or directory at `uri`.
    fn last_write_time_utc(&self, uri: &str) -> io::Result<DateTime<Utc>>;
}

/// `FileSystem` backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhysicalFileSystem;

impl FileSystem for PhysicalFileSystem {
    fn last_write_time_utc(&self, uri: &str) -> io::Result<DateTime<Utc>> {
        let modified = std::fs::metadata(Path::new(uri))?.modified()?;
        Ok(DateTime::<Utc>::from(modified))
    }
}

/// Host environment handed to every package record.
#[derive(Clone)]
pub struct Environment {
    logger: Logger,
    file_system: Arc<dyn FileSystem>,
}

impl Environment {
    pub fn new(logger: Logger, file_system: Arc<dyn FileSystem>) -> Self {
        Self {
            logger,
            file_system,
        }
    }

    /// Environment over the real file system.
    pub fn physical(logger: Logger) -> Self {
        Self::new(logger, Arc::new(PhysicalFileSystem))
    }

    /// Logger tagged for `component`.
    pub fn logger(&self, component: &str) -> Logger {
        self.logger.component(component)
    }

    pub fn file_system(&self) -> &dyn FileSystem {
        self.file_system.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn physical_file_system_reads_mtime() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("pack.nupkg");
        std::fs::write(&file, b"zip").unwrap();

        let stamp = PhysicalFileSystem
            .last_write_time_utc(file.to_str().unwrap())
            .unwrap();
        assert!(stamp.timestamp() > 0);
    }

    #[test]
    fn physical_file_system_reports_missing_paths() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent");
        let err = PhysicalFileSystem
            .last_write_time_utc(missing.to_str().unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
