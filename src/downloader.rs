/*============================================================
  Synavera Project: Syn-Pack
  Module: synpack_core::downloader
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Contract for fetching package artifacts and the descriptor
    returned for each completed download.

  Security / Safety Notes:
    Implementations must never leave a partially written file
    under the final artifact name.

  Dependencies:
    async-trait for object-safe async methods, tokio-util for
    cancellation tokens.

  Operational Scope:
    Implemented by feed clients; consumed by the installer.

  Revision History:
    2025-11-02 COD  Defined PackageDownloader and artifacts.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Trait seam between orchestration and transport
    - Immutable result values
============================================================*/

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Metadata for a package artifact that has been written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageArtifact {
    author: Option<String>,
    owners: Option<String>,
    trusted: bool,
    full_path: PathBuf,
    source: String,
    identifier: String,
    version: String,
}

impl PackageArtifact {
    pub fn new(
        identifier: impl Into<String>,
        version: impl Into<String>,
        full_path: PathBuf,
        source: impl Into<String>,
    ) -> Self {
        Self {
            author: None,
            owners: None,
            trusted: false,
            full_path,
            source: source.into(),
            identifier: identifier.into(),
            version: version.into(),
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_owners(mut self, owners: impl Into<String>) -> Self {
        self.owners = Some(owners.into());
        self
    }

    pub fn with_trusted(mut self, trusted: bool) -> Self {
        self.trusted = trusted;
        self
    }

    /// Copy of this artifact pointing at `full_path`; every other field is
    /// unchanged. Used after moving a download to its final location.
    pub fn with_full_path(&self, full_path: PathBuf) -> Self {
        Self {
            full_path,
            ..self.clone()
        }
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn owners(&self) -> Option<&str> {
        self.owners.as_deref()
    }

    pub fn trusted(&self) -> bool {
        self.trusted
    }

    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

/// Fetches package artifacts into local storage.
#[async_trait]
pub trait PackageDownloader: Send + Sync {
    /// Download `identifier` into `target_path`.
    ///
    /// * `version` - exact version to fetch; `None` resolves the latest
    /// * `additional_sources` - feeds consulted before the configured ones
    /// * `force` - overwrite an existing artifact at the destination
    /// * `cancel` - aborts the transfer; no final artifact is left behind
    async fn download_package(
        &self,
        target_path: &Path,
        identifier: &str,
        version: Option<&str>,
        additional_sources: &[String],
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<PackageArtifact>;
}
