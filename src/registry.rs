/*============================================================
  Synavera Project: Syn-Pack
  Module: synpack_core::registry
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Persist installed package records as a JSON document keyed
    by package identifier.

  Security / Safety Notes:
    Registry data is written to operator-controlled paths; no
    privileged operations are performed.

  Dependencies:
    serde + serde_json for the document, chrono for stamps.

  Operational Scope:
    Read and rewritten by every installer command.

  Revision History:
    2025-11-02 COD  Authored registry from manifest writer.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic ordering for reproducible documents
    - Identity kept beside, not inside, the exported details
    - Explicit error paths for unreadable documents
============================================================*/

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::environment::Environment;
use crate::error::{Result, SynpackError};
use crate::logger::Logger;
use crate::managed_package::{ComponentRef, ManagedPackage, PackageDetails};

/// Full registry document as stored on disk.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RegistryDocument {
    pub metadata: RegistryMetadata,
    pub packages: BTreeMap<String, RegistryEntry>,
}

/// Metadata block describing the last write.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RegistryMetadata {
    pub updated_at: String,
    pub updated_by: String,
    pub total_packages: usize,
}

/// One installed package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub mount_point_uri: String,
    pub installer: ComponentRef,
    pub provider: ComponentRef,
    pub installed_at: String,
    pub details: PackageDetails,
}

/// Registry of installed packages backed by a JSON file.
pub struct PackageRegistry {
    path: PathBuf,
    document: RegistryDocument,
    logger: Logger,
}

impl PackageRegistry {
    /// Load the registry at `path`; a missing file is an empty registry.
    pub fn load(path: &Path, logger: Logger) -> Result<Self> {
        let document = match File::open(path) {
            Ok(file) => serde_json::from_reader(BufReader::new(file)).map_err(|err| {
                SynpackError::Serialization(format!(
                    "Failed to parse registry {}: {err}",
                    path.display()
                ))
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                logger.debug(
                    "LOAD",
                    format!("No registry at {}; starting empty", path.display()),
                );
                RegistryDocument::default()
            }
            Err(err) => {
                return Err(SynpackError::Filesystem(format!(
                    "Failed to open registry {}: {err}",
                    path.display()
                )))
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            document,
            logger,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.document.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.packages.is_empty()
    }

    /// Insert or replace the entry for `package`.
    ///
    /// `installed_at` is kept while the package stays at the same mount
    /// point; a new mount point counts as a fresh install.
    pub fn upsert(&mut self, package: &ManagedPackage) {
        let key = registry_key(package.identifier());
        let installed_at = match self.document.packages.get(&key) {
            Some(existing) if existing.mount_point_uri == package.mount_point_uri() => {
                existing.installed_at.clone()
            }
            _ => Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        let entry = RegistryEntry {
            mount_point_uri: package.mount_point_uri().to_string(),
            installer: package.installer().clone(),
            provider: package.provider().clone(),
            installed_at,
            details: package.to_persisted(),
        };
        if self.document.packages.insert(key, entry).is_some() {
            self.logger
                .debug("UPSERT", format!("Replaced {}", package.display_name()));
        }
    }

    /// Remove and return the entry for `identifier` (case-insensitive).
    pub fn remove(&mut self, identifier: &str) -> Option<RegistryEntry> {
        self.document.packages.remove(&registry_key(identifier))
    }

    pub fn get(&self, identifier: &str) -> Option<&RegistryEntry> {
        self.document.packages.get(&registry_key(identifier))
    }

    /// Rebuild the record stored for `identifier`.
    pub fn package(
        &self,
        environment: &Arc<Environment>,
        identifier: &str,
    ) -> Result<Option<ManagedPackage>> {
        self.get(identifier)
            .map(|entry| rebuild(environment, entry))
            .transpose()
    }

    /// Rebuild every stored record, ordered by identifier.
    pub fn packages(&self, environment: &Arc<Environment>) -> Result<Vec<ManagedPackage>> {
        self.document
            .packages
            .values()
            .map(|entry| rebuild(environment, entry))
            .collect()
    }

    /// Persist the registry, creating parent directories as needed.
    pub fn save(&mut self) -> Result<()> {
        self.document.metadata = RegistryMetadata {
            updated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            updated_by: "synpack_core".to_string(),
            total_packages: self.document.packages.len(),
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                SynpackError::Filesystem(format!(
                    "Failed to create registry directory {}: {err}",
                    parent.display()
                ))
            })?;
        }
        let file = File::create(&self.path).map_err(|err| {
            SynpackError::Filesystem(format!(
                "Failed to create registry file {}: {err}",
                self.path.display()
            ))
        })?;
        serde_json::to_writer_pretty(file, &self.document).map_err(|err| {
            SynpackError::Filesystem(format!(
                "Failed to write registry {}: {err}",
                self.path.display()
            ))
        })?;
        self.logger.debug(
            "SAVE",
            format!(
                "{} package(s) written to {}",
                self.document.packages.len(),
                self.path.display()
            ),
        );
        Ok(())
    }
}

fn rebuild(environment: &Arc<Environment>, entry: &RegistryEntry) -> Result<ManagedPackage> {
    ManagedPackage::from_details(
        Arc::clone(environment),
        entry.installer.clone(),
        entry.provider.clone(),
        &entry.mount_point_uri,
        &entry.details,
    )
}

fn registry_key(identifier: &str) -> String {
    identifier.trim().to_ascii_lowercase()
}
