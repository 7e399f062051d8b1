/*============================================================
  Synavera Project: Syn-Pack
  Module: synpack_core::config
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Load Syn-Pack-Core settings from TOML and resolve default
    locations for packages, the registry, and logs.

  Security / Safety Notes:
    Only operator-owned paths are read. Feed entries are plain
    directories; no credentials are accepted here.

  Dependencies:
    serde + toml for parsing, dirs for platform directories.

  Operational Scope:
    Read once at start-up by the entry point.

  Revision History:
    2025-11-02 COD  Added [paths] and [feeds] sections.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Sensible defaults when no file is present
    - Explicit errors for unreadable or malformed files
============================================================*/

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, SynpackError};

const APP_DIR: &str = "syn-pack";
const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynpackConfig {
    pub paths: PathsConfig,
    pub feeds: FeedsConfig,
}

/// Storage locations. Unset entries fall back to the data directory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub packages_dir: Option<PathBuf>,
    pub registry_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

/// Package feeds consulted by the installer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedsConfig {
    /// Folder feeds searched on every install.
    pub sources: Vec<String>,
    /// Feeds whose packages are marked trusted.
    pub trusted_sources: Vec<String>,
    /// Reject packages that do not come from a trusted feed.
    pub require_trusted: bool,
    /// Copy buffer size for artifact transfers.
    pub copy_buffer_kib: usize,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            trusted_sources: Vec::new(),
            require_trusted: false,
            copy_buffer_kib: 64,
        }
    }
}

impl SynpackConfig {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load_from_optional_path(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(explicit) => Self::load_from_path(explicit),
            None => match default_config_path() {
                Some(default) if default.is_file() => Self::load_from_path(&default),
                _ => Ok(Self::default()),
            },
        }
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            SynpackError::Config(format!(
                "Failed to read configuration {}: {err}",
                path.display()
            ))
        })?;
        Self::parse(&raw).map_err(|err| match err {
            SynpackError::Config(message) => {
                SynpackError::Config(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Parse a TOML document.
    pub fn parse(raw: &str) -> Result<Self> {
        let config: SynpackConfig = toml::from_str(raw)
            .map_err(|err| SynpackError::Config(format!("Invalid configuration: {err}")))?;
        if config.feeds.copy_buffer_kib == 0 {
            return Err(SynpackError::Config(
                "feeds.copy_buffer_kib must be greater than zero".into(),
            ));
        }
        Ok(config)
    }

    pub fn packages_dir(&self) -> PathBuf {
        resolve(self.paths.packages_dir.as_deref(), "packages")
    }

    pub fn registry_path(&self) -> PathBuf {
        resolve(self.paths.registry_path.as_deref(), "registry.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        resolve(self.paths.log_dir.as_deref(), "logs")
    }
}

impl FeedsConfig {
    /// Whether `source` matches one of the trusted feeds.
    pub fn is_trusted_source(&self, source: &str) -> bool {
        let source = normalize_source(source);
        self.trusted_sources
            .iter()
            .any(|trusted| normalize_source(trusted) == source)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

fn data_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn resolve(configured: Option<&Path>, default_leaf: &str) -> PathBuf {
    match configured {
        Some(path) => expand_home(path),
        None => data_root().join(default_leaf),
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

fn normalize_source(source: &str) -> String {
    let trimmed = source.trim();
    let stripped = trimmed.trim_end_matches(['/', '\\']);
    let stripped = if stripped.is_empty() { trimmed } else { stripped };
    expand_home(Path::new(stripped))
        .to_string_lossy()
        .into_owned()
}
