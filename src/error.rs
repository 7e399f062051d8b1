/*============================================================
  Synavera Project: Syn-Pack
  Module: synpack_core::error
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Centralise Syn-Pack-Core error types so record validation,
    downloads, and registry persistence share one taxonomy.

  Security / Safety Notes:
    Messages name offending fields and paths only; package
    contents and feed credentials are never echoed.

  Dependencies:
    thiserror for ergonomic error definitions.

  Operational Scope:
    Used across modules to propagate recoverable failures and
    consolidate exit codes for the binary entry point.

  Revision History:
    2025-11-02 COD  Split download failures into their own
                    variants; added InvalidArgument.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit error taxonomy with actionable context
    - No silent failure paths
    - Stable exit codes for operational tooling
============================================================*/

use std::io;
use std::process::ExitCode;

use thiserror::Error;

/// Result alias for Syn-Pack-Core operations.
pub type Result<T> = std::result::Result<T, SynpackError>;

/// Enumerates high-level error domains surfaced by Syn-Pack-Core.
#[derive(Debug, Error)]
pub enum SynpackError {
    #[error("Invalid argument `{field}`: {reason}")]
    InvalidArgument { field: &'static str, reason: String },
    #[error("Package `{identifier}` not found in any configured source")]
    PackageNotFound { identifier: String },
    #[error("Version `{version}` of package `{identifier}` not found")]
    VersionNotFound { identifier: String, version: String },
    #[error("Package `{identifier}` from `{source_location}` is not trusted")]
    Untrusted {
        identifier: String,
        source_location: String,
    },
    #[error("Refusing to overwrite existing file {path} (use --force)")]
    FileConflict { path: String },
    #[error("Download of `{identifier}` was cancelled")]
    Cancelled { identifier: String },
    #[error("Configuration: {0}")]
    Config(String),
    #[error("Network: {0}")]
    Network(String),
    #[error("Serialization: {0}")]
    Serialization(String),
    #[error("Filesystem: {0}")]
    Filesystem(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SynpackError {
    /// Shorthand for a blank or otherwise unusable argument.
    pub fn invalid_argument(field: &'static str, reason: impl Into<String>) -> Self {
        SynpackError::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }

    /// Whether the failure happened while fetching an artifact.
    pub fn is_download_failure(&self) -> bool {
        matches!(
            self,
            SynpackError::PackageNotFound { .. }
                | SynpackError::VersionNotFound { .. }
                | SynpackError::Untrusted { .. }
                | SynpackError::FileConflict { .. }
                | SynpackError::Cancelled { .. }
                | SynpackError::Network(_)
        )
    }

    /// Map error category to a deterministic exit code.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            SynpackError::InvalidArgument { .. } => ExitCode::from(2),
            SynpackError::PackageNotFound { .. } => ExitCode::from(12),
            SynpackError::VersionNotFound { .. } => ExitCode::from(13),
            SynpackError::Untrusted { .. } => ExitCode::from(14),
            SynpackError::FileConflict { .. } => ExitCode::from(15),
            SynpackError::Cancelled { .. } => ExitCode::from(16),
            SynpackError::Config(_) => ExitCode::from(20),
            SynpackError::Network(_) => ExitCode::from(30),
            SynpackError::Serialization(_) => ExitCode::from(31),
            SynpackError::Filesystem(_) => ExitCode::from(40),
            SynpackError::Io(_) => ExitCode::from(41),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_names_field() {
        let err = SynpackError::invalid_argument("identifier", "must not be blank");
        assert_eq!(
            err.to_string(),
            "Invalid argument `identifier`: must not be blank"
        );
        assert!(!err.is_download_failure());
    }

    #[test]
    fn download_failures_are_classified() {
        let err = SynpackError::Cancelled {
            identifier: "Foo".into(),
        };
        assert!(err.is_download_failure());
        let err = SynpackError::FileConflict {
            path: "/tmp/foo".into(),
        };
        assert!(err.is_download_failure());
        assert!(!SynpackError::Config("bad".into()).is_download_failure());
    }
}
