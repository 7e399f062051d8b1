/*============================================================
  Synavera Project: Syn-Pack
  Module: synpack_core::folder_feed
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    PackageDownloader over directory feeds holding files named
    `<id>.<version>.nupkg`.

  Security / Safety Notes:
    Artifacts are staged under a `.partial` name and renamed
    only once fully written; cancelled transfers are removed.
    Trust is decided by the configured trusted feed list.

  Dependencies:
    tokio for async file I/O, semver for version ordering,
    sha2 for transfer digests.

  Operational Scope:
    Backs `synpack install` and any local package source.

  Revision History:
    2025-11-02 COD  Implemented folder feed downloader.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic source precedence
    - Atomic publication of downloaded files
    - Cancellation honoured between every chunk
============================================================*/

use std::cmp::Ordering;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use semver::Version;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::config::{expand_home, FeedsConfig};
use crate::downloader::{PackageArtifact, PackageDownloader};
use crate::error::{Result, SynpackError};
use crate::logger::Logger;

const PACKAGE_EXTENSION: &str = ".nupkg";
const PARTIAL_SUFFIX: &str = ".partial";

/// A package file discovered in a feed.
#[derive(Debug, Clone)]
struct FeedEntry {
    source: String,
    path: PathBuf,
    identifier: String,
    version: String,
}

/// Downloads packages from local directory feeds.
pub struct FolderFeedDownloader {
    feeds: FeedsConfig,
    logger: Logger,
}

impl FolderFeedDownloader {
    pub fn new(feeds: FeedsConfig, logger: Logger) -> Self {
        Self { feeds, logger }
    }

    /// Additional sources first, then configured feeds, without repeats.
    fn source_order(&self, additional_sources: &[String]) -> Vec<String> {
        let mut ordered: Vec<String> = Vec::new();
        for source in additional_sources.iter().chain(self.feeds.sources.iter()) {
            let source = source.trim();
            if !source.is_empty() && !ordered.iter().any(|known| known == source) {
                ordered.push(source.to_string());
            }
        }
        ordered
    }

    async fn scan_source(&self, source: &str, identifier: &str) -> Result<Vec<FeedEntry>> {
        let dir = expand_home(Path::new(source));
        let mut reader = match fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                self.logger.warn(
                    "FEED404",
                    format!("Package source {} does not exist; skipping", dir.display()),
                );
                return Ok(Vec::new());
            }
            Err(err) => {
                return Err(SynpackError::Filesystem(format!(
                    "Failed to read package source {}: {err}",
                    dir.display()
                )))
            }
        };

        let mut entries = Vec::new();
        while let Some(item) = reader.next_entry().await.map_err(|err| {
            SynpackError::Filesystem(format!(
                "Failed to list package source {}: {err}",
                dir.display()
            ))
        })? {
            let file_name = item.file_name().to_string_lossy().into_owned();
            if let Some((found_id, version)) = split_package_file_name(&file_name, identifier) {
                entries.push(FeedEntry {
                    source: source.to_string(),
                    path: item.path(),
                    identifier: found_id,
                    version,
                });
            }
        }
        self.logger.debug(
            "SCAN",
            format!(
                "{} candidate(s) for {identifier} in {}",
                entries.len(),
                dir.display()
            ),
        );
        Ok(entries)
    }

    async fn resolve(
        &self,
        identifier: &str,
        version: Option<&str>,
        additional_sources: &[String],
    ) -> Result<FeedEntry> {
        let mut candidates = Vec::new();
        for source in self.source_order(additional_sources) {
            candidates.extend(self.scan_source(&source, identifier).await?);
        }

        if candidates.is_empty() {
            return Err(SynpackError::PackageNotFound {
                identifier: identifier.to_string(),
            });
        }

        let chosen = match version {
            // Earliest source wins.
            Some(requested) => candidates.into_iter().find(|entry| {
                compare_versions(&entry.version, requested.trim()) == Ordering::Equal
            }),
            // Strictly greater keeps the earliest source on ties.
            None => candidates.into_iter().reduce(|best, entry| {
                if compare_versions(&entry.version, &best.version) == Ordering::Greater {
                    entry
                } else {
                    best
                }
            }),
        };

        chosen.ok_or_else(|| SynpackError::VersionNotFound {
            identifier: identifier.to_string(),
            version: version.unwrap_or_default().trim().to_string(),
        })
    }

    async fn copy_with_cancel(
        &self,
        from: &Path,
        partial: &Path,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Result<(u64, String)> {
        let mut reader = fs::File::open(from).await.map_err(|err| {
            SynpackError::Filesystem(format!("Failed to open {}: {err}", from.display()))
        })?;
        let mut writer = fs::File::create(partial).await.map_err(|err| {
            SynpackError::Filesystem(format!("Failed to create {}: {err}", partial.display()))
        })?;

        let mut buffer = vec![0u8; self.feeds.copy_buffer_kib.max(1) * 1024];
        let mut hasher = Sha256::new();
        let mut copied = 0u64;
        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(SynpackError::Cancelled { identifier: identifier.to_string() });
                }
                read = reader.read(&mut buffer) => read?,
            };
            if read == 0 {
                break;
            }
            writer.write_all(&buffer[..read]).await?;
            hasher.update(&buffer[..read]);
            copied += read as u64;
        }
        writer.flush().await?;
        writer.sync_all().await?;
        Ok((copied, format!("{:x}", hasher.finalize())))
    }
}

#[async_trait]
impl PackageDownloader for FolderFeedDownloader {
    async fn download_package(
        &self,
        target_path: &Path,
        identifier: &str,
        version: Option<&str>,
        additional_sources: &[String],
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<PackageArtifact> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(SynpackError::invalid_argument(
                "identifier",
                "must not be blank",
            ));
        }
        if cancel.is_cancelled() {
            return Err(SynpackError::Cancelled {
                identifier: identifier.to_string(),
            });
        }

        let entry = self.resolve(identifier, version, additional_sources).await?;
        let trusted = self.feeds.is_trusted_source(&entry.source);
        if self.feeds.require_trusted && !trusted {
            return Err(SynpackError::Untrusted {
                identifier: entry.identifier,
                source_location: entry.source,
            });
        }

        let file_name = format!("{}.{}{PACKAGE_EXTENSION}", entry.identifier, entry.version);
        let destination = target_path.join(&file_name);
        if !force && fs::try_exists(&destination).await? {
            return Err(SynpackError::FileConflict {
                path: destination.display().to_string(),
            });
        }

        fs::create_dir_all(target_path).await.map_err(|err| {
            SynpackError::Filesystem(format!(
                "Failed to create package directory {}: {err}",
                target_path.display()
            ))
        })?;

        let partial = target_path.join(format!("{file_name}{PARTIAL_SUFFIX}"));
        let (bytes, digest) = match self
            .copy_with_cancel(&entry.path, &partial, identifier, cancel)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                let _ = fs::remove_file(&partial).await;
                if matches!(err, SynpackError::Cancelled { .. }) {
                    self.logger
                        .warn("CANCEL", format!("Download of {identifier} cancelled"));
                }
                return Err(err);
            }
        };

        let staged = PackageArtifact::new(entry.identifier, entry.version, partial, entry.source)
            .with_trusted(trusted);

        if force && fs::try_exists(&destination).await? {
            fs::remove_file(&destination).await?;
        }
        fs::rename(staged.full_path(), &destination)
            .await
            .map_err(|err| {
                SynpackError::Filesystem(format!(
                    "Failed to move {} into place: {err}",
                    destination.display()
                ))
            })?;

        self.logger.info(
            "FETCH",
            format!(
                "{}::{} from {} ({bytes} bytes, sha256 {digest})",
                staged.identifier(),
                staged.version(),
                staged.source()
            ),
        );

        Ok(staged.with_full_path(destination))
    }
}

/// Split `<id>.<version>.nupkg` when `<id>` matches `identifier`
/// case-insensitively. Returns the id as spelled in the file name.
fn split_package_file_name(file_name: &str, identifier: &str) -> Option<(String, String)> {
    let lower = file_name.to_ascii_lowercase();
    if !lower.ends_with(PACKAGE_EXTENSION) {
        return None;
    }
    let stem = &file_name[..file_name.len() - PACKAGE_EXTENSION.len()];
    if stem.len() <= identifier.len() + 1 || !stem.is_char_boundary(identifier.len()) {
        return None;
    }
    let (found_id, rest) = stem.split_at(identifier.len());
    if !found_id.eq_ignore_ascii_case(identifier) || !rest.starts_with('.') {
        return None;
    }
    let version = &rest[1..];
    if !version.starts_with(|ch: char| ch.is_ascii_digit()) {
        return None;
    }
    Some((found_id.to_string(), version.to_string()))
}

/// Order two package versions. Semantic versions sort above anything that
/// does not parse; unparseable versions compare lexically.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    match (parse_version(left), parse_version(right)) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => left.cmp(right),
    }
}

/// Parse a package version, padding `1` and `1.2` to three components.
fn parse_version(raw: &str) -> Option<Version> {
    let raw = raw.trim();
    if let Ok(version) = Version::parse(raw) {
        return Some(version);
    }
    let split = raw.find(['-', '+']).unwrap_or(raw.len());
    let (core, suffix) = raw.split_at(split);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() >= 3 || parts.iter().any(|part| part.is_empty()) {
        return None;
    }
    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);
    Version::parse(&padded).ok()
}
