/*============================================================
  Synavera Project: Syn-Pack
  Module: synpack_core::managed_package
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Typed record for one installed template package and its
    conversion to and from the persisted string map.

  Security / Safety Notes:
    Identity fields are validated at construction; a record
    with a blank identifier or mount point cannot exist.

  Dependencies:
    chrono for change timestamps.

  Operational Scope:
    Built by the installer after a download and rebuilt from
    registry entries on every later invocation.

  Revision History:
    2025-11-02 COD  Replaced property bag with explicit fields.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Clear data contracts between modules
    - Minimal persisted state (blank values are never stored)
    - Best-effort metadata never aborts a caller
============================================================*/

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::downloader::PackageArtifact;
use crate::environment::Environment;
use crate::error::{Result, SynpackError};

/// Persisted form of a package record: well-known key to value.
pub type PackageDetails = BTreeMap<String, String>;

/// Well-known keys of the persisted details map.
pub mod keys {
    pub const PACKAGE_ID: &str = "PackageId";
    pub const VERSION: &str = "Version";
    pub const AUTHOR: &str = "Author";
    pub const OWNERS: &str = "Owners";
    pub const TRUSTED: &str = "Trusted";
    pub const SOURCE: &str = "NuGetSource";
    pub const LOCAL_PACKAGE: &str = "LocalPackage";
}

/// Opaque identity of the installer or provider that owns a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentRef(String);

impl ComponentRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a mount point timestamp lookup.
///
/// `Unknown` is the default and reports the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LastChangeTime {
    Known(DateTime<Utc>),
    #[default]
    Unknown,
}

impl LastChangeTime {
    pub fn timestamp(self) -> DateTime<Utc> {
        match self {
            LastChangeTime::Known(stamp) => stamp,
            LastChangeTime::Unknown => DateTime::<Utc>::default(),
        }
    }

    pub fn is_known(self) -> bool {
        matches!(self, LastChangeTime::Known(_))
    }
}

/// A template package installed and tracked by Syn-Pack.
#[derive(Clone)]
pub struct ManagedPackage {
    environment: Arc<Environment>,
    installer: ComponentRef,
    provider: ComponentRef,
    mount_point_uri: String,
    identifier: String,
    version: Option<String>,
    author: Option<String>,
    owners: Option<String>,
    trusted: Option<bool>,
    source: Option<String>,
    is_local_package: bool,
}

impl ManagedPackage {
    /// Create a fresh record holding only its identity.
    pub fn new(
        environment: Arc<Environment>,
        installer: ComponentRef,
        provider: ComponentRef,
        mount_point_uri: &str,
        identifier: &str,
    ) -> Result<Self> {
        validate_owner(&installer, &provider)?;
        let mount_point_uri = require_non_blank("mount_point_uri", mount_point_uri)?;
        let identifier = require_non_blank("identifier", identifier)?;

        Ok(Self {
            environment,
            installer,
            provider,
            mount_point_uri,
            identifier,
            version: None,
            author: None,
            owners: None,
            trusted: None,
            source: None,
            is_local_package: false,
        })
    }

    /// Rebuild a record from a persisted details map.
    ///
    /// Values are copied out of `details`; unknown keys are ignored.
    pub fn from_details(
        environment: Arc<Environment>,
        installer: ComponentRef,
        provider: ComponentRef,
        mount_point_uri: &str,
        details: &PackageDetails,
    ) -> Result<Self> {
        validate_owner(&installer, &provider)?;
        let mount_point_uri = require_non_blank("mount_point_uri", mount_point_uri)?;
        let identifier = match details.get(keys::PACKAGE_ID) {
            Some(value) => require_non_blank(keys::PACKAGE_ID, value)?,
            None => {
                return Err(SynpackError::invalid_argument(
                    keys::PACKAGE_ID,
                    "missing from package details",
                ))
            }
        };

        let text = |key: &str| details.get(key).and_then(|value| non_blank(value));
        let flag = |key: &str| {
            text(key).map(|value| {
                let trimmed = value.trim();
                let known = ["true", "false"]
                    .iter()
                    .any(|word| trimmed.eq_ignore_ascii_case(word));
                if !known {
                    environment.logger("package").debug(
                        "FLAG",
                        format!("{identifier}: {key}={value:?} is not a flag; reading false"),
                    );
                }
                parse_flag(&value)
            })
        };
        let trusted = flag(keys::TRUSTED);
        let is_local_package = flag(keys::LOCAL_PACKAGE).unwrap_or(false);

        Ok(Self {
            environment,
            installer,
            provider,
            mount_point_uri,
            identifier,
            version: text(keys::VERSION),
            author: text(keys::AUTHOR),
            owners: text(keys::OWNERS),
            trusted,
            source: text(keys::SOURCE),
            is_local_package,
        })
    }

    /// Create a record for a freshly downloaded artifact, mounted at its
    /// local path.
    pub fn from_artifact(
        environment: Arc<Environment>,
        installer: ComponentRef,
        provider: ComponentRef,
        artifact: &PackageArtifact,
    ) -> Result<Self> {
        let mount_point_uri = artifact.full_path().to_string_lossy().into_owned();
        let mut package = Self::new(
            environment,
            installer,
            provider,
            &mount_point_uri,
            artifact.identifier(),
        )?;
        package.apply_artifact(artifact);
        Ok(package)
    }

    /// Optional attributes exported for persistence: author, owners,
    /// trusted and source, when set.
    ///
    /// Identifier, version and the local flag are not part of this export.
    pub fn details(&self) -> PackageDetails {
        let mut details = PackageDetails::new();
        if let Some(author) = &self.author {
            details.insert(keys::AUTHOR.to_string(), author.clone());
        }
        if let Some(owners) = &self.owners {
            details.insert(keys::OWNERS.to_string(), owners.clone());
        }
        if let Some(trusted) = self.trusted {
            details.insert(keys::TRUSTED.to_string(), flag_value(trusted).to_string());
        }
        if let Some(source) = &self.source {
            details.insert(keys::SOURCE.to_string(), source.clone());
        }
        details
    }

    /// Every set attribute, including identity, as accepted by
    /// [`ManagedPackage::from_details`].
    pub fn to_persisted(&self) -> PackageDetails {
        let mut details = self.details();
        details.insert(keys::PACKAGE_ID.to_string(), self.identifier.clone());
        if let Some(version) = &self.version {
            details.insert(keys::VERSION.to_string(), version.clone());
        }
        if self.is_local_package {
            details.insert(keys::LOCAL_PACKAGE.to_string(), flag_value(true).to_string());
        }
        details
    }

    /// Refresh mutable attributes from a download result.
    pub fn apply_artifact(&mut self, artifact: &PackageArtifact) {
        self.set_version(artifact.version());
        self.set_author(artifact.author().unwrap_or_default());
        self.set_owners(artifact.owners().unwrap_or_default());
        self.set_trusted(artifact.trusted());
        self.set_source(artifact.source());
    }

    /// Modification time of the mount point, or `Unknown` when it cannot
    /// be read.
    pub fn last_change_time(&self) -> LastChangeTime {
        match self
            .environment
            .file_system()
            .last_write_time_utc(&self.mount_point_uri)
        {
            Ok(stamp) => LastChangeTime::Known(stamp),
            Err(err) => {
                self.environment.logger("package").debug(
                    "MTIME",
                    format!(
                        "Failed to read last change time of {}: {err}",
                        self.mount_point_uri
                    ),
                );
                LastChangeTime::Unknown
            }
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// `identifier`, or `identifier::version` when a version is set.
    pub fn display_name(&self) -> String {
        match &self.version {
            Some(version) => format!("{}::{}", self.identifier, version),
            None => self.identifier.clone(),
        }
    }

    pub fn mount_point_uri(&self) -> &str {
        &self.mount_point_uri
    }

    pub fn installer(&self) -> &ComponentRef {
        &self.installer
    }

    pub fn provider(&self) -> &ComponentRef {
        &self.provider
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Set the version; a blank value clears it.
    pub fn set_version(&mut self, value: &str) {
        self.version = non_blank(value);
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Set the author; a blank value clears it.
    pub fn set_author(&mut self, value: &str) {
        self.author = non_blank(value);
    }

    pub fn owners(&self) -> Option<&str> {
        self.owners.as_deref()
    }

    /// Set the owners; a blank value clears it.
    pub fn set_owners(&mut self, value: &str) {
        self.owners = non_blank(value);
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Set the originating source; a blank value clears it.
    pub fn set_source(&mut self, value: &str) {
        self.source = non_blank(value);
    }

    pub fn trusted(&self) -> bool {
        self.trusted.unwrap_or(false)
    }

    /// Trust flag in its persisted form, `"false"` when unset.
    pub fn trusted_value(&self) -> &'static str {
        flag_value(self.trusted())
    }

    pub fn set_trusted(&mut self, value: bool) {
        self.trusted = Some(value);
    }

    /// Set the trust flag from text. Blank clears it; otherwise the value
    /// must be `true` or `false` (any case).
    pub fn set_trusted_value(&mut self, value: &str) -> Result<()> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.trusted = None;
        } else if trimmed.eq_ignore_ascii_case("true") {
            self.trusted = Some(true);
        } else if trimmed.eq_ignore_ascii_case("false") {
            self.trusted = Some(false);
        } else {
            return Err(SynpackError::invalid_argument(
                "trusted",
                format!("expected `true` or `false`, got `{trimmed}`"),
            ));
        }
        Ok(())
    }

    pub fn is_local_package(&self) -> bool {
        self.is_local_package
    }

    pub fn set_is_local_package(&mut self, value: bool) {
        self.is_local_package = value;
    }
}

impl fmt::Debug for ManagedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedPackage")
            .field("installer", &self.installer)
            .field("provider", &self.provider)
            .field("mount_point_uri", &self.mount_point_uri)
            .field("identifier", &self.identifier)
            .field("version", &self.version)
            .field("author", &self.author)
            .field("owners", &self.owners)
            .field("trusted", &self.trusted)
            .field("source", &self.source)
            .field("is_local_package", &self.is_local_package)
            .finish_non_exhaustive()
    }
}

fn validate_owner(installer: &ComponentRef, provider: &ComponentRef) -> Result<()> {
    require_non_blank("installer", installer.id())?;
    require_non_blank("provider", provider.id())?;
    Ok(())
}

fn require_non_blank(field: &'static str, value: &str) -> Result<String> {
    non_blank(value).ok_or_else(|| SynpackError::invalid_argument(field, "must not be blank"))
}

fn non_blank(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn flag_value(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::FileSystem;
    use crate::logger::Logger;
    use chrono::TimeZone;
    use std::io;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct FixedFileSystem(DateTime<Utc>);

    impl FileSystem for FixedFileSystem {
        fn last_write_time_utc(&self, _uri: &str) -> io::Result<DateTime<Utc>> {
            Ok(self.0)
        }
    }

    struct BrokenFileSystem;

    impl FileSystem for BrokenFileSystem {
        fn last_write_time_utc(&self, uri: &str) -> io::Result<DateTime<Utc>> {
            Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("cannot stat {uri}"),
            ))
        }
    }

    fn environment_with(file_system: Arc<dyn FileSystem>) -> Arc<Environment> {
        let logger = Logger::new(None, false).unwrap();
        Arc::new(Environment::new(logger, file_system))
    }

    fn environment() -> Arc<Environment> {
        environment_with(Arc::new(BrokenFileSystem))
    }

    fn installer() -> ComponentRef {
        ComponentRef::new("folder-installer")
    }

    fn provider() -> ComponentRef {
        ComponentRef::new("global-settings")
    }

    fn package(identifier: &str) -> ManagedPackage {
        ManagedPackage::new(
            environment(),
            installer(),
            provider(),
            "/packages/foo.nupkg",
            identifier,
        )
        .unwrap()
    }

    fn details(pairs: &[(&str, &str)]) -> PackageDetails {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn fresh_record_exports_no_details() {
        let package = package("Foo.Templates");
        assert_eq!(package.identifier(), "Foo.Templates");
        assert_eq!(package.mount_point_uri(), "/packages/foo.nupkg");
        assert!(package.details().is_empty());
        assert_eq!(package.installer().id(), "folder-installer");
        assert_eq!(package.provider().id(), "global-settings");
    }

    #[test]
    fn blank_identity_is_rejected() {
        for identifier in ["", "   ", "\t"] {
            let err = ManagedPackage::new(
                environment(),
                installer(),
                provider(),
                "/packages/foo.nupkg",
                identifier,
            )
            .unwrap_err();
            assert!(matches!(
                err,
                SynpackError::InvalidArgument {
                    field: "identifier",
                    ..
                }
            ));
        }

        let err = ManagedPackage::new(environment(), installer(), provider(), " ", "Foo")
            .unwrap_err();
        assert!(matches!(
            err,
            SynpackError::InvalidArgument {
                field: "mount_point_uri",
                ..
            }
        ));
    }

    #[test]
    fn blank_owner_refs_are_rejected() {
        let err = ManagedPackage::new(
            environment(),
            ComponentRef::new(""),
            provider(),
            "/packages/foo.nupkg",
            "Foo",
        )
        .unwrap_err();
        assert!(err.to_string().contains("installer"));

        let err = ManagedPackage::new(
            environment(),
            installer(),
            ComponentRef::new(" "),
            "/packages/foo.nupkg",
            "Foo",
        )
        .unwrap_err();
        assert!(err.to_string().contains("provider"));
    }

    #[test]
    fn from_details_requires_package_id() {
        let missing = details(&[(keys::VERSION, "1.0.0")]);
        let err = ManagedPackage::from_details(
            environment(),
            installer(),
            provider(),
            "/packages/foo.nupkg",
            &missing,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SynpackError::InvalidArgument {
                field: keys::PACKAGE_ID,
                ..
            }
        ));

        let blank = details(&[(keys::PACKAGE_ID, "  ")]);
        let err = ManagedPackage::from_details(
            environment(),
            installer(),
            provider(),
            "/packages/foo.nupkg",
            &blank,
        )
        .unwrap_err();
        assert!(err.to_string().contains("PackageId"));

        let ok = details(&[(keys::PACKAGE_ID, "Foo")]);
        let err = ManagedPackage::from_details(environment(), installer(), provider(), "", &ok)
            .unwrap_err();
        assert!(err.to_string().contains("mount_point_uri"));
    }

    #[test]
    fn from_details_reads_known_keys() {
        let persisted = details(&[
            (keys::PACKAGE_ID, "Foo"),
            (keys::VERSION, "1.2.3"),
            (keys::AUTHOR, "Jane"),
            (keys::OWNERS, "jane,joe"),
            (keys::TRUSTED, "True"),
            (keys::SOURCE, "/feeds/local"),
            (keys::LOCAL_PACKAGE, "true"),
            ("Unrelated", "ignored"),
        ]);
        let package = ManagedPackage::from_details(
            environment(),
            installer(),
            provider(),
            "/packages/foo.nupkg",
            &persisted,
        )
        .unwrap();

        assert_eq!(package.identifier(), "Foo");
        assert_eq!(package.version(), Some("1.2.3"));
        assert_eq!(package.author(), Some("Jane"));
        assert_eq!(package.owners(), Some("jane,joe"));
        assert!(package.trusted());
        assert_eq!(package.source(), Some("/feeds/local"));
        assert!(package.is_local_package());

        let exported = package.details();
        assert_eq!(
            exported,
            details(&[
                (keys::AUTHOR, "Jane"),
                (keys::OWNERS, "jane,joe"),
                (keys::TRUSTED, "true"),
                (keys::SOURCE, "/feeds/local"),
            ])
        );

        let full = package.to_persisted();
        assert_eq!(full.get(keys::PACKAGE_ID).map(String::as_str), Some("Foo"));
        assert_eq!(full.get(keys::VERSION).map(String::as_str), Some("1.2.3"));
        assert_eq!(
            full.get(keys::LOCAL_PACKAGE).map(String::as_str),
            Some("true")
        );
        assert!(!full.contains_key("Unrelated"));
    }

    #[test]
    fn unrecognised_persisted_flag_reads_false_and_logs() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("core.log");
        let logger = Logger::new(Some(log_path.clone()), false).unwrap();
        let environment = Arc::new(Environment::new(logger, Arc::new(BrokenFileSystem)));
        let persisted = details(&[
            (keys::PACKAGE_ID, "Foo"),
            (keys::TRUSTED, "yes"),
            (keys::LOCAL_PACKAGE, "FALSE"),
        ]);
        let package = ManagedPackage::from_details(
            environment,
            installer(),
            provider(),
            "/packages/foo.nupkg",
            &persisted,
        )
        .unwrap();

        assert!(!package.trusted());
        assert_eq!(package.trusted_value(), "false");
        assert!(!package.is_local_package());

        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("[DEBUG] [package:FLAG]"));
        assert!(log.contains("Trusted=\"yes\""));
        assert!(!log.contains("LocalPackage"));
    }

    #[test]
    fn caller_map_mutation_does_not_leak_into_record() {
        let mut persisted = details(&[(keys::PACKAGE_ID, "Foo"), (keys::AUTHOR, "Jane")]);
        let package = ManagedPackage::from_details(
            environment(),
            installer(),
            provider(),
            "/packages/foo.nupkg",
            &persisted,
        )
        .unwrap();

        persisted.insert(keys::PACKAGE_ID.to_string(), "Bar".to_string());
        persisted.insert(keys::AUTHOR.to_string(), "Mallory".to_string());
        persisted.insert(keys::VERSION.to_string(), "9.9.9".to_string());

        assert_eq!(package.identifier(), "Foo");
        assert_eq!(package.author(), Some("Jane"));
        assert_eq!(package.version(), None);
    }

    #[test]
    fn blank_trusted_clears_and_reads_false() {
        let mut package = package("Foo");
        package.set_trusted_value("TRUE").unwrap();
        assert!(package.trusted());
        assert_eq!(package.details().get(keys::TRUSTED).unwrap(), "true");

        package.set_trusted_value("   ").unwrap();
        assert_eq!(package.trusted_value(), "false");
        assert!(!package.details().contains_key(keys::TRUSTED));
    }

    #[test]
    fn unparseable_trusted_value_is_rejected() {
        let mut package = package("Foo");
        package.set_trusted(true);
        let err = package.set_trusted_value("maybe").unwrap_err();
        assert!(matches!(
            err,
            SynpackError::InvalidArgument {
                field: "trusted",
                ..
            }
        ));
        assert!(package.trusted());
    }

    #[test]
    fn cleared_author_is_omitted_from_details() {
        let mut package = package("Foo");
        package.set_author("Jane");
        assert_eq!(package.details().get(keys::AUTHOR).unwrap(), "Jane");

        package.set_author("");
        assert_eq!(package.author(), None);
        assert!(!package.details().contains_key(keys::AUTHOR));
    }

    #[test]
    fn display_name_includes_version_when_set() {
        let mut package = package("Foo");
        assert_eq!(package.display_name(), "Foo");

        package.set_version("1.2.3");
        assert_eq!(package.display_name(), "Foo::1.2.3");

        package.set_version(" ");
        assert_eq!(package.display_name(), "Foo");
    }

    #[test]
    fn details_never_export_identity_or_local_flag() {
        let mut package = package("Foo");
        package.set_version("2.0.0");
        package.set_is_local_package(true);
        assert!(package.details().is_empty());
    }

    #[test]
    fn apply_artifact_refreshes_attributes() {
        let mut package = package("Foo");
        package.set_author("Old Author");
        let artifact = PackageArtifact::new(
            "Foo",
            "3.1.0",
            PathBuf::from("/packages/Foo.3.1.0.nupkg"),
            "/feeds/main",
        )
        .with_owners("team")
        .with_trusted(true);

        package.apply_artifact(&artifact);
        assert_eq!(package.version(), Some("3.1.0"));
        assert_eq!(package.author(), None);
        assert_eq!(package.owners(), Some("team"));
        assert!(package.trusted());
        assert_eq!(package.source(), Some("/feeds/main"));
    }

    #[test]
    fn from_artifact_mounts_at_artifact_path() {
        let artifact = PackageArtifact::new(
            "Foo",
            "1.0.0",
            PathBuf::from("/packages/Foo.1.0.0.nupkg"),
            "/feeds/main",
        )
        .with_author("Jane");
        let package =
            ManagedPackage::from_artifact(environment(), installer(), provider(), &artifact)
                .unwrap();
        assert_eq!(package.mount_point_uri(), "/packages/Foo.1.0.0.nupkg");
        assert_eq!(package.display_name(), "Foo::1.0.0");
        assert_eq!(package.author(), Some("Jane"));
    }

    #[test]
    fn last_change_time_uses_file_system() {
        let stamp = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        let package = ManagedPackage::new(
            environment_with(Arc::new(FixedFileSystem(stamp))),
            installer(),
            provider(),
            "/packages/foo.nupkg",
            "Foo",
        )
        .unwrap();
        assert_eq!(package.last_change_time(), LastChangeTime::Known(stamp));
    }

    #[test]
    fn last_change_time_failure_falls_back_to_epoch_and_logs() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("core.log");
        let logger = Logger::new(Some(log_path.clone()), false).unwrap();
        let environment = Arc::new(Environment::new(logger, Arc::new(BrokenFileSystem)));
        let package = ManagedPackage::new(
            environment,
            installer(),
            provider(),
            "/packages/foo.nupkg",
            "Foo",
        )
        .unwrap();

        let change = package.last_change_time();
        assert_eq!(change, LastChangeTime::Unknown);
        assert!(!change.is_known());
        assert_eq!(change.timestamp().timestamp(), 0);

        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("[DEBUG] [package:MTIME]"));
        assert!(log.contains("/packages/foo.nupkg"));
    }
}
