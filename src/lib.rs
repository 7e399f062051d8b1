/*============================================================
  Synavera Project: Syn-Pack
  Module: synpack_core
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Library surface of Syn-Pack Core: managed package records,
    the downloader contract, folder feeds, and the registry.

  Security / Safety Notes:
    See individual modules.

  Dependencies:
    See Cargo.toml.

  Operational Scope:
    Linked by the `synpack` binary and by provisioning tools
    embedding the package record types.

  Revision History:
    2025-11-02 COD  Split library from the binary entry point.
============================================================*/

pub mod config;
pub mod downloader;
pub mod environment;
pub mod error;
pub mod folder_feed;
pub mod logger;
pub mod managed_package;
pub mod registry;

pub use downloader::{PackageArtifact, PackageDownloader};
pub use environment::{Environment, FileSystem, PhysicalFileSystem};
pub use error::{Result, SynpackError};
pub use managed_package::{ComponentRef, LastChangeTime, ManagedPackage, PackageDetails};
