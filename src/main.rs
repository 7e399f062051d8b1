/*============================================================
  Synavera Project: Syn-Pack
  Module: synpack_core::main
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Entry point for Syn-Pack Core. Installs template packages
    from folder feeds, tracks them in the registry, and reports
    or removes installed packages.

  Security / Safety Notes:
    Operates within user privileges. Reads feed directories and
    writes only to the configured packages and registry paths.

  Dependencies:
    clap for CLI parsing, chrono for timestamps, tokio-util for
    Ctrl-C cancellation of downloads.

  Operational Scope:
    Invoked by operators or provisioning scripts via `synpack`.

  Revision History:
    2025-11-02 COD  Authored Syn-Pack Core runtime.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Result-first error handling with deterministic exits
    - Structured logging following Synavera cadence
    - Configurable execution via CLI and config file
============================================================*/

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use clap::{ArgAction, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use synpack_core::config::SynpackConfig;
use synpack_core::folder_feed::FolderFeedDownloader;
use synpack_core::logger::Logger;
use synpack_core::registry::PackageRegistry;
use synpack_core::{
    ComponentRef, Environment, ManagedPackage, PackageDownloader, Result, SynpackError,
};

const INSTALLER_ID: &str = "folder-feed-installer";
const PROVIDER_ID: &str = "global-settings";

/// Command-line arguments for Syn-Pack-Core.
#[derive(Debug, Parser)]
#[command(
    name = "Syn-Pack-Core",
    version,
    author = "Synavera Systems",
    about = "Template package installer for Syn-Pack"
)]
struct Cli {
    /// Override configuration file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Explicit log file path.
    #[arg(long, global = true, value_name = "PATH")]
    log: Option<PathBuf>,
    /// Enable verbose logging to stderr.
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download a package and record it as installed.
    Install {
        /// Package identifier.
        identifier: String,
        /// Exact version; latest when omitted.
        #[arg(long, value_name = "VERSION")]
        version: Option<String>,
        /// Extra feed searched before the configured ones.
        #[arg(long = "source", value_name = "DIR", action = ArgAction::Append)]
        sources: Vec<String>,
        /// Overwrite an existing package file.
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
    /// List installed packages.
    List,
    /// Print the stored details of one package.
    Show { identifier: String },
    /// Set or clear the trust flag (`true`, `false`, or "" to clear).
    Trust { identifier: String, value: String },
    /// Uninstall a package.
    Remove { identifier: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("[Syn-Pack] {}", err);
            if err.is_download_failure() {
                eprintln!("[Syn-Pack] No package was installed.");
            }
            err.exit_code()
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = SynpackConfig::load_from_optional_path(cli.config.as_deref())?;

    let session_stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let log_path = cli
        .log
        .clone()
        .unwrap_or_else(|| config.log_dir().join(format!("core_{session_stamp}.log")));
    let logger = Logger::new(Some(log_path), cli.verbose)?;
    logger.info("INIT", "Syn-Pack Core awakening.");

    let environment = Arc::new(Environment::physical(logger.clone()));
    let mut registry =
        PackageRegistry::load(&config.registry_path(), environment.logger("registry"))?;

    match cli.command {
        Command::Install {
            identifier,
            version,
            sources,
            force,
        } => {
            let request = InstallRequest {
                identifier: &identifier,
                version: version.as_deref(),
                sources: &sources,
                force,
            };
            install(&config, &environment, &mut registry, request).await?;
        }
        Command::List => list(&environment, &registry)?,
        Command::Show { identifier } => show(&environment, &registry, &identifier)?,
        Command::Trust { identifier, value } => {
            trust(&environment, &mut registry, &identifier, &value)?
        }
        Command::Remove { identifier } => remove(&environment, &mut registry, &identifier)?,
    }

    logger.info("COMPLETE", "Packages synchronised.");
    logger.finalize()?;
    Ok(ExitCode::SUCCESS)
}

struct InstallRequest<'a> {
    identifier: &'a str,
    version: Option<&'a str>,
    sources: &'a [String],
    force: bool,
}

async fn install(
    config: &SynpackConfig,
    environment: &Arc<Environment>,
    registry: &mut PackageRegistry,
    request: InstallRequest<'_>,
) -> Result<()> {
    let logger = environment.logger("install");
    let downloader = FolderFeedDownloader::new(config.feeds.clone(), environment.logger("feed"));
    let previous = registry.package(environment, request.identifier)?;

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };
    let fetched = downloader
        .download_package(
            &config.packages_dir(),
            request.identifier,
            request.version,
            request.sources,
            request.force,
            &cancel,
        )
        .await;
    watcher.abort();
    if let Err(err) = &fetched {
        logger.error("FETCH", format!("{}: {err}", request.identifier));
    }
    let artifact = fetched?;

    let mut package = match previous {
        Some(mut existing)
            if Path::new(existing.mount_point_uri()) == artifact.full_path() =>
        {
            existing.apply_artifact(&artifact);
            existing
        }
        other => {
            if let Some(stale) = other {
                discard_file(&logger, Path::new(stale.mount_point_uri()));
            }
            ManagedPackage::from_artifact(
                Arc::clone(environment),
                ComponentRef::new(INSTALLER_ID),
                ComponentRef::new(PROVIDER_ID),
                &artifact,
            )?
        }
    };
    package.set_is_local_package(true);

    registry.upsert(&package);
    registry.save()?;
    logger.info(
        "INSTALLED",
        format!(
            "{} (trusted={}) at {}",
            package.display_name(),
            package.trusted_value(),
            package.mount_point_uri()
        ),
    );
    println!("→ Installed {}", package.display_name());
    Ok(())
}

fn list(environment: &Arc<Environment>, registry: &PackageRegistry) -> Result<()> {
    let packages = registry.packages(environment)?;
    if packages.is_empty() {
        println!("→ No packages installed.");
        return Ok(());
    }
    for package in packages {
        let change = package.last_change_time();
        let changed = if change.is_known() {
            change
                .timestamp()
                .to_rfc3339_opts(SecondsFormat::Secs, true)
        } else {
            "unknown".to_string()
        };
        println!(
            "{}  trusted={}  source={}  changed={}",
            package.display_name(),
            package.trusted_value(),
            package.source().unwrap_or("-"),
            changed
        );
    }
    Ok(())
}

fn show(
    environment: &Arc<Environment>,
    registry: &PackageRegistry,
    identifier: &str,
) -> Result<()> {
    let package = registry
        .package(environment, identifier)?
        .ok_or_else(|| SynpackError::PackageNotFound {
            identifier: identifier.to_string(),
        })?;
    println!("{}", package.display_name());
    println!("  MountPoint: {}", package.mount_point_uri());
    println!("  Installer: {}", package.installer());
    println!("  Provider: {}", package.provider());
    for (key, value) in package.to_persisted() {
        println!("  {key}: {value}");
    }
    Ok(())
}

fn trust(
    environment: &Arc<Environment>,
    registry: &mut PackageRegistry,
    identifier: &str,
    value: &str,
) -> Result<()> {
    let mut package = registry
        .package(environment, identifier)?
        .ok_or_else(|| SynpackError::PackageNotFound {
            identifier: identifier.to_string(),
        })?;
    package.set_trusted_value(value)?;
    registry.upsert(&package);
    registry.save()?;
    environment.logger("trust").info(
        "TRUST",
        format!("{} trusted={}", package.display_name(), package.trusted_value()),
    );
    println!("→ {} trusted={}", package.display_name(), package.trusted_value());
    Ok(())
}

fn remove(
    environment: &Arc<Environment>,
    registry: &mut PackageRegistry,
    identifier: &str,
) -> Result<()> {
    let logger = environment.logger("remove");
    let entry = registry
        .remove(identifier)
        .ok_or_else(|| SynpackError::PackageNotFound {
            identifier: identifier.to_string(),
        })?;
    discard_file(&logger, Path::new(&entry.mount_point_uri));
    registry.save()?;
    logger.info("REMOVED", format!("{identifier} uninstalled"));
    println!("→ Removed {identifier}");
    Ok(())
}

fn discard_file(logger: &Logger, path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => logger.debug("DISCARD", format!("Deleted {}", path.display())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => logger.warn(
            "DISCARD",
            format!("Failed to delete {}: {err}", path.display()),
        ),
    }
}
