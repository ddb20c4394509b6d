//! Error types emitted by the Periplus CLI.

use std::sync::Arc;

use camino::Utf8PathBuf;
use periplus_data::{ApiBuildError, CacheError, StoreError};
use thiserror::Error;

/// Errors emitted by the Periplus CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name without leading dashes.
        field: &'static str,
        /// Environment variable carrying the same setting.
        env: &'static str,
    },
    /// The requested operation requires a missing compile-time feature.
    #[error("{action} requires the `{feature}` feature to be enabled")]
    MissingFeature {
        /// Cargo feature name.
        feature: &'static str,
        /// Operation that needed it.
        action: &'static str,
    },
    /// A referenced cache database does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingCacheFile {
        /// Flag naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A referenced cache path exists but is not a regular file.
    #[error("{field} path {path:?} is not a file")]
    CachePathNotFile {
        /// Flag naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// Inspecting a cache path failed for reasons other than absence.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectCachePath {
        /// Flag naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Building the async runtime failed.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// Constructing the dataset API client failed.
    #[error("failed to build dataset API client for {base_url:?}: {source}")]
    BuildApi {
        /// Base URL as configured.
        base_url: String,
        /// Construction failure.
        #[source]
        source: ApiBuildError,
    },
    /// Opening or writing the local cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// Bootstrapping the store failed.
    #[error("failed to bootstrap site data: {0}")]
    Store(#[from] StoreError),
    /// Serialising the sync summary failed.
    #[error("failed to serialise sync summary: {0}")]
    SerialiseSummary(#[source] serde_json::Error),
    /// Writing the sync output failed.
    #[error("failed to write sync output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
