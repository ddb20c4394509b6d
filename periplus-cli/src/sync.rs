//! Sync command implementation for the Periplus CLI.

use std::{collections::BTreeMap, io::Write, sync::Arc};

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::{info, warn};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use periplus_core::LoadState;
use periplus_data::{
    CooperativeYield, DEFAULT_SITE_LIMIT, DEFAULT_SOURCE_ID, DataOrigin, DataStore, DatasetApi,
    HttpDatasetApi, HttpDatasetApiConfig, IdleScheduler, LoadObserver, LoaderConfig, NetworkStatus,
    SiteCache, SourceLoader, StoreConfig,
};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_API_URL, ARG_CACHE_DB, ARG_DEFAULT_SOURCE, ARG_SITE_LIMIT, ARG_SOURCES, CliError,
    ENV_CACHE_DB,
};

#[cfg(feature = "store-sqlite")]
type LocalCache = periplus_data::SqliteSiteCache;
#[cfg(not(feature = "store-sqlite"))]
type LocalCache = periplus_data::MemorySiteCache;

/// CLI arguments for the `sync` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Bootstrap the site store from the dataset API (or the \
                 local cache when offline), load additional sources and \
                 write the result back to the cache. A JSON summary of the \
                 working set is printed on success.",
    about = "Synchronise site data with the local cache"
)]
#[ortho_config(prefix = "PERIPLUS")]
pub(crate) struct SyncArgs {
    /// Base URL of the dataset API (e.g. "http://localhost:3000").
    #[arg(long = ARG_API_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) api_url: Option<String>,
    /// Path to the SQLite site cache.
    #[arg(long = ARG_CACHE_DB, value_name = "path")]
    #[serde(default)]
    pub(crate) cache_db: Option<Utf8PathBuf>,
    /// Source fetched during bootstrap.
    #[arg(long = ARG_DEFAULT_SOURCE, value_name = "id")]
    #[serde(default)]
    pub(crate) default_source: Option<String>,
    /// Comma-separated source ids to load after bootstrap.
    #[arg(long = ARG_SOURCES, value_name = "ids")]
    #[serde(default)]
    pub(crate) sources: Option<String>,
    /// Read from the cache without touching the network.
    #[arg(long)]
    #[serde(default)]
    pub(crate) offline: bool,
    /// Maximum number of sites requested per source.
    #[arg(long = ARG_SITE_LIMIT, value_name = "count")]
    #[serde(default)]
    pub(crate) site_limit: Option<usize>,
}

impl SyncArgs {
    pub(crate) fn into_config(self) -> Result<SyncConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SyncConfig::try_from(merged)
    }
}

/// Resolved `sync` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyncConfig {
    /// Base URL of the dataset API.
    pub(crate) api_url: String,
    /// SQLite cache location, if caching is wanted.
    pub(crate) cache_db: Option<Utf8PathBuf>,
    /// Source fetched during bootstrap.
    pub(crate) default_source: String,
    /// Explicit sources to load; `None` loads the default-enabled set.
    pub(crate) sources: Option<Vec<String>>,
    pub(crate) offline: bool,
    pub(crate) site_limit: usize,
}

impl SyncConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        if self.offline
            && let Some(path) = &self.cache_db
        {
            Self::require_existing(path, ARG_CACHE_DB)?;
        }
        Ok(())
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        match std::fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => Ok(()),
            Ok(_) => Err(CliError::CachePathNotFile {
                field,
                path: path.to_path_buf(),
            }),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(CliError::MissingCacheFile {
                    field,
                    path: path.to_path_buf(),
                })
            }
            Err(source) => Err(CliError::InspectCachePath {
                field,
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl TryFrom<SyncArgs> for SyncConfig {
    type Error = CliError;

    fn try_from(args: SyncArgs) -> Result<Self, Self::Error> {
        if args.offline && args.cache_db.is_none() {
            return Err(CliError::MissingArgument {
                field: ARG_CACHE_DB,
                env: ENV_CACHE_DB,
            });
        }

        let api_url = args
            .api_url
            .unwrap_or_else(|| HttpDatasetApiConfig::default().base_url);
        let default_source = args
            .default_source
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SOURCE_ID.to_owned());
        let sources = args.sources.as_deref().map(split_source_ids);

        Ok(Self {
            api_url,
            cache_db: args.cache_db,
            default_source,
            sources,
            offline: args.offline,
            site_limit: args.site_limit.unwrap_or(DEFAULT_SITE_LIMIT),
        })
    }
}

fn split_source_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Builds the dataset API client for the current sync invocation.
pub(super) trait SyncBackend {
    fn build_api(&self, config: &SyncConfig) -> Result<Arc<dyn DatasetApi>, CliError>;
}

pub(super) struct DefaultSyncBackend;

impl SyncBackend for DefaultSyncBackend {
    fn build_api(&self, config: &SyncConfig) -> Result<Arc<dyn DatasetApi>, CliError> {
        let api = HttpDatasetApi::with_config(HttpDatasetApiConfig::new(config.api_url.clone()))
            .map_err(|source| CliError::BuildApi {
                base_url: config.api_url.clone(),
                source,
            })?;
        Ok(Arc::new(api))
    }
}

/// JSON summary printed after a successful sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SyncSummary {
    /// `"remote"` or `"offline"`.
    pub(crate) origin: String,
    /// Backend label reported by the API, when remote.
    pub(crate) data_source: Option<String>,
    pub(crate) total_sites: usize,
    pub(crate) by_source: BTreeMap<String, usize>,
    /// Sources whose load failed after bootstrap.
    pub(crate) failed_sources: Vec<String>,
    /// Sources written back to the cache.
    pub(crate) cached_sources: Vec<String>,
    pub(crate) cache_bytes: Option<u64>,
}

pub(super) fn run_sync(args: SyncArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_sync_with(args, &DefaultSyncBackend, &mut stdout)
}

pub(super) fn run_sync_with(
    args: SyncArgs,
    backend: &dyn SyncBackend,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let summary = execute_sync(args, backend)?;
    write_sync_summary(writer, &summary)
}

fn execute_sync(args: SyncArgs, backend: &dyn SyncBackend) -> Result<SyncSummary, CliError> {
    let config = resolve_sync_config(args)?;
    let api = backend.build_api(&config)?;
    let cache = open_cache(&config)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    runtime.block_on(sync_sites(&config, api, cache))
}

fn resolve_sync_config(args: SyncArgs) -> Result<SyncConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

async fn sync_sites(
    config: &SyncConfig,
    api: Arc<dyn DatasetApi>,
    cache: Option<Arc<LocalCache>>,
) -> Result<SyncSummary, CliError> {
    let network = if config.offline {
        NetworkStatus::offline()
    } else {
        NetworkStatus::online()
    };
    let store_config = StoreConfig::default()
        .with_default_source(config.default_source.clone())
        .with_site_limit(config.site_limit);
    let store = DataStore::new(
        Arc::clone(&api),
        cache
            .as_ref()
            .map(|cache| Arc::clone(cache) as Arc<dyn SiteCache>),
        network,
        store_config,
    );

    let origin = store.initialize().await?;
    info!("bootstrapped {} sites ({origin:?})", store.stats().total_sites);

    let mut failed_sources = Vec::new();
    let mut cached_sources = Vec::new();
    if let DataOrigin::Remote(_) = origin {
        failed_sources = load_additional_sources(config, &store, api).await;
        if let Some(cache) = &cache {
            cached_sources = persist(cache, &store).await?;
        }
    }

    let cache_bytes = store
        .storage_estimate()
        .await?
        .map(|estimate| estimate.used_bytes);
    let stats = store.stats();
    let (origin, data_source) = match origin {
        DataOrigin::Remote(label) => ("remote".to_owned(), Some(label)),
        DataOrigin::Offline | DataOrigin::Uninitialised => ("offline".to_owned(), None),
    };
    Ok(SyncSummary {
        origin,
        data_source,
        total_sites: stats.total_sites,
        by_source: stats.by_source,
        failed_sources,
        cached_sources,
        cache_bytes,
    })
}

async fn load_additional_sources(
    config: &SyncConfig,
    store: &DataStore,
    api: Arc<dyn DatasetApi>,
) -> Vec<String> {
    let requested = config
        .sources
        .clone()
        .unwrap_or_else(|| store.default_enabled_source_ids());
    let ids: Vec<String> = requested
        .into_iter()
        .filter(|id| *id != config.default_source)
        .collect();
    if ids.is_empty() {
        return Vec::new();
    }

    let scheduler: Arc<dyn IdleScheduler> = Arc::new(CooperativeYield);
    let loader = SourceLoader::new(
        api,
        scheduler,
        LoaderConfig::default().with_site_limit(config.site_limit),
    );
    let observer: Arc<dyn LoadObserver> = Arc::new(store.clone());
    let states = loader.load_sources(ids, observer).await;
    states
        .into_iter()
        .filter(|(_, status)| status.state == LoadState::Error)
        .map(|(id, status)| {
            warn!(
                "source {id} failed to load: {}",
                status.error.as_deref().unwrap_or("unknown error")
            );
            id
        })
        .collect()
}

#[cfg(feature = "store-sqlite")]
fn open_cache(config: &SyncConfig) -> Result<Option<Arc<LocalCache>>, CliError> {
    let Some(path) = &config.cache_db else {
        return Ok(None);
    };
    let cache = if config.offline {
        LocalCache::open(path)?
    } else {
        LocalCache::initialise(path)?
    };
    Ok(Some(Arc::new(cache)))
}

#[cfg(not(feature = "store-sqlite"))]
fn open_cache(config: &SyncConfig) -> Result<Option<Arc<LocalCache>>, CliError> {
    if config.cache_db.is_some() {
        return Err(CliError::MissingFeature {
            feature: "store-sqlite",
            action: "Caching sites",
        });
    }
    Ok(None)
}

/// Write every non-empty partition back to the cache.
#[cfg(feature = "store-sqlite")]
async fn persist(cache: &LocalCache, store: &DataStore) -> Result<Vec<String>, CliError> {
    let mut written = Vec::new();
    for source in store.sources() {
        let sites = store.sites_by_source(&[source.id.as_str()]);
        if sites.is_empty() {
            continue;
        }
        cache.store_source(&source, &sites).await?;
        written.push(source.id);
    }
    Ok(written)
}

#[cfg(not(feature = "store-sqlite"))]
async fn persist(cache: &LocalCache, store: &DataStore) -> Result<Vec<String>, CliError> {
    let mut written = Vec::new();
    for source in store.sources() {
        let sites = store.sites_by_source(&[source.id.as_str()]);
        if !sites.is_empty() {
            cache.store_source(&source, sites);
            written.push(source.id);
        }
    }
    Ok(written)
}

fn write_sync_summary(writer: &mut dyn Write, summary: &SyncSummary) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(summary).map_err(CliError::SerialiseSummary)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<SyncConfig, CliError> {
    let merged = SyncArgs::merge_from_layers(layers).map_err(CliError::from)?;
    SyncConfig::try_from(merged)
}
