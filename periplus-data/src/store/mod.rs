//! Cache coordinator and in-memory read model.
//!
//! [`DataStore`] bootstraps the working set either from the remote API or,
//! when offline, from a [`SiteCache`]. Later arrivals from the
//! [`SourceLoader`](crate::SourceLoader) are merged through its
//! [`LoadObserver`] implementation.
//!
//! Bootstrap order:
//! 1. Offline with cached data: read the cache, make no network calls.
//! 2. Otherwise fetch the listing and the default source's sites together.
//! 3. Listing failure falls back to the cache when it holds data.
//! 4. Sites failure fails the bootstrap.

mod network;

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use log::{debug, info, warn};
use periplus_core::{Site, SiteStats, Source};
use thiserror::Error;

use crate::{
    DatasetApi, LoadObserver,
    cache::{CacheError, DownloadState, SiteCache, StorageEstimate},
    error::{TransportError, WireError},
    loader::DEFAULT_SITE_LIMIT,
    wire,
};

pub use network::NetworkStatus;

/// Source bootstrapped alongside the listing unless configured otherwise.
pub const DEFAULT_SOURCE_ID: &str = "ancient_locations";

/// Label used when the API does not name its backend.
const UNLABELLED_BACKEND: &str = "api";

/// Errors returned by [`DataStore::initialize`].
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The listing could not be fetched and no cache could stand in.
    #[error("source listing unavailable: {0}")]
    SourcesUnavailable(#[source] TransportError),
    /// The default source's sites could not be fetched.
    #[error("sites for default source {source_id} unavailable: {source}")]
    SitesUnavailable {
        /// Default source id.
        source_id: String,
        /// Transport failure.
        #[source]
        source: TransportError,
    },
    /// A response body was malformed.
    #[error(transparent)]
    MalformedPayload(#[from] WireError),
    /// The cache failed while serving the offline bootstrap.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Where the working set came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DataOrigin {
    /// Bootstrap has not completed.
    #[default]
    Uninitialised,
    /// Remote API, labelled with the backend it reported.
    Remote(String),
    /// Local cache.
    Offline,
}

/// Store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Source whose sites are fetched during bootstrap.
    pub default_source_id: String,
    /// Site limit for the bootstrap request.
    pub site_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_source_id: DEFAULT_SOURCE_ID.to_owned(),
            site_limit: DEFAULT_SITE_LIMIT,
        }
    }
}

impl StoreConfig {
    /// Set the default source id.
    #[must_use]
    pub fn with_default_source(mut self, source_id: impl Into<String>) -> Self {
        self.default_source_id = source_id.into();
        self
    }

    /// Set the bootstrap site limit.
    #[must_use]
    pub fn with_site_limit(mut self, site_limit: usize) -> Self {
        self.site_limit = site_limit;
        self
    }
}

#[derive(Debug, Default)]
struct StoreState {
    sources: Vec<Source>,
    partitions: BTreeMap<String, Vec<Site>>,
    stats: SiteStats,
    origin: DataOrigin,
    backend_error: Option<String>,
    initialized: bool,
}

impl StoreState {
    fn refresh_stats(&mut self) {
        self.stats = SiteStats::from_partitions(&self.partitions);
    }
}

type SharedInit = Shared<BoxFuture<'static, Result<DataOrigin, StoreError>>>;

struct StoreInner {
    api: Arc<dyn DatasetApi>,
    cache: Option<Arc<dyn SiteCache>>,
    network: NetworkStatus,
    config: StoreConfig,
    state: RwLock<StoreState>,
    init: Mutex<Option<SharedInit>>,
}

/// Handle to the store. Clones share one working set.
#[derive(Clone)]
pub struct DataStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for DataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("DataStore")
            .field("config", &self.inner.config)
            .field("network", &self.inner.network)
            .field("has_cache", &self.inner.cache.is_some())
            .field("origin", &state.origin)
            .field("stats", &state.stats)
            .finish_non_exhaustive()
    }
}

impl DataStore {
    /// Create a store. Nothing is fetched until [`Self::initialize`].
    #[must_use]
    pub fn new(
        api: Arc<dyn DatasetApi>,
        cache: Option<Arc<dyn SiteCache>>,
        network: NetworkStatus,
        config: StoreConfig,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                api,
                cache,
                network,
                config,
                state: RwLock::new(StoreState::default()),
                init: Mutex::new(None),
            }),
        }
    }

    /// Bootstrap the working set.
    ///
    /// The first call starts the bootstrap; every call, concurrent or later,
    /// awaits that same attempt and receives its outcome, including a
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns the [`StoreError`] of the shared bootstrap attempt.
    pub async fn initialize(&self) -> Result<DataOrigin, StoreError> {
        let attempt = {
            let mut slot = self
                .inner
                .init
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            slot.get_or_insert_with(|| {
                let store = self.clone();
                async move { store.bootstrap().await }.boxed().shared()
            })
            .clone()
        };
        attempt.await
    }

    async fn bootstrap(self) -> Result<DataOrigin, StoreError> {
        if !self.is_network_available() {
            if let Some(cache) = self.cache_with_data().await {
                info!("offline with cached data; bootstrapping from cache");
                return self.bootstrap_from_cache(cache.as_ref()).await;
            }
            warn!("offline without cached data; trying the network anyway");
        }

        let api = &self.inner.api;
        let config = &self.inner.config;
        debug!(
            "fetching source listing and default source {}",
            config.default_source_id
        );
        let (listing, sites) = tokio::join!(
            api.fetch_source_listing(),
            api.fetch_sites(&config.default_source_id, config.site_limit),
        );

        let listing = match listing {
            Ok(body) => body,
            Err(err) => {
                warn!("source listing unavailable: {err}");
                if let Some(cache) = self.cache_with_data().await {
                    info!("falling back to cached data");
                    return self.bootstrap_from_cache(cache.as_ref()).await;
                }
                return Err(StoreError::SourcesUnavailable(err));
            }
        };
        let sites = sites.map_err(|source| StoreError::SitesUnavailable {
            source_id: config.default_source_id.clone(),
            source,
        })?;

        let sources = wire::parse_source_listing(&listing)?;
        let parsed = wire::parse_sites(&sites, &config.default_source_id)?;
        let origin = DataOrigin::Remote(
            parsed
                .data_source
                .unwrap_or_else(|| UNLABELLED_BACKEND.to_owned()),
        );
        info!(
            "bootstrapped {} sources and {} sites from {origin:?}",
            sources.len(),
            parsed.sites.len()
        );
        self.install(sources, parsed.sites, origin.clone());
        Ok(origin)
    }

    async fn cache_with_data(&self) -> Option<Arc<dyn SiteCache>> {
        let cache = self.inner.cache.as_ref()?;
        match cache.has_offline_data().await {
            Ok(true) => Some(Arc::clone(cache)),
            Ok(false) => None,
            Err(err) => {
                warn!("cache unavailable: {err}");
                None
            }
        }
    }

    async fn bootstrap_from_cache(&self, cache: &dyn SiteCache) -> Result<DataOrigin, StoreError> {
        let sources: Vec<Source> = cache
            .cached_sources()
            .await?
            .into_iter()
            .map(Source::from)
            .collect();
        let sites = cache.cached_sites().await?;
        info!(
            "bootstrapped {} sources and {} sites from cache",
            sources.len(),
            sites.len()
        );
        self.install(sources, sites, DataOrigin::Offline);
        Ok(DataOrigin::Offline)
    }

    fn install(&self, sources: Vec<Source>, sites: Vec<Site>, origin: DataOrigin) {
        let mut state = self.write();
        state.sources = sources;
        let mut arrivals: BTreeMap<String, Vec<Site>> = BTreeMap::new();
        for site in sites {
            arrivals.entry(site.source_id.clone()).or_default().push(site);
        }
        state.partitions.extend(arrivals);
        state.refresh_stats();
        state.origin = origin;
        state.initialized = true;
    }

    /// Replace the sites held for `source_id`.
    ///
    /// The source's record count follows the new partition and statistics
    /// are recomputed.
    pub fn add_source_sites(&self, source_id: &str, sites: Vec<Site>) {
        let mut state = self.write();
        let count = sites.len();
        state.partitions.insert(source_id.to_owned(), sites);
        if let Some(source) = state.sources.iter_mut().find(|s| s.id == source_id) {
            source.count = count;
        }
        state.refresh_stats();
        debug!("merged {count} sites for source {source_id}");
    }

    /// Every site held, grouped by source id.
    #[must_use]
    pub fn sites(&self) -> Vec<Site> {
        self.read().partitions.values().flatten().cloned().collect()
    }

    /// Sites belonging to `source_ids`; an empty slice selects everything.
    #[must_use]
    pub fn sites_by_source<S: AsRef<str>>(&self, source_ids: &[S]) -> Vec<Site> {
        if source_ids.is_empty() {
            return self.sites();
        }
        let state = self.read();
        source_ids
            .iter()
            .filter_map(|id| state.partitions.get(id.as_ref()))
            .flatten()
            .cloned()
            .collect()
    }

    /// Registered sources, in priority order.
    #[must_use]
    pub fn sources(&self) -> Vec<Source> {
        self.read().sources.clone()
    }

    /// One registered source.
    #[must_use]
    pub fn source(&self, source_id: &str) -> Option<Source> {
        self.read()
            .sources
            .iter()
            .find(|source| source.id == source_id)
            .cloned()
    }

    /// Sources flagged enabled by default, or every enabled source when none
    /// is flagged.
    #[must_use]
    pub fn default_enabled_sources(&self) -> Vec<Source> {
        let state = self.read();
        let flagged: Vec<Source> = state
            .sources
            .iter()
            .filter(|source| source.enabled_by_default)
            .cloned()
            .collect();
        if !flagged.is_empty() {
            return flagged;
        }
        state
            .sources
            .iter()
            .filter(|source| source.enabled)
            .cloned()
            .collect()
    }

    /// Ids of [`Self::default_enabled_sources`].
    #[must_use]
    pub fn default_enabled_source_ids(&self) -> Vec<String> {
        self.default_enabled_sources()
            .into_iter()
            .map(|source| source.id)
            .collect()
    }

    /// Site counts over the current partitions.
    #[must_use]
    pub fn stats(&self) -> SiteStats {
        self.read().stats.clone()
    }

    /// Where the working set came from.
    #[must_use]
    pub fn data_source(&self) -> DataOrigin {
        self.read().origin.clone()
    }

    /// Whether the working set was served from the cache, either because
    /// the device was offline or because the listing fetch fell back.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        matches!(self.read().origin, DataOrigin::Offline)
    }

    /// Whether the connectivity flag reads online.
    #[must_use]
    pub fn is_network_available(&self) -> bool {
        self.inner.network.is_online()
    }

    /// Whether a bootstrap has completed successfully.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.read().initialized
    }

    /// Record that the backend is unreachable.
    pub fn set_data_source_error(&self, message: impl Into<String>) {
        self.write().backend_error = Some(message.into());
    }

    /// Clear the backend-unreachable flag.
    pub fn clear_data_source_error(&self) {
        self.write().backend_error = None;
    }

    /// Backend-unreachable message, if set.
    #[must_use]
    pub fn data_source_error(&self) -> Option<String> {
        self.read().backend_error.clone()
    }

    /// Cache usage, or `None` without a cache.
    ///
    /// # Errors
    ///
    /// Propagates cache failures.
    pub async fn storage_estimate(&self) -> Result<Option<StorageEstimate>, CacheError> {
        match &self.inner.cache {
            Some(cache) => cache.storage_estimate().await.map(Some),
            None => Ok(None),
        }
    }

    /// Cache download summary, or `None` without a cache.
    ///
    /// # Errors
    ///
    /// Propagates cache failures.
    pub async fn download_state(&self) -> Result<Option<DownloadState>, CacheError> {
        match &self.inner.cache {
            Some(cache) => cache.download_state().await.map(Some),
            None => Ok(None),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl LoadObserver for DataStore {
    fn on_source_loaded(&self, source_id: &str, sites: &[Site]) {
        self.add_source_sites(source_id, sites.to_vec());
    }
}
