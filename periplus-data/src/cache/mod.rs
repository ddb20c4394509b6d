//! Local persistent cache of downloaded sources.
//!
//! The store consults a [`SiteCache`] when the device is offline or the
//! remote listing is unreachable. Two adapters ship with the crate:
//! [`MemorySiteCache`] and, behind the `store-sqlite` feature,
//! [`SqliteSiteCache`].

mod memory;
#[cfg(feature = "store-sqlite")]
mod sqlite;

use std::{error::Error as StdError, sync::Arc};

use async_trait::async_trait;
use camino::Utf8PathBuf;
use periplus_core::{Site, Source};
use thiserror::Error;

pub use memory::MemorySiteCache;
#[cfg(feature = "store-sqlite")]
pub use sqlite::SqliteSiteCache;

type SharedError = Arc<dyn StdError + Send + Sync>;

/// Errors raised by cache adapters.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The backing store could not be opened.
    #[error("failed to open cache at {path}: {source}")]
    Open {
        /// Location of the cache on disk.
        path: Utf8PathBuf,
        /// Underlying failure.
        #[source]
        source: SharedError,
    },
    /// A read or write against the backing store failed.
    #[error("cache query failed: {source}")]
    Query {
        /// Underlying failure.
        #[source]
        source: SharedError,
    },
    /// A cached record could not be decoded.
    #[error("cached site {id} is corrupt: {source}")]
    Decode {
        /// Identifier of the offending site.
        id: String,
        /// JSON decoding failure.
        #[source]
        source: Arc<serde_json::Error>,
    },
    /// The blocking worker running the query failed.
    #[error("cache worker failed: {message}")]
    Task {
        /// Join error description.
        message: String,
    },
}

impl CacheError {
    pub(crate) fn query(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Query {
            source: Arc::new(source),
        }
    }
}

/// Summary of what has been downloaded for offline use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadState {
    /// Ids of sources with a cached copy, ordered by id.
    pub downloaded_sources: Vec<String>,
    /// Number of cached sites across all sources.
    pub total_sites: usize,
    /// Most recent download time in Unix seconds.
    pub last_updated: Option<i64>,
}

impl DownloadState {
    /// Whether anything usable is cached.
    #[must_use]
    pub fn is_downloaded(&self) -> bool {
        !self.downloaded_sources.is_empty() && self.total_sites > 0
    }
}

/// Metadata kept for each cached source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedSource {
    pub id: String,
    pub name: String,
    pub color: String,
    pub category: String,
    pub priority: i32,
    pub enabled_by_default: bool,
    pub site_count: usize,
    /// Download time in Unix seconds.
    pub downloaded_at: i64,
}

impl CachedSource {
    /// Capture `source` with the number of sites cached for it.
    #[must_use]
    pub fn from_source(source: &Source, site_count: usize, downloaded_at: i64) -> Self {
        Self {
            id: source.id.clone(),
            name: source.name.clone(),
            color: source.color.clone(),
            category: source.category.clone(),
            priority: source.priority,
            enabled_by_default: source.enabled_by_default,
            site_count,
            downloaded_at,
        }
    }
}

impl From<CachedSource> for Source {
    fn from(cached: CachedSource) -> Self {
        let mut source = Self::new(cached.id, cached.name)
            .enabled_by_default(cached.enabled_by_default)
            .with_priority(cached.priority);
        source.color = cached.color;
        source.category = cached.category;
        source.count = cached.site_count;
        source
    }
}

/// Space used by the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageEstimate {
    pub used_bytes: u64,
    /// Upper bound, when the backend has one.
    pub quota_bytes: Option<u64>,
}

/// Read side of the local cache.
#[async_trait]
pub trait SiteCache: Send + Sync {
    /// Whether the cache holds at least one site.
    async fn has_offline_data(&self) -> Result<bool, CacheError>;

    /// Describe what has been downloaded.
    async fn download_state(&self) -> Result<DownloadState, CacheError>;

    /// Metadata for every cached source, ordered by priority then id.
    async fn cached_sources(&self) -> Result<Vec<CachedSource>, CacheError>;

    /// Every cached site.
    async fn cached_sites(&self) -> Result<Vec<Site>, CacheError>;

    /// Space used by the cache.
    async fn storage_estimate(&self) -> Result<StorageEstimate, CacheError>;
}

pub(crate) fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}

fn sort_cached(sources: &mut [CachedSource]) {
    sources.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
}
