//! In-memory [`SiteCache`].

use std::{
    collections::BTreeMap,
    sync::{PoisonError, RwLock},
};

use async_trait::async_trait;
use periplus_core::{Site, Source};

use crate::wire::CompactSite;

use super::{
    CacheError, CachedSource, DownloadState, SiteCache, StorageEstimate, sort_cached, unix_now,
};

/// Cache held entirely in memory.
///
/// Useful for tests and for hosts that persist elsewhere. The storage
/// estimate counts the compact wire size of the cached sites.
#[derive(Debug, Default)]
pub struct MemorySiteCache {
    entries: RwLock<BTreeMap<String, (CachedSource, Vec<Site>)>>,
}

impl MemorySiteCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Self::store_source`].
    #[must_use]
    pub fn with_source(self, source: &Source, sites: Vec<Site>) -> Self {
        self.store_source(source, sites);
        self
    }

    /// Replace the cached copy of `source` with `sites`.
    pub fn store_source(&self, source: &Source, sites: Vec<Site>) {
        let cached = CachedSource::from_source(source, sites.len(), unix_now());
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(source.id.clone(), (cached, sites));
    }

    /// Drop every cached source.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl SiteCache for MemorySiteCache {
    async fn has_offline_data(&self) -> Result<bool, CacheError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.values().any(|(_, sites)| !sites.is_empty()))
    }

    async fn download_state(&self) -> Result<DownloadState, CacheError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(DownloadState {
            downloaded_sources: entries.keys().cloned().collect(),
            total_sites: entries.values().map(|(_, sites)| sites.len()).sum(),
            last_updated: entries.values().map(|(cached, _)| cached.downloaded_at).max(),
        })
    }

    async fn cached_sources(&self) -> Result<Vec<CachedSource>, CacheError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut sources: Vec<CachedSource> =
            entries.values().map(|(cached, _)| cached.clone()).collect();
        sort_cached(&mut sources);
        Ok(sources)
    }

    async fn cached_sites(&self) -> Result<Vec<Site>, CacheError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .values()
            .flat_map(|(_, sites)| sites.iter().cloned())
            .collect())
    }

    async fn storage_estimate(&self) -> Result<StorageEstimate, CacheError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut used_bytes = 0_u64;
        for (_, sites) in entries.values() {
            let compact: Vec<CompactSite> = sites.iter().map(CompactSite::from_site).collect();
            let encoded = serde_json::to_vec(&compact).map_err(CacheError::query)?;
            used_bytes += u64::try_from(encoded.len()).unwrap_or(u64::MAX);
        }
        Ok(StorageEstimate {
            used_bytes,
            quota_bytes: None,
        })
    }
}
