//! Helpers shared by the CLI unit and behaviour tests.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use periplus_core::{Site, Source};
use periplus_data::{
    DatasetApi, SqliteSiteCache,
    test_support::{StubApi, block_on_for_tests},
};
use tempfile::TempDir;

use crate::{
    CliError,
    sync::{SyncBackend, SyncConfig},
};

pub(super) const DEFAULT: &str = "ancient_locations";

/// Temporary directory plus a UTF-8 view of its path.
pub(super) fn utf8_tempdir() -> (TempDir, Utf8PathBuf) {
    let tmp = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");
    (tmp, root)
}

pub(super) fn sites(source_id: &str, count: usize) -> Vec<Site> {
    (0..count)
        .map(|i| Site::new(format!("{source_id}-{i}"), format!("Site {i}"), source_id))
        .collect()
}

/// Create a SQLite cache at `path` holding `count` sites for `source_id`.
pub(super) fn seed_cache(path: &Utf8Path, source_id: &str, count: usize) {
    let cache = SqliteSiteCache::initialise(path).expect("initialise cache");
    block_on_for_tests(cache.store_source(
        &Source::new(source_id, source_id).enabled_by_default(true),
        &sites(source_id, count),
    ))
    .expect("seed cache");
}

/// API serving the default source (two sites) and `pleiades` (one site).
pub(super) fn two_source_api() -> StubApi {
    let sources = [
        Source::new(DEFAULT, "Ancient locations")
            .enabled_by_default(true)
            .with_priority(1),
        Source::new("pleiades", "Pleiades")
            .enabled_by_default(true)
            .with_priority(2),
    ];
    StubApi::new()
        .with_sources(&sources)
        .with_sites(DEFAULT, &sites(DEFAULT, 2))
        .with_sites("pleiades", &sites("pleiades", 1))
}

/// [`SyncBackend`] handing out a shared [`StubApi`].
#[derive(Debug)]
pub(super) struct StubSyncBackend {
    pub(super) api: Arc<StubApi>,
}

impl StubSyncBackend {
    pub(super) fn new(api: StubApi) -> Self {
        Self { api: Arc::new(api) }
    }
}

impl SyncBackend for StubSyncBackend {
    fn build_api(&self, _config: &SyncConfig) -> Result<Arc<dyn DatasetApi>, CliError> {
        Ok(Arc::clone(&self.api) as Arc<dyn DatasetApi>)
    }
}
