//! Data acquisition and caching for the Periplus site atlas.
//!
//! Responsibilities:
//! - Fetch source listings and per-source site pages from the dataset API.
//! - Decode the compact wire format into `periplus-core` domain types.
//! - Stream additional sources in without starving the host.
//! - Reconcile the remote source of truth with a local cache.
//!
//! Boundaries:
//! - Do not encode geometry or view rules (live in `periplus-core`).
//! - Keep blocking I/O off async executors; SQLite work runs on the
//!   blocking pool.
//!
//! Invariants:
//! - Locks are never held across an `.await`.
//! - No global mutable state; loaders and stores are explicit handles.

#![forbid(unsafe_code)]

mod api;
mod cache;
mod error;
mod loader;
mod schedule;
mod store;
pub mod wire;

#[doc(hidden)]
pub mod test_support;

pub use api::{
    ApiBuildError, DEFAULT_USER_AGENT, DatasetApi, HttpDatasetApi, HttpDatasetApiConfig,
};
#[cfg(feature = "store-sqlite")]
pub use cache::SqliteSiteCache;
pub use cache::{
    CacheError, CachedSource, DownloadState, MemorySiteCache, SiteCache, StorageEstimate,
};
pub use error::{LoadError, TransportError, WireError};
pub use loader::{DEFAULT_SITE_LIMIT, LoadObserver, LoadProgress, LoaderConfig, SourceLoader};
pub use schedule::{CooperativeYield, DEFAULT_FRAME, FrameTimer, IdleScheduler};
pub use store::{DEFAULT_SOURCE_ID, DataOrigin, DataStore, NetworkStatus, StoreConfig, StoreError};
