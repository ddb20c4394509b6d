//! Facade crate for the Periplus site atlas data layer.
//!
//! This crate re-exports the core domain types and geometry utilities and,
//! behind the `data` feature, the loader, cache coordinator and transport
//! adapters.

#![forbid(unsafe_code)]

pub use periplus_core::{
    ContainmentTest, EmpirePolygon, GeoBounds, GlobeView, LoadState, OrbitCamera,
    ProjectedCamera, RayCasting, Site, SiteStats, Source, SourceStatus, ViewSync, ViewSyncConfig,
    VisibleRegion, geometry, membership,
};

#[cfg(feature = "data")]
pub use periplus_data::{
    CacheError, CooperativeYield, DataOrigin, DataStore, DatasetApi, FrameTimer, HttpDatasetApi,
    HttpDatasetApiConfig, IdleScheduler, LoadError, LoadObserver, LoadProgress, LoaderConfig,
    MemorySiteCache, NetworkStatus, SiteCache, SourceLoader, StoreConfig, StoreError,
    TransportError,
};

#[cfg(feature = "store-sqlite")]
pub use periplus_data::SqliteSiteCache;
