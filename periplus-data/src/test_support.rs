//! Test doubles for the loader and the store.
//!
//! [`StubApi`] serves pre-configured bodies without touching the network and
//! counts every call. [`CountingScheduler`] counts host yields.
//! [`RecordingObserver`] records loader events in order.

use std::{
    collections::{BTreeMap, HashMap},
    future::Future,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use periplus_core::{Site, Source, SourceStatus};

use crate::{
    DatasetApi, IdleScheduler, LoadError, LoadObserver, LoadProgress, TransportError,
    wire::{CompactSite, SitesPage, SourceRecord},
};

pub use crate::cache::MemorySiteCache;

/// Label reported by [`StubApi`] site pages.
pub const STUB_DATA_SOURCE: &str = "stub";

/// Stub [`DatasetApi`] returning canned bodies.
///
/// Sources without configured sites answer with an HTTP 404 error.
///
/// # Example
///
/// ```
/// use periplus_core::{Site, Source};
/// use periplus_data::{DatasetApi, test_support::{StubApi, block_on_for_tests}};
///
/// let api = StubApi::new()
///     .with_sources(&[Source::new("a", "Alpha")])
///     .with_sites("a", &[Site::new("1", "Ur", "a")]);
///
/// let body = block_on_for_tests(api.fetch_sites("a", 10)).expect("configured");
/// assert!(body.contains("Ur"));
/// assert_eq!(api.site_calls_for("a"), 1);
/// ```
#[derive(Debug)]
pub struct StubApi {
    listing: Result<String, TransportError>,
    sites: HashMap<String, Result<String, TransportError>>,
    listing_calls: AtomicUsize,
    site_calls: Mutex<Vec<String>>,
}

impl Default for StubApi {
    fn default() -> Self {
        Self {
            listing: Ok("[]".to_owned()),
            sites: HashMap::new(),
            listing_calls: AtomicUsize::new(0),
            site_calls: Mutex::new(Vec::new()),
        }
    }
}

impl StubApi {
    /// Create a stub with an empty listing and no sites.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `sources` as the listing.
    #[must_use]
    pub fn with_sources(mut self, sources: &[Source]) -> Self {
        let records: Vec<SourceRecord> = sources.iter().map(SourceRecord::from).collect();
        self.listing = Ok(encode(&records));
        self
    }

    /// Fail the listing request with `error`.
    #[must_use]
    pub fn with_listing_error(mut self, error: TransportError) -> Self {
        self.listing = Err(error);
        self
    }

    /// Serve `sites` for `source_id` in the compact wire format.
    #[must_use]
    pub fn with_sites(mut self, source_id: &str, sites: &[Site]) -> Self {
        let page = SitesPage {
            sites: sites.iter().map(CompactSite::from_site).collect(),
            count: Some(sites.len()),
            data_source: Some(STUB_DATA_SOURCE.to_owned()),
        };
        self.sites.insert(source_id.to_owned(), Ok(encode(&page)));
        self
    }

    /// Serve a raw body for `source_id`.
    #[must_use]
    pub fn with_sites_body(mut self, source_id: &str, body: impl Into<String>) -> Self {
        self.sites.insert(source_id.to_owned(), Ok(body.into()));
        self
    }

    /// Fail requests for `source_id` with `error`.
    #[must_use]
    pub fn with_sites_error(mut self, source_id: &str, error: TransportError) -> Self {
        self.sites.insert(source_id.to_owned(), Err(error));
        self
    }

    /// Number of listing requests served.
    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    /// Source ids requested, in call order.
    pub fn site_calls(&self) -> Vec<String> {
        self.site_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of site requests served for `source_id`.
    pub fn site_calls_for(&self, source_id: &str) -> usize {
        self.site_calls()
            .iter()
            .filter(|id| id.as_str() == source_id)
            .count()
    }

    /// Total number of requests of any kind.
    pub fn total_calls(&self) -> usize {
        self.listing_calls() + self.site_calls().len()
    }
}

fn encode<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|err| panic!("stub body must encode: {err}"))
}

/// Build a [`TransportError::Http`] for a stubbed URL.
pub fn http_error(status: u16) -> TransportError {
    TransportError::Http {
        url: "http://stub.invalid".to_owned(),
        status,
        message: format!("stub status {status}"),
    }
}

#[async_trait]
impl DatasetApi for StubApi {
    async fn fetch_source_listing(&self) -> Result<String, TransportError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.listing.clone()
    }

    async fn fetch_sites(&self, source_id: &str, _limit: usize) -> Result<String, TransportError> {
        self.site_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(source_id.to_owned());
        tokio::task::yield_now().await;
        self.sites
            .get(source_id)
            .cloned()
            .unwrap_or_else(|| Err(http_error(404)))
    }
}

/// [`IdleScheduler`] that counts yields.
#[derive(Debug, Default)]
pub struct CountingScheduler {
    yields: AtomicUsize,
}

impl CountingScheduler {
    /// Number of yields observed.
    pub fn yields(&self) -> usize {
        self.yields.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdleScheduler for CountingScheduler {
    async fn yield_to_host(&self) {
        self.yields.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
    }
}

/// Event captured by [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadEvent {
    Progress(LoadProgress),
    Loaded { source_id: String, site_count: usize },
    Failed { source_id: String, message: String },
    Complete(BTreeMap<String, SourceStatus>),
}

/// [`LoadObserver`] that records every event.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<LoadEvent>>,
}

impl RecordingObserver {
    /// Every event so far, in order.
    pub fn events(&self) -> Vec<LoadEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Ids of loaded sources, in load order.
    pub fn loaded_ids(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                LoadEvent::Loaded { source_id, .. } => Some(source_id),
                _ => None,
            })
            .collect()
    }

    /// Ids of failed sources, in failure order.
    pub fn failed_ids(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                LoadEvent::Failed { source_id, .. } => Some(source_id),
                _ => None,
            })
            .collect()
    }

    /// Number of completion events.
    pub fn completions(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, LoadEvent::Complete(_)))
            .count()
    }

    fn push(&self, event: LoadEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl LoadObserver for RecordingObserver {
    fn on_progress(&self, progress: LoadProgress) {
        self.push(LoadEvent::Progress(progress));
    }

    fn on_source_loaded(&self, source_id: &str, sites: &[Site]) {
        self.push(LoadEvent::Loaded {
            source_id: source_id.to_owned(),
            site_count: sites.len(),
        });
    }

    fn on_source_error(&self, source_id: &str, error: &LoadError) {
        self.push(LoadEvent::Failed {
            source_id: source_id.to_owned(),
            message: error.to_string(),
        });
    }

    fn on_complete(&self, states: &BTreeMap<String, SourceStatus>) {
        self.push(LoadEvent::Complete(states.clone()));
    }
}

/// Drive `future` to completion on a fresh current-thread runtime.
///
/// # Panics
///
/// Panics if the runtime cannot be built.
pub fn block_on_for_tests<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|err| panic!("test runtime must build: {err}"))
        .block_on(future)
}
