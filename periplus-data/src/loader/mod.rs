//! Sequential, cooperative source loader.
//!
//! [`SourceLoader`] keeps one FIFO queue of source ids and drains it one
//! source at a time, yielding to the host before each fetch, after each
//! fetch and after each decode. A failing source is recorded and skipped;
//! it never stops the drain.
//!
//! Only one drain runs at a time. Callers arriving while a drain is in
//! flight add their ids to the same queue and wait for it to empty.

mod observer;

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::{debug, info, warn};
use periplus_core::{Site, SourceStatus};
use tokio::sync::Notify;

use crate::{DatasetApi, IdleScheduler, error::LoadError, wire};

pub use observer::{LoadObserver, LoadProgress};

/// Default cap on sites requested per source.
pub const DEFAULT_SITE_LIMIT: usize = 50_000;

/// Loader settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Maximum number of sites requested per source.
    pub site_limit: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            site_limit: DEFAULT_SITE_LIMIT,
        }
    }
}

impl LoaderConfig {
    /// Set the per-source site limit.
    #[must_use]
    pub fn with_site_limit(mut self, site_limit: usize) -> Self {
        self.site_limit = site_limit;
        self
    }
}

#[derive(Default)]
struct LoaderState {
    statuses: BTreeMap<String, SourceStatus>,
    queue: VecDeque<String>,
    running: bool,
    progress: LoadProgress,
    observers: Vec<Arc<dyn LoadObserver>>,
}

impl LoaderState {
    /// Queue ids that are not already queued, loading or loaded.
    fn enqueue<I, S>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for id in ids {
            let id = id.into();
            let blocked = self
                .statuses
                .get(&id)
                .is_some_and(SourceStatus::blocks_enqueue);
            if blocked || self.queue.contains(&id) {
                continue;
            }
            self.statuses.insert(id.clone(), SourceStatus::default());
            self.queue.push_back(id);
            added += 1;
        }
        added
    }

    fn register(&mut self, observer: Arc<dyn LoadObserver>) {
        if !self
            .observers
            .iter()
            .any(|known| Arc::ptr_eq(known, &observer))
        {
            self.observers.push(observer);
        }
    }
}

struct Inner {
    api: Arc<dyn DatasetApi>,
    scheduler: Arc<dyn IdleScheduler>,
    config: LoaderConfig,
    state: Mutex<LoaderState>,
    drained: Notify,
}

enum Step {
    Load(String),
    Done {
        observers: Vec<Arc<dyn LoadObserver>>,
        states: BTreeMap<String, SourceStatus>,
    },
}

/// Handle to a source loader. Clones share the same queue and statuses.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use periplus_data::{
///     CooperativeYield, HttpDatasetApi, LoadObserver, LoaderConfig, SourceLoader,
/// };
///
/// struct Quiet;
/// impl LoadObserver for Quiet {}
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let api = Arc::new(HttpDatasetApi::new("http://localhost:3000")?);
/// let loader = SourceLoader::new(api, Arc::new(CooperativeYield), LoaderConfig::default());
/// let states = loader.load_sources(["pleiades", "dare"], Arc::new(Quiet)).await;
/// assert_eq!(states.len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SourceLoader {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SourceLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("SourceLoader")
            .field("config", &self.inner.config)
            .field("queued", &state.queue)
            .field("running", &state.running)
            .field("progress", &state.progress)
            .finish_non_exhaustive()
    }
}

impl SourceLoader {
    /// Create a loader fetching through `api` and yielding via `scheduler`.
    #[must_use]
    pub fn new(
        api: Arc<dyn DatasetApi>,
        scheduler: Arc<dyn IdleScheduler>,
        config: LoaderConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                scheduler,
                config,
                state: Mutex::new(LoaderState::default()),
                drained: Notify::new(),
            }),
        }
    }

    /// Queue `ids` and wait until the queue has drained.
    ///
    /// Ids already queued, loading or loaded are ignored; ids in the error
    /// state are retried. `observer` receives the events of the drain that
    /// picks these ids up. When no drain is running the caller drives one;
    /// otherwise it waits for the running drain, which also processes the
    /// ids added here. Returns a snapshot of every known source status.
    pub async fn load_sources<I, S>(
        &self,
        ids: I,
        observer: Arc<dyn LoadObserver>,
    ) -> BTreeMap<String, SourceStatus>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let waiter = {
            let mut state = self.lock();
            let drive = !state.running;
            if drive {
                state.running = true;
                state.progress = LoadProgress::default();
            }
            let added = state.enqueue(ids);
            state.progress.total += added;
            state.register(observer);
            debug!("queued {added} sources (driving drain: {drive})");
            // Created under the lock so the drain cannot finish unobserved.
            (!drive).then(|| self.inner.drained.notified())
        };

        match waiter {
            Some(notified) => notified.await,
            None => self.drain().await,
        }
        self.states()
    }

    async fn drain(&self) {
        loop {
            match self.next_step() {
                Step::Load(source_id) => {
                    let outcome = self.load_one(&source_id).await;
                    self.settle(&source_id, outcome);
                }
                Step::Done { observers, states } => {
                    info!("source queue drained ({} known sources)", states.len());
                    for observer in &observers {
                        observer.on_complete(&states);
                    }
                    return;
                }
            }
        }
    }

    fn next_step(&self) -> Step {
        let mut state = self.lock();
        if let Some(source_id) = state.queue.pop_front() {
            state
                .statuses
                .insert(source_id.clone(), SourceStatus::loading());
            return Step::Load(source_id);
        }
        state.running = false;
        let observers = std::mem::take(&mut state.observers);
        let states = state.statuses.clone();
        self.inner.drained.notify_waiters();
        Step::Done { observers, states }
    }

    async fn load_one(&self, source_id: &str) -> Result<Vec<Site>, LoadError> {
        debug!("loading source {source_id}");
        let scheduler = &self.inner.scheduler;
        scheduler.yield_to_host().await;
        let body = self
            .inner
            .api
            .fetch_sites(source_id, self.inner.config.site_limit)
            .await?;
        scheduler.yield_to_host().await;
        let parsed = wire::parse_sites(&body, source_id)?;
        scheduler.yield_to_host().await;
        Ok(parsed.sites)
    }

    fn settle(&self, source_id: &str, outcome: Result<Vec<Site>, LoadError>) {
        let (progress, observers) = {
            let mut state = self.lock();
            let status = match &outcome {
                Ok(sites) => {
                    state.progress.loaded += 1;
                    SourceStatus::loaded(sites.len())
                }
                Err(err) => {
                    state.progress.failed += 1;
                    SourceStatus::failed(err.to_string())
                }
            };
            state.progress.settled += 1;
            state.statuses.insert(source_id.to_owned(), status);
            (state.progress, state.observers.clone())
        };

        match &outcome {
            Ok(sites) => info!("loaded {} sites from source {source_id}", sites.len()),
            Err(err) => warn!("failed to load source {source_id}: {err}"),
        }
        for observer in &observers {
            observer.on_progress(progress);
            match &outcome {
                Ok(sites) => observer.on_source_loaded(source_id, sites),
                Err(err) => observer.on_source_error(source_id, err),
            }
        }
    }

    /// Snapshot of every known source status.
    #[must_use]
    pub fn states(&self) -> BTreeMap<String, SourceStatus> {
        self.lock().statuses.clone()
    }

    /// Status of one source, if it was ever requested.
    #[must_use]
    pub fn status(&self, source_id: &str) -> Option<SourceStatus> {
        self.lock().statuses.get(source_id).cloned()
    }

    /// Whether a drain is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock().running
    }

    /// Progress of the current or most recent drain.
    #[must_use]
    pub fn progress(&self) -> LoadProgress {
        self.lock().progress
    }

    /// Ids waiting to be loaded, in queue order.
    #[must_use]
    pub fn queued(&self) -> Vec<String> {
        self.lock().queue.iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, LoaderState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
