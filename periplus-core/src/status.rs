//! Per-source load status reported by the loader.

/// Lifecycle of a single source load: `Idle → Loading → Loaded | Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Error,
}

/// Status snapshot for one source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceStatus {
    pub state: LoadState,
    /// Number of sites delivered by the last successful load.
    pub site_count: usize,
    /// Failure description when `state == LoadState::Error`.
    pub error: Option<String>,
}

impl SourceStatus {
    /// Status for a source that has started loading.
    pub fn loading() -> Self {
        Self {
            state: LoadState::Loading,
            ..Self::default()
        }
    }

    /// Status for a successful load of `site_count` sites.
    pub fn loaded(site_count: usize) -> Self {
        Self {
            state: LoadState::Loaded,
            site_count,
            error: None,
        }
    }

    /// Status for a failed load.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            state: LoadState::Error,
            site_count: 0,
            error: Some(message.into()),
        }
    }

    /// Whether a new request for this source must be ignored.
    ///
    /// Sources that are loading or already loaded are never re-queued;
    /// failed sources may be retried.
    pub fn blocks_enqueue(&self) -> bool {
        matches!(self.state, LoadState::Loading | LoadState::Loaded)
    }
}
