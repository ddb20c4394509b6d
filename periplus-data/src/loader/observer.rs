//! Loader events.

use std::collections::BTreeMap;

use periplus_core::{Site, SourceStatus};

use crate::error::LoadError;

/// Progress of the current drain.
///
/// `settled` counts every source that finished, whether it loaded or
/// failed; `total` counts every source enqueued since the drain started,
/// including late additions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadProgress {
    pub settled: usize,
    pub loaded: usize,
    pub failed: usize,
    pub total: usize,
}

impl LoadProgress {
    /// Share of queued sources that have settled, in `[0, 1]`.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.settled as f64 / self.total as f64).min(1.0)
    }

    /// Whether every enqueued source has settled.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.settled >= self.total
    }
}

/// Receives loader events.
///
/// Callbacks run on the task driving the drain, outside any loader lock,
/// so implementations may call back into the loader. Every method has a
/// no-op default.
pub trait LoadObserver: Send + Sync {
    /// A source settled; `progress` reflects it.
    fn on_progress(&self, progress: LoadProgress) {
        let _ = progress;
    }

    /// A source's sites were fetched and decoded.
    fn on_source_loaded(&self, source_id: &str, sites: &[Site]) {
        let _ = (source_id, sites);
    }

    /// A source failed to load. The drain carries on.
    fn on_source_error(&self, source_id: &str, error: &LoadError) {
        let _ = (source_id, error);
    }

    /// The queue drained. `states` is a snapshot taken at that moment.
    fn on_complete(&self, states: &BTreeMap<String, SourceStatus>) {
        let _ = states;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(LoadProgress::default(), 1.0, true)]
    #[case(LoadProgress { settled: 1, loaded: 1, failed: 0, total: 4 }, 0.25, false)]
    #[case(LoadProgress { settled: 4, loaded: 2, failed: 2, total: 4 }, 1.0, true)]
    fn fraction_counts_failures_as_settled(
        #[case] progress: LoadProgress,
        #[case] fraction: f64,
        #[case] complete: bool,
    ) {
        assert!((progress.fraction() - fraction).abs() < f64::EPSILON);
        assert_eq!(progress.is_complete(), complete);
    }
}
