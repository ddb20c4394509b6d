//! Cooperative yielding to the host.
//!
//! The loader calls [`IdleScheduler::yield_to_host`] around every network
//! and parse step so that long dataset loads never starve whatever else the
//! runtime is driving (a render loop, input handling).

use std::time::Duration;

use async_trait::async_trait;

/// Hands control back to the host between units of loader work.
#[async_trait]
pub trait IdleScheduler: Send + Sync {
    /// Suspend until the host has had a chance to run.
    async fn yield_to_host(&self);
}

/// Yields once to the Tokio scheduler.
#[derive(Debug, Default, Clone, Copy)]
pub struct CooperativeYield;

#[async_trait]
impl IdleScheduler for CooperativeYield {
    async fn yield_to_host(&self) {
        tokio::task::yield_now().await;
    }
}

/// Roughly one frame at 60 Hz.
pub const DEFAULT_FRAME: Duration = Duration::from_millis(16);

/// Sleeps for a fixed frame budget, approximating an idle callback.
#[derive(Debug, Clone, Copy)]
pub struct FrameTimer {
    frame: Duration,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self {
            frame: DEFAULT_FRAME,
        }
    }
}

impl FrameTimer {
    /// Create a timer sleeping for `frame` per yield.
    #[must_use]
    pub const fn new(frame: Duration) -> Self {
        Self { frame }
    }

    /// Frame duration.
    #[must_use]
    pub const fn frame(&self) -> Duration {
        self.frame
    }
}

#[async_trait]
impl IdleScheduler for FrameTimer {
    async fn yield_to_host(&self) {
        tokio::time::sleep(self.frame).await;
    }
}
