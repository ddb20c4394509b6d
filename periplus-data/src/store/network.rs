//! Shared connectivity flag.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Whether the host currently believes it is online.
///
/// Clones share one flag, so the host can flip it while the store holds a
/// copy.
#[derive(Debug, Clone)]
pub struct NetworkStatus {
    online: Arc<AtomicBool>,
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self::online()
    }
}

impl NetworkStatus {
    /// A flag starting online.
    #[must_use]
    pub fn online() -> Self {
        Self {
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    /// A flag starting offline.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            online: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current state.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Update the state.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }
}
