//! Mock respawner for testing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::lifecycle::{LifecycleError, Respawner};

/// Records successor spawns instead of starting processes.
#[derive(Debug, Default)]
pub struct MockRespawner {
    spawns: AtomicUsize,
    fail: AtomicBool,
}

impl MockRespawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every spawn attempt fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    /// Number of spawn attempts, including failed ones.
    pub fn spawn_count(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }
}

impl Respawner for MockRespawner {
    fn spawn_successor(&self) -> Result<(), LifecycleError> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(LifecycleError::Spawn("mock spawn failure".to_string()));
        }
        Ok(())
    }
}
