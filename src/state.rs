//! Shared runtime flags
//!
//! Pass `Arc<RuntimeState>` to whatever needs to read or flip them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct RuntimeState {
    /// A completion request is in flight
    generating: AtomicBool,
    /// The host should exit at the next loop turn
    quit_requested: AtomicBool,
}

impl RuntimeState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::SeqCst)
    }

    /// Claim the generation flag. `None` when a request is already running.
    pub fn begin_generation(self: &Arc<Self>) -> Option<GenerationGuard> {
        self.generating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| GenerationGuard {
                state: Arc::clone(self),
            })
    }

    pub fn request_quit(&self) {
        self.quit_requested.store(true, Ordering::SeqCst);
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested.load(Ordering::SeqCst)
    }
}

/// Clears the generation flag when dropped, whatever the outcome
#[derive(Debug)]
pub struct GenerationGuard {
    state: Arc<RuntimeState>,
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.state.generating.store(false, Ordering::SeqCst);
    }
}
