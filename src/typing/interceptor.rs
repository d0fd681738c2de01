//! Keystroke interception
//!
//! While a session is running every text-producing keystroke is swallowed
//! and queued; the engine replays the buffer in its place.

use super::engine::{EngineState, SessionStatus, TypingEngine};
use super::host::Editor;
use super::keystroke::Keystroke;

/// What the host should do with a keystroke it delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Suppressed; the engine emits from the buffer instead
    Suppress,
    /// Not ours; the host handles it normally
    PassThrough,
}

/// Arm interception for a fresh session. Returns whether it was already
/// armed, in which case the host hook needs tearing down first.
pub(super) fn register(state: &mut EngineState) -> bool {
    let was_armed = state.intercepting;
    if let Some(session) = state.session.as_mut() {
        session.queue.clear();
    }
    state.intercepting = true;
    was_armed
}

/// Disarm interception and drop anything still queued
pub(super) fn unregister(state: &mut EngineState) {
    state.intercepting = false;
    if let Some(session) = state.session.as_mut() {
        session.queue.clear();
    }
}

impl<E: Editor> TypingEngine<E> {
    pub fn is_intercepting(&self) -> bool {
        let state = self.lock();
        state.intercepting && state.status == SessionStatus::Running
    }

    /// Queue a keystroke if a session is intercepting
    fn accept(&self, raw: &str) -> Disposition {
        let capacity = self.inner.settings.queue_capacity;
        let mut guard = self.lock();
        let state = &mut *guard;

        if !state.intercepting || state.status != SessionStatus::Running {
            return Disposition::PassThrough;
        }
        let Some(session) = state.session.as_mut() else {
            return Disposition::PassThrough;
        };

        if session.queue.len() >= capacity {
            tracing::warn!(capacity, "Keystroke queue full, dropping keystroke");
        } else {
            session.queue.push_back(Keystroke::from_raw(raw));
        }
        Disposition::Suppress
    }

    /// Host-facing entry point. Queues the keystroke and schedules a drain
    /// pass on the current runtime.
    pub fn intercept(&self, raw: &str) -> Disposition {
        let disposition = self.accept(raw);
        if disposition == Disposition::Suppress {
            let engine = self.clone();
            tokio::spawn(async move { engine.drain().await });
        }
        disposition
    }

    /// Queue a keystroke and drain inline, returning once this call's pass
    /// (or the pass already running) has let go of the queue.
    pub async fn consume_keystroke(&self, raw: &str) -> Disposition {
        let disposition = self.accept(raw);
        if disposition == Disposition::Suppress {
            self.drain().await;
        }
        disposition
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::typing::engine::EngineSettings;
    use crate::typing::host::{EditorId, MemoryEditor};

    fn engine() -> (TypingEngine<MemoryEditor>, Arc<MemoryEditor>) {
        let editor = Arc::new(MemoryEditor::new(EditorId(3)));
        let (engine, _events) = TypingEngine::new(
            Arc::clone(&editor),
            EngineSettings {
                keystroke_delay: Duration::ZERO,
                queue_capacity: 8,
            },
        );
        (engine, editor)
    }

    #[test]
    fn test_stopped_engine_passes_through() {
        let (engine, _editor) = engine();
        assert!(!engine.is_intercepting());
        assert_eq!(engine.accept("a"), Disposition::PassThrough);
    }

    #[test]
    fn test_running_engine_suppresses() {
        let (engine, _editor) = engine();
        engine.start("abc");
        assert!(engine.is_intercepting());
        assert_eq!(engine.accept("a"), Disposition::Suppress);
        assert_eq!(engine.accept("\u{8}"), Disposition::Suppress);
        assert_eq!(engine.queued(), 2);
    }

    #[test]
    fn test_restart_clears_pending_keystrokes() {
        let (engine, _editor) = engine();
        engine.start("abc");
        engine.accept("a");
        engine.accept("b");
        engine.restart();
        assert_eq!(engine.queued(), 0);
    }

    #[tokio::test]
    async fn test_spawned_drain_types() {
        let (engine, editor) = engine();
        engine.start("xy");

        assert_eq!(engine.intercept("q"), Disposition::Suppress);
        assert_eq!(engine.intercept("q"), Disposition::Suppress);

        // Let the spawned passes run
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        assert_eq!(editor.text(), "xy");
        assert!(!engine.is_intercepting());
    }
}
