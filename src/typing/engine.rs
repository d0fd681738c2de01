//! Typing engine - replays a source buffer one keystroke at a time
//!
//! Session status transitions:
//! - Stopped -> Running (start / restart)
//! - Running -> Paused (pause)
//! - Paused -> Running (resume)
//! - Running | Paused -> Stopped (stop, buffer exhausted, host failure)
//!
//! Intercepted keystrokes are queued and consumed by a single drain pass in
//! arrival order. The pass re-checks the status around every suspension
//! point so a stop or pause takes effect before the next edit.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::buffer::SourceBuffer;
use super::host::{Edit, Editor, EditorId, HostError, KeystrokeHook};
use super::interceptor::{register, unregister};
use super::keystroke::Keystroke;
use crate::config::TypingConfig;

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Stopped,
    Running,
    Paused,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Stopped => write!(f, "Stopped"),
            SessionStatus::Running => write!(f, "Running"),
            SessionStatus::Paused => write!(f, "Paused"),
        }
    }
}

/// Where replay resumes once the live cursor returns to `offset`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PausePoint {
    pub index: usize,
    pub offset: usize,
}

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Status(SessionStatus),
    /// The whole buffer has been typed
    Completed,
    /// The host rejected an edit; the session was stopped
    Failed(String),
}

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// Pause between two emitted keystrokes
    pub keystroke_delay: Duration,
    /// Keystrokes beyond this many pending ones are dropped
    pub queue_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&TypingConfig::default())
    }
}

impl From<&TypingConfig> for EngineSettings {
    fn from(config: &TypingConfig) -> Self {
        Self {
            keystroke_delay: Duration::from_millis(config.keystroke_delay_ms),
            queue_capacity: config.queue_capacity.max(1),
        }
    }
}

/// Everything scoped to one typing session. Replaced wholesale on start.
#[derive(Debug)]
pub(super) struct Session {
    pub(super) buffer: SourceBuffer,
    pub(super) editor: EditorId,
    /// Document offset the session started at
    pub(super) anchor: usize,
    pub(super) index: usize,
    pub(super) pause_point: Option<PausePoint>,
    pub(super) queue: VecDeque<Keystroke>,
    /// Index the edit currently handed to the host will commit
    pub(super) in_flight: Option<usize>,
}

impl Session {
    fn new(buffer: SourceBuffer, editor: EditorId, anchor: usize) -> Self {
        Self {
            buffer,
            editor,
            anchor,
            index: 0,
            pause_point: None,
            queue: VecDeque::new(),
            in_flight: None,
        }
    }

    /// Document offset the live cursor should be at
    pub(super) fn expected_offset(&self) -> usize {
        self.anchor + self.index
    }

    fn rewind(&mut self) {
        self.index = 0;
        self.pause_point = None;
        self.in_flight = None;
    }
}

#[derive(Debug)]
pub(super) struct EngineState {
    pub(super) status: SessionStatus,
    pub(super) session: Option<Session>,
    /// A drain pass is in progress
    pub(super) draining: bool,
    /// Host keystrokes are being replaced
    pub(super) intercepting: bool,
    /// Bumped whenever a session is started or stopped, so an edit that
    /// completes afterwards is not committed
    epoch: u64,
}

/// An edit taken from the queue head, waiting for the host
struct Planned {
    epoch: u64,
    edit: Edit,
    index: usize,
}

enum Outcome {
    Continue(usize),
    Halted(usize),
    Completed(usize),
    Failed(HostError),
    Discarded,
}

pub(super) struct Inner<E> {
    pub(super) editor: Arc<E>,
    hook: Option<Arc<dyn KeystrokeHook>>,
    pub(super) settings: EngineSettings,
    state: Mutex<EngineState>,
    events: flume::Sender<EngineEvent>,
}

/// Handle to the typing engine. Clones share the same session.
pub struct TypingEngine<E: Editor> {
    pub(super) inner: Arc<Inner<E>>,
}

impl<E: Editor> Clone for TypingEngine<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Editor> fmt::Debug for TypingEngine<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("TypingEngine")
            .field("status", &state.status)
            .field("index", &state.session.as_ref().map(|s| s.index))
            .field("draining", &state.draining)
            .field("intercepting", &state.intercepting)
            .finish()
    }
}

impl<E: Editor> TypingEngine<E> {
    /// Create an engine typing into `editor`
    pub fn new(editor: Arc<E>, settings: EngineSettings) -> (Self, flume::Receiver<EngineEvent>) {
        Self::build(editor, settings, None)
    }

    /// Create an engine that also toggles the host's default key handling
    pub fn with_hook(
        editor: Arc<E>,
        settings: EngineSettings,
        hook: Arc<dyn KeystrokeHook>,
    ) -> (Self, flume::Receiver<EngineEvent>) {
        Self::build(editor, settings, Some(hook))
    }

    fn build(
        editor: Arc<E>,
        settings: EngineSettings,
        hook: Option<Arc<dyn KeystrokeHook>>,
    ) -> (Self, flume::Receiver<EngineEvent>) {
        let (events, rx) = flume::unbounded();
        let inner = Inner {
            editor,
            hook,
            settings,
            state: Mutex::new(EngineState {
                status: SessionStatus::Stopped,
                session: None,
                draining: false,
                intercepting: false,
                epoch: 0,
            }),
            events,
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn emit(&self, event: EngineEvent) {
        let _ = self.inner.events.send(event);
    }

    pub(super) fn set_hook(&self, on: bool) {
        if let Some(hook) = &self.inner.hook {
            hook.set_intercepting(on);
        }
    }

    pub fn editor(&self) -> &Arc<E> {
        &self.inner.editor
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn status(&self) -> SessionStatus {
        self.lock().status
    }

    /// How much of the buffer has been emitted
    pub fn cursor_index(&self) -> usize {
        self.lock().session.as_ref().map_or(0, |s| s.index)
    }

    /// Current source buffer, normalized
    pub fn buffer_text(&self) -> Option<String> {
        self.lock().session.as_ref().map(|s| s.buffer.to_string())
    }

    pub fn has_buffer(&self) -> bool {
        self.lock()
            .session
            .as_ref()
            .is_some_and(|s| !s.buffer.is_empty())
    }

    pub fn pause_point(&self) -> Option<PausePoint> {
        self.lock().session.as_ref().and_then(|s| s.pause_point)
    }

    /// Keystrokes waiting to be replayed
    pub fn queued(&self) -> usize {
        self.lock().session.as_ref().map_or(0, |s| s.queue.len())
    }

    /// (typed, total) for the status bar
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.lock()
            .session
            .as_ref()
            .map(|s| (s.index, s.buffer.len()))
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Start typing `text` from the live cursor. No-op for empty text.
    pub fn start(&self, text: &str) -> bool {
        let buffer = SourceBuffer::new(text);
        if buffer.is_empty() {
            tracing::debug!("Start ignored: empty buffer");
            return false;
        }
        self.begin(buffer);
        true
    }

    /// Replace the buffer without starting; `restart` picks it up
    pub fn load(&self, text: &str) -> bool {
        let buffer = SourceBuffer::new(text);
        if buffer.is_empty() {
            return false;
        }
        let chars = buffer.len();
        let session = Session::new(buffer, self.inner.editor.id(), 0);

        let previous = {
            let mut state = self.lock();
            let previous = state.status;
            state.epoch += 1;
            state.status = SessionStatus::Stopped;
            state.session = Some(session);
            unregister(&mut state);
            previous
        };

        self.set_hook(false);
        tracing::info!(chars, "Typing buffer loaded");
        if previous != SessionStatus::Stopped {
            self.emit(EngineEvent::Status(SessionStatus::Stopped));
        }
        true
    }

    /// Type the current buffer again from the live cursor
    pub fn restart(&self) -> bool {
        let buffer = self.lock().session.as_ref().map(|s| s.buffer.clone());
        match buffer {
            Some(buffer) if !buffer.is_empty() => {
                self.begin(buffer);
                true
            }
            _ => {
                tracing::debug!("Restart ignored: no buffer");
                false
            }
        }
    }

    fn begin(&self, buffer: SourceBuffer) {
        let editor = self.inner.editor.id();
        let anchor = self.inner.editor.cursor_offset();
        let chars = buffer.len();

        let was_armed = {
            let mut state = self.lock();
            state.epoch += 1;
            state.session = Some(Session::new(buffer, editor, anchor));
            state.status = SessionStatus::Running;
            register(&mut state)
        };

        if was_armed {
            self.set_hook(false);
        }
        self.set_hook(true);

        tracing::info!(chars, anchor, "Typing session started");
        self.emit(EngineEvent::Status(SessionStatus::Running));
    }

    /// Suspend replay; host keystrokes pass through until `resume`
    pub fn pause(&self) -> bool {
        let offset = self.inner.editor.cursor_offset();
        {
            let mut state = self.lock();
            if state.status != SessionStatus::Running {
                tracing::debug!(status = %state.status, "Pause ignored");
                return false;
            }
            if let Some(session) = state.session.as_mut() {
                // An edit still with the host commits its index and cursor
                let point = match session.in_flight {
                    Some(next) => PausePoint {
                        index: next,
                        offset: session.anchor + next,
                    },
                    None => PausePoint {
                        index: session.index,
                        offset,
                    },
                };
                session.pause_point = Some(point);
            }
            state.status = SessionStatus::Paused;
            state.intercepting = false;
        }

        self.set_hook(false);
        tracing::info!(offset, "Typing paused");
        self.emit(EngineEvent::Status(SessionStatus::Paused));
        true
    }

    /// Continue a paused session and replay anything still queued
    pub async fn resume(&self) -> bool {
        if !self.rearm() {
            return false;
        }
        self.drain().await;
        true
    }

    /// Like `resume`, with the drain pass spawned on the current runtime
    pub fn resume_detached(&self) -> bool {
        if !self.rearm() {
            return false;
        }
        let engine = self.clone();
        tokio::spawn(async move { engine.drain().await });
        true
    }

    fn rearm(&self) -> bool {
        {
            let mut state = self.lock();
            if state.status != SessionStatus::Paused {
                tracing::debug!(status = %state.status, "Resume ignored");
                return false;
            }
            state.status = SessionStatus::Running;
            state.intercepting = true;
        }

        self.set_hook(true);
        tracing::info!("Typing resumed");
        self.emit(EngineEvent::Status(SessionStatus::Running));
        true
    }

    /// Stop typing and rewind to the start of the buffer
    pub fn stop(&self) {
        let previous = {
            let mut state = self.lock();
            let previous = state.status;
            state.status = SessionStatus::Stopped;
            state.epoch += 1;
            if let Some(session) = state.session.as_mut() {
                session.rewind();
            }
            unregister(&mut state);
            previous
        };

        self.set_hook(false);
        if previous != SessionStatus::Stopped {
            tracing::info!("Typing stopped");
            self.emit(EngineEvent::Status(SessionStatus::Stopped));
        }
    }

    // ========================================================================
    // Replay
    // ========================================================================

    /// Consume the keystroke queue. Returns immediately when another pass
    /// is already running; that pass picks up everything queued.
    pub async fn drain(&self) {
        if !self.claim_drain() {
            return;
        }

        let delay = self.inner.settings.keystroke_delay;
        while let Some(planned) = self.plan_next() {
            let result = self.inner.editor.apply(planned.edit.clone()).await;
            if self.commit(planned, result) && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    fn claim_drain(&self) -> bool {
        let mut state = self.lock();
        if state.draining || state.status != SessionStatus::Running {
            return false;
        }
        state.draining = true;
        true
    }

    /// Take the queue head and work out its edit. Clears the drain flag in
    /// the same critical section that observes the end of work.
    fn plan_next(&self) -> Option<Planned> {
        let live = self.inner.editor.cursor_offset();
        let mut guard = self.lock();
        let state = &mut *guard;

        loop {
            let session = match (state.status, state.session.as_mut()) {
                (SessionStatus::Running, Some(session)) => session,
                _ => {
                    state.draining = false;
                    return None;
                }
            };

            if let Some(point) = session.pause_point {
                if point.offset == live {
                    tracing::debug!(
                        index = point.index,
                        offset = point.offset,
                        "Cursor back at pause point"
                    );
                    session.index = point.index;
                    session.pause_point = None;
                }
            }

            let Some(keystroke) = session.queue.pop_front() else {
                state.draining = false;
                return None;
            };

            let at = session.expected_offset();
            match keystroke {
                Keystroke::DeletePrevious => {
                    if session.index == 0 {
                        continue;
                    }
                    session.in_flight = Some(session.index - 1);
                    return Some(Planned {
                        epoch: state.epoch,
                        edit: Edit::Delete { start: at - 1, end: at },
                        index: session.index - 1,
                    });
                }
                Keystroke::Insert(raw) => match session.buffer.unit_at(session.index) {
                    None => {
                        tracing::debug!(raw = %raw.escape_debug(), "Buffer exhausted, keystroke swallowed");
                        continue;
                    }
                    Some(unit) => {
                        session.in_flight = Some(session.index + unit.len());
                        return Some(Planned {
                            epoch: state.epoch,
                            edit: Edit::Insert {
                                offset: at,
                                text: unit.iter().collect(),
                            },
                            index: session.index + unit.len(),
                        });
                    }
                },
            }
        }
    }

    /// Record a finished edit. Returns whether replay should carry on.
    fn commit(&self, planned: Planned, result: Result<(), HostError>) -> bool {
        let outcome = {
            let mut guard = self.lock();
            let state = &mut *guard;

            if state.epoch != planned.epoch || state.status == SessionStatus::Stopped {
                Outcome::Discarded
            } else if let Err(err) = result {
                state.status = SessionStatus::Stopped;
                state.epoch += 1;
                if let Some(session) = state.session.as_mut() {
                    session.rewind();
                }
                unregister(state);
                Outcome::Failed(err)
            } else {
                let Some(session) = state.session.as_mut() else {
                    return false;
                };
                session.index = planned.index;
                session.in_flight = None;
                let target = session.expected_offset();
                let exhausted = session.index >= session.buffer.len();

                if exhausted {
                    state.status = SessionStatus::Stopped;
                    unregister(state);
                    Outcome::Completed(target)
                } else if state.status == SessionStatus::Running {
                    Outcome::Continue(target)
                } else {
                    Outcome::Halted(target)
                }
            }
        };

        match outcome {
            Outcome::Continue(target) => {
                self.inner.editor.set_cursor(target);
                true
            }
            Outcome::Halted(target) => {
                self.inner.editor.set_cursor(target);
                false
            }
            Outcome::Completed(target) => {
                self.inner.editor.set_cursor(target);
                self.set_hook(false);
                tracing::info!("Typing complete");
                self.emit(EngineEvent::Status(SessionStatus::Stopped));
                self.emit(EngineEvent::Completed);
                false
            }
            Outcome::Failed(err) => {
                tracing::error!(error = %err, "Host rejected edit, stopping session");
                self.set_hook(false);
                self.emit(EngineEvent::Failed(err.to_string()));
                self.emit(EngineEvent::Status(SessionStatus::Stopped));
                false
            }
            Outcome::Discarded => {
                tracing::debug!("Session ended while an edit was in flight");
                false
            }
        }
    }
}
