//! Cursor reconciliation
//!
//! When the user moves the cursor away from where typing left off, the
//! index and the offset the cursor went to are remembered. A keystroke made
//! with the cursor at that offset resumes replay from the remembered index.

use super::engine::{PausePoint, SessionStatus, TypingEngine};
use super::host::{Editor, EditorId};

/// Cursor move reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorMoved {
    pub editor: EditorId,
    pub offset: usize,
}

impl<E: Editor> TypingEngine<E> {
    /// Record a pause point if the cursor left the expected offset.
    /// Events for other editors, or while not running, are ignored.
    pub fn on_cursor_moved(&self, event: CursorMoved) -> Option<PausePoint> {
        let mut state = self.lock();
        if state.status != SessionStatus::Running {
            return None;
        }
        let session = state.session.as_mut()?;
        // The pending commit moves the cursor to the typing position anyway
        if session.editor != event.editor || session.in_flight.is_some() {
            return None;
        }

        let expected = session.expected_offset();
        if event.offset == expected {
            return None;
        }

        let point = PausePoint {
            index: session.index,
            offset: event.offset,
        };
        session.pause_point = Some(point);
        tracing::debug!(
            index = point.index,
            expected,
            actual = event.offset,
            "Cursor left typing position"
        );
        Some(point)
    }
}
