//! Host editor capabilities the typing engine depends on
//!
//! - [`Editor`]: the document being typed into and its live cursor
//! - [`KeystrokeHook`]: lets the engine switch the host's default key
//!   handling off while it is replaying
//!
//! [`MemoryEditor`] is a complete in-process implementation used by the
//! terminal host and the tests.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Identity of an editor view; a session is bound to the one it started in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EditorId(pub u64);

/// A single document mutation, in char offsets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Insert { offset: usize, text: String },
    Delete { start: usize, end: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("edit at offset {offset} is outside the document (length {len})")]
    OutOfRange { offset: usize, len: usize },
}

/// The document the engine types into
pub trait Editor: Send + Sync + 'static {
    fn id(&self) -> EditorId;

    /// Live cursor position as a char offset into the document
    fn cursor_offset(&self) -> usize;

    fn set_cursor(&self, offset: usize);

    /// Apply an edit. Completion is awaited before the engine advances.
    fn apply(&self, edit: Edit) -> impl Future<Output = Result<(), HostError>> + Send;
}

/// Switches the host's default keystroke handling on and off
pub trait KeystrokeHook: Send + Sync {
    /// `true` while the engine replaces the host's own insertion
    fn set_intercepting(&self, on: bool);
}

/// Cursor motions the terminal host understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Left,
    Right,
    Up,
    Down,
    LineStart,
    LineEnd,
}

#[derive(Debug, Default)]
struct Document {
    text: Vec<char>,
    cursor: usize,
}

impl Document {
    fn line_start(&self, offset: usize) -> usize {
        self.text[..offset]
            .iter()
            .rposition(|&c| c == '\n')
            .map_or(0, |pos| pos + 1)
    }

    /// End of the line containing `offset`, before any CR LF
    fn line_end(&self, offset: usize) -> usize {
        let end = self.text[offset..]
            .iter()
            .position(|&c| c == '\n')
            .map_or(self.text.len(), |pos| offset + pos);
        if end > offset && self.text.get(end - 1) == Some(&'\r') && end < self.text.len() {
            end - 1
        } else {
            end
        }
    }

    fn column(&self, offset: usize) -> usize {
        offset - self.line_start(offset)
    }
}

/// In-memory document with a single cursor
#[derive(Debug)]
pub struct MemoryEditor {
    id: EditorId,
    doc: Mutex<Document>,
}

impl MemoryEditor {
    pub fn new(id: EditorId) -> Self {
        Self {
            id,
            doc: Mutex::new(Document::default()),
        }
    }

    /// Start with existing content, cursor at the end
    pub fn with_text(id: EditorId, text: &str) -> Self {
        let text: Vec<char> = text.chars().collect();
        let cursor = text.len();
        Self {
            id,
            doc: Mutex::new(Document { text, cursor }),
        }
    }

    fn doc(&self) -> MutexGuard<'_, Document> {
        self.doc.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn text(&self) -> String {
        self.doc().text.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.doc().text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc().text.is_empty()
    }

    /// Cursor as (line, column), both zero based. CR is not counted.
    pub fn line_col(&self) -> (usize, usize) {
        let doc = self.doc();
        let line = doc.text[..doc.cursor].iter().filter(|&&c| c == '\n').count();
        (line, doc.column(doc.cursor))
    }

    /// Host default typing: insert at the cursor and move past it
    pub fn insert_at_cursor(&self, text: &str) {
        let mut doc = self.doc();
        let at = doc.cursor;
        let inserted: Vec<char> = text.chars().collect();
        let count = inserted.len();
        doc.text.splice(at..at, inserted);
        doc.cursor = at + count;
    }

    /// Host default backspace. A CR LF pair goes as one.
    pub fn delete_before_cursor(&self) {
        let mut doc = self.doc();
        let end = doc.cursor;
        if end == 0 {
            return;
        }
        let start = if end >= 2 && doc.text[end - 1] == '\n' && doc.text[end - 2] == '\r' {
            end - 2
        } else {
            end - 1
        };
        doc.text.drain(start..end);
        doc.cursor = start;
    }

    /// Move the cursor as a user would, returning the new offset
    pub fn move_cursor(&self, motion: Motion) -> usize {
        let mut doc = self.doc();
        let cursor = doc.cursor;

        let target = match motion {
            Motion::Left => match cursor {
                0 => 0,
                c if c >= 2 && doc.text[c - 1] == '\n' && doc.text[c - 2] == '\r' => c - 2,
                c => c - 1,
            },
            Motion::Right => match doc.text.get(cursor) {
                None => cursor,
                Some('\r') if doc.text.get(cursor + 1) == Some(&'\n') => cursor + 2,
                Some(_) => cursor + 1,
            },
            Motion::LineStart => doc.line_start(cursor),
            Motion::LineEnd => doc.line_end(cursor),
            Motion::Up => {
                let start = doc.line_start(cursor);
                if start == 0 {
                    cursor
                } else {
                    let column = cursor - start;
                    let prev_start = doc.line_start(start - 1);
                    (prev_start + column).min(doc.line_end(prev_start))
                }
            }
            Motion::Down => {
                let column = doc.column(cursor);
                let end = doc.text[cursor..]
                    .iter()
                    .position(|&c| c == '\n')
                    .map(|pos| cursor + pos);
                match end {
                    Some(newline) => {
                        let next_start = newline + 1;
                        (next_start + column).min(doc.line_end(next_start))
                    }
                    None => cursor,
                }
            }
        };

        doc.cursor = target;
        target
    }

    fn apply_now(&self, edit: Edit) -> Result<(), HostError> {
        let mut doc = self.doc();
        let len = doc.text.len();

        match edit {
            Edit::Insert { offset, text } => {
                if offset > len {
                    return Err(HostError::OutOfRange { offset, len });
                }
                let inserted: Vec<char> = text.chars().collect();
                let count = inserted.len();
                doc.text.splice(offset..offset, inserted);
                if doc.cursor >= offset {
                    doc.cursor += count;
                }
            }
            Edit::Delete { start, end } => {
                if start > end || end > len {
                    return Err(HostError::OutOfRange { offset: end, len });
                }
                doc.text.drain(start..end);
                if doc.cursor >= end {
                    doc.cursor -= end - start;
                } else if doc.cursor > start {
                    doc.cursor = start;
                }
            }
        }

        Ok(())
    }
}

impl Editor for MemoryEditor {
    fn id(&self) -> EditorId {
        self.id
    }

    fn cursor_offset(&self) -> usize {
        self.doc().cursor
    }

    fn set_cursor(&self, offset: usize) {
        let mut doc = self.doc();
        doc.cursor = offset.min(doc.text.len());
    }

    fn apply(&self, edit: Edit) -> impl Future<Output = Result<(), HostError>> + Send {
        let result = self.apply_now(edit);
        async move {
            // Hosts apply edits asynchronously; keep the same suspension point
            tokio::task::yield_now().await;
            result
        }
    }
}
