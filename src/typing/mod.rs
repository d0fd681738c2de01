//! Keystroke-driven replay of a prepared text
//!
//! A session types a source buffer into the host editor, one buffer unit per
//! keystroke the user presses, regardless of which key it was.
//!
//! # Features
//!
//! - **Buffer units**: a line break and the indentation after it go in one
//!   keystroke
//! - **Backspace**: deletes the last emitted char and rewinds the buffer
//! - **Pause / resume**: host keys pass through while paused
//! - **Cursor reconciliation**: replay resumes where it left off once the
//!   cursor returns there

mod buffer;
mod engine;
mod host;
mod interceptor;
mod keystroke;
mod reconcile;

pub use buffer::{LINE_BREAK, SourceBuffer, normalize_line_endings};
pub use engine::{EngineEvent, EngineSettings, PausePoint, SessionStatus, TypingEngine};
pub use host::{Edit, Editor, EditorId, HostError, KeystrokeHook, MemoryEditor, Motion};
pub use interceptor::Disposition;
pub use keystroke::{BACKSPACE, Keystroke};
pub use reconcile::CursorMoved;
