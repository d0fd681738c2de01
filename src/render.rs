//! User-visible notices
//!
//! Anything that wants to tell the user something sends it through [`Ui`];
//! the terminal host owns the receiver and draws the latest notice in the
//! status bar until it expires.

use std::time::{Duration, Instant};

/// How long a notice stays on screen
const NOTICE_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }

    pub fn styled(&self) -> String {
        match self.level {
            NoticeLevel::Info => format!("\x1b[36m{}\x1b[90m", self.text),
            NoticeLevel::Warn => format!("\x1b[33m⚠ {}\x1b[90m", self.text),
            NoticeLevel::Error => format!("\x1b[31m✗ {}\x1b[90m", self.text),
        }
    }
}

#[derive(Debug, Clone)]
pub enum UiEvent {
    Notice(Notice),
    /// Generated text ready to be loaded as the buffer
    Generated(String),
}

#[derive(Debug, Clone)]
pub struct Ui {
    tx: flume::Sender<UiEvent>,
}

impl Ui {
    pub fn new() -> (Self, flume::Receiver<UiEvent>) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, rx)
    }

    fn notice(&self, level: NoticeLevel, text: impl Into<String>) {
        let _ = self.tx.send(UiEvent::Notice(Notice::new(level, text)));
    }

    pub fn info(&self, text: impl Into<String>) {
        self.notice(NoticeLevel::Info, text);
    }

    pub fn warn(&self, text: impl Into<String>) {
        self.notice(NoticeLevel::Warn, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.notice(NoticeLevel::Error, text);
    }

    pub fn generated(&self, text: String) {
        let _ = self.tx.send(UiEvent::Generated(text));
    }
}

/// Latest notice, cleared once it has been visible long enough
#[derive(Debug, Default)]
pub struct NoticeBoard {
    current: Option<(Notice, Instant)>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&mut self, notice: Notice) {
        self.current = Some((notice, Instant::now()));
    }

    /// Current notice, if it has not expired at `now`
    pub fn visible(&mut self, now: Instant) -> Option<&Notice> {
        if let Some((_, posted)) = &self.current {
            if now.duration_since(*posted) >= NOTICE_TTL {
                self.current = None;
            }
        }
        self.current.as_ref().map(|(notice, _)| notice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_sends_notices() {
        let (ui, rx) = Ui::new();
        ui.info("Typing mode activated");
        ui.warn("No text in clipboard");
        ui.error("boom");

        let levels: Vec<_> = rx
            .try_iter()
            .filter_map(|e| match e {
                UiEvent::Notice(n) => Some(n.level),
                UiEvent::Generated(_) => None,
            })
            .collect();
        assert_eq!(levels, vec![NoticeLevel::Info, NoticeLevel::Warn, NoticeLevel::Error]);
    }

    #[test]
    fn test_ui_without_receiver_is_silent() {
        let (ui, rx) = Ui::new();
        drop(rx);
        ui.info("nobody listening");
    }

    #[test]
    fn test_notice_board_expires() {
        let mut board = NoticeBoard::new();
        let start = Instant::now();
        board.post(Notice::new(NoticeLevel::Info, "Typing complete"));

        assert_eq!(board.visible(start).map(|n| n.text.as_str()), Some("Typing complete"));
        assert!(board.visible(start + NOTICE_TTL + Duration::from_millis(1)).is_none());
        assert!(board.visible(start).is_none());
    }

    #[test]
    fn test_styled_marks_level() {
        assert!(Notice::new(NoticeLevel::Warn, "x").styled().contains('⚠'));
        assert!(Notice::new(NoticeLevel::Error, "x").styled().contains('✗'));
    }
}
