//! Status bar for the terminal host
//!
//! The indicator is a pure function of the session status and the
//! generation flag; the bar only decorates it.

use crate::render::Notice;
use crate::typing::SessionStatus;
use unicode_width::UnicodeWidthStr;

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// What the status bar shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Off,
    Typing,
    Paused,
    Generating,
}

/// Transport buttons; present only while a session is live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transport {
    /// "Pause" while typing, "Resume" while paused
    pub pause_label: &'static str,
}

impl Indicator {
    /// Generation wins over the session status
    pub fn resolve(status: SessionStatus, generating: bool) -> Self {
        if generating {
            return Indicator::Generating;
        }
        match status {
            SessionStatus::Running => Indicator::Typing,
            SessionStatus::Paused => Indicator::Paused,
            SessionStatus::Stopped => Indicator::Off,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Indicator::Off => "off",
            Indicator::Typing => "typing",
            Indicator::Paused => "paused",
            Indicator::Generating => "generating",
        }
    }

    pub fn transport(&self) -> Option<Transport> {
        match self {
            Indicator::Typing => Some(Transport {
                pause_label: "Pause",
            }),
            Indicator::Paused => Some(Transport {
                pause_label: "Resume",
            }),
            Indicator::Off | Indicator::Generating => None,
        }
    }

    fn styled(&self, frame: usize) -> String {
        match self {
            Indicator::Off => "\x1b[90m⌨ off".to_string(),
            Indicator::Typing => "\x1b[94m⌨ typing\x1b[90m".to_string(),
            Indicator::Paused => "\x1b[33m⏸ paused\x1b[90m".to_string(),
            Indicator::Generating => {
                let spinner = SPINNER[frame % SPINNER.len()];
                format!("\x1b[93m{} generating\x1b[90m", spinner)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusBarState {
    pub indicator: Indicator,
    pub spin_frame: usize,
    /// (typed, total) chars of the current buffer
    pub progress: Option<(usize, usize)>,
    pub notice: Option<Notice>,
}

impl Default for StatusBarState {
    fn default() -> Self {
        Self {
            indicator: Indicator::Off,
            spin_frame: 0,
            progress: None,
            notice: None,
        }
    }
}

impl StatusBarState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_spinner(&mut self) {
        self.spin_frame = self.spin_frame.wrapping_add(1);
    }

    fn progress_string(&self) -> Option<String> {
        let (typed, total) = self.progress?;
        (total > 0).then(|| format!("{}/{}", typed, total))
    }

    fn transport_string(&self) -> Option<String> {
        let transport = self.indicator.transport()?;
        Some(format!(
            "^P {}  ^X Stop  ^R Restart",
            transport.pause_label
        ))
    }

    /// Single status line, centered when a width is given
    pub fn render_status(&self, term_width: Option<usize>) -> String {
        let mut parts = vec![self.indicator.styled(self.spin_frame)];
        parts.extend(self.progress_string());
        parts.extend(self.transport_string());
        if let Some(notice) = &self.notice {
            parts.push(notice.styled());
        }
        let content = parts.join(" │ ");

        match term_width {
            Some(width) => {
                let visible = strip_ansi(&content).width();
                let padding = width.saturating_sub(visible) / 2;
                format!("\x1b[90m{}{}\x1b[0m", " ".repeat(padding), content)
            }
            None => format!("{}\x1b[0m", content),
        }
    }
}

/// Drop CSI escape sequences so only printable text is measured
fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::NoticeLevel;

    #[test]
    fn test_resolve() {
        assert_eq!(Indicator::resolve(SessionStatus::Stopped, false), Indicator::Off);
        assert_eq!(Indicator::resolve(SessionStatus::Running, false), Indicator::Typing);
        assert_eq!(Indicator::resolve(SessionStatus::Paused, false), Indicator::Paused);
    }

    #[test]
    fn test_generating_takes_priority() {
        for status in [SessionStatus::Stopped, SessionStatus::Running, SessionStatus::Paused] {
            assert_eq!(Indicator::resolve(status, true), Indicator::Generating);
        }
    }

    #[test]
    fn test_transport_visibility() {
        assert_eq!(Indicator::Off.transport(), None);
        assert_eq!(Indicator::Generating.transport(), None);
        assert_eq!(Indicator::Typing.transport().map(|t| t.pause_label), Some("Pause"));
        assert_eq!(Indicator::Paused.transport().map(|t| t.pause_label), Some("Resume"));
    }

    #[test]
    fn test_render_includes_progress_and_transport() {
        let state = StatusBarState {
            indicator: Indicator::Paused,
            progress: Some((3, 10)),
            ..StatusBarState::default()
        };
        let line = strip_ansi(&state.render_status(None));
        assert!(line.contains("paused"));
        assert!(line.contains("3/10"));
        assert!(line.contains("^P Resume"));
    }

    #[test]
    fn test_render_off_hides_transport() {
        let state = StatusBarState {
            notice: Some(Notice::new(NoticeLevel::Warn, "No text in clipboard")),
            ..StatusBarState::default()
        };
        let line = strip_ansi(&state.render_status(None));
        assert!(line.contains("off"));
        assert!(!line.contains("Stop"));
        assert!(line.contains("No text in clipboard"));
    }

    #[test]
    fn test_render_centers() {
        let state = StatusBarState::default();
        let line = strip_ansi(&state.render_status(Some(40)));
        let visible = "⌨ off".width();
        assert!(line.starts_with(&" ".repeat((40 - visible) / 2)));
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[93mhi\x1b[0m there"), "hi there");
    }
}
