//! Where text to type comes from besides the user and the LLM

use std::sync::Mutex;

/// System clipboard access. Failures are reported as `None` / `false`;
/// nothing here is fatal.
pub trait Clipboard: Send + Sync {
    fn read_text(&self) -> Option<String>;
    fn write_text(&self, text: &str) -> bool;
}

#[cfg(feature = "clipboard")]
pub struct SystemClipboard;

#[cfg(feature = "clipboard")]
impl Clipboard for SystemClipboard {
    fn read_text(&self) -> Option<String> {
        match arboard::Clipboard::new().and_then(|mut c| c.get_text()) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!(error = %e, "Clipboard read failed");
                None
            }
        }
    }

    fn write_text(&self, text: &str) -> bool {
        match arboard::Clipboard::new().and_then(|mut c| c.set_text(text.to_string())) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Clipboard write failed");
                false
            }
        }
    }
}

/// Process-local clipboard, used when the system one is unavailable
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    text: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: &str) -> Self {
        Self {
            text: Mutex::new(Some(text.to_string())),
        }
    }
}

impl Clipboard for MemoryClipboard {
    fn read_text(&self) -> Option<String> {
        self.text
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn write_text(&self, text: &str) -> bool {
        *self
            .text
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(text.to_string());
        true
    }
}

/// Clipboard for this build: the system one when compiled in
pub fn default_clipboard() -> Box<dyn Clipboard> {
    #[cfg(feature = "clipboard")]
    {
        Box::new(SystemClipboard)
    }
    #[cfg(not(feature = "clipboard"))]
    {
        Box::new(MemoryClipboard::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_clipboard() {
        let clipboard = MemoryClipboard::new();
        assert_eq!(clipboard.read_text(), None);
        assert!(clipboard.write_text("fn main() {}"));
        assert_eq!(clipboard.read_text().as_deref(), Some("fn main() {}"));
    }

    #[test]
    fn test_with_text() {
        let clipboard = MemoryClipboard::with_text("abc");
        assert_eq!(clipboard.read_text().as_deref(), Some("abc"));
    }
}
