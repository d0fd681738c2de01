//! Raw keystroke payloads as delivered by the host editor

/// Reserved payload a host sends for a backspace-class key
pub const BACKSPACE: &str = "\u{8}";

/// A queued keystroke awaiting replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keystroke {
    /// Any key that would have inserted text. The payload is only kept for
    /// logging - replay always emits from the source buffer.
    Insert(String),
    /// Delete the character before the typing cursor
    DeletePrevious,
}

impl Keystroke {
    pub fn from_raw(text: &str) -> Self {
        if text == BACKSPACE {
            Keystroke::DeletePrevious
        } else {
            Keystroke::Insert(text.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw() {
        assert_eq!(Keystroke::from_raw("\u{8}"), Keystroke::DeletePrevious);
        assert_eq!(Keystroke::from_raw("x"), Keystroke::Insert("x".into()));
        assert_eq!(Keystroke::from_raw("\n"), Keystroke::Insert("\n".into()));
        assert_eq!(Keystroke::from_raw(""), Keystroke::Insert(String::new()));
    }
}
