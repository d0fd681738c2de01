//! Source buffer - the text a typing session replays
//!
//! Every line break is normalized to CR LF so that one buffer char always
//! maps to one document offset. Indexing is by `char`, never by byte.

/// Line break used by every normalized buffer
pub const LINE_BREAK: &str = "\r\n";

/// Immutable, normalized text for one typing session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceBuffer {
    chars: Vec<char>,
}

impl SourceBuffer {
    /// Normalize `text` and store it as a char sequence
    pub fn new(text: &str) -> Self {
        Self {
            chars: normalize_line_endings(text).chars().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// The chars one keystroke at `index` emits.
    ///
    /// A CR LF pair is emitted as a whole, and a line break swallows the
    /// spaces and tabs that follow it so indentation lands in the same edit.
    /// Returns `None` once `index` reaches the end of the buffer.
    pub fn unit_at(&self, index: usize) -> Option<&[char]> {
        let first = *self.chars.get(index)?;

        let mut end = match (first, self.chars.get(index + 1)) {
            ('\r', Some('\n')) => index + 2,
            ('\n', _) | ('\r', _) => index + 1,
            _ => return self.chars.get(index..=index),
        };

        while matches!(self.chars.get(end), Some(' ' | '\t')) {
            end += 1;
        }

        self.chars.get(index..end)
    }
}

impl std::fmt::Display for SourceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for c in &self.chars {
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// Rewrite LF, CR and CR LF line breaks as CR LF
pub fn normalize_line_endings(text: &str) -> String {
    let mut result = String::with_capacity(text.len() + text.len() / 16);
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                result.push_str(LINE_BREAK);
            }
            '\n' => result.push_str(LINE_BREAK),
            _ => result.push(c),
        }
    }

    result
}
