//! Code generation prompt and completion cleanup

use crate::llm::Message;
use crate::typing::normalize_line_endings;

pub const SYSTEM_INSTRUCTIONS: &str = "Generate code for the given programming task.

Provide only the code implementation without comments.
Use properly formatted markdown code blocks with the appropriate language specification.
Ensure the code appears naturally written by a human, avoiding overly structured or robotic patterns.
Modify string outputs (e.g., in print statements) to avoid full English sentences and ignore casing.
";

pub fn build_messages(task: &str) -> Vec<Message> {
    vec![
        Message::system(SYSTEM_INSTRUCTIONS),
        Message::user(format!("Task: {}", task.trim())),
    ]
}

/// Body of the first fenced code block, or the whole text when there is none
pub fn extract_code(completion: &str) -> &str {
    let Some(open) = completion.find("```") else {
        return completion.trim();
    };
    let after_fence = &completion[open + 3..];
    // Skip the language tag line
    let Some(newline) = after_fence.find('\n') else {
        return completion.trim();
    };
    let body = &after_fence[newline + 1..];
    let end = body.find("```").unwrap_or(body.len());
    body[..end].trim_matches(|c| c == '\n' || c == '\r')
}

/// Turn a raw completion into text ready to be typed
pub fn prepare(completion: &str, tab_width: usize) -> String {
    let code = extract_code(completion);
    let code = code.replace('\t', &" ".repeat(tab_width));
    normalize_line_endings(&code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn test_build_messages() {
        let messages = build_messages("  reverse a list ");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "Task: reverse a list");
    }

    #[test]
    fn test_extract_fenced() {
        let completion = "Here you go:\n```python\nprint(1)\nprint(2)\n```\nEnjoy";
        assert_eq!(extract_code(completion), "print(1)\nprint(2)");
    }

    #[test]
    fn test_extract_fence_without_language() {
        assert_eq!(extract_code("```\nx = 1\n```"), "x = 1");
    }

    #[test]
    fn test_extract_unterminated_fence() {
        assert_eq!(extract_code("```rust\nfn main() {}\n"), "fn main() {}");
    }

    #[test]
    fn test_extract_plain() {
        assert_eq!(extract_code("\n  x = 1\n"), "x = 1");
    }

    #[test]
    fn test_extract_keeps_indentation() {
        assert_eq!(extract_code("```py\n    pass\n```"), "    pass");
    }

    #[test]
    fn test_prepare() {
        let completion = "```js\nif (a) {\n\tb()\n}\n```";
        assert_eq!(prepare(completion, 4), "if (a) {\r\n    b()\r\n}");
    }

    #[test]
    fn test_prepare_crlf_input() {
        assert_eq!(prepare("```c\r\nx;\r\ny;\r\n```", 2), "x;\r\ny;");
    }
}
