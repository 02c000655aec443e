//! Multi-line input assembly.
//!
//! A line ending in a single backslash continues onto the next line; the backslash is replaced
//! by a newline.  A doubled backslash at the end of a line is a literal backslash.

/// Accumulates continued lines into one message.
#[derive(Debug, Default)]
pub struct InputBuffer {
    lines: Vec<String>,
}

impl InputBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a continued line is waiting for more input.
    pub fn is_continuing(&self) -> bool {
        !self.lines.is_empty()
    }

    /// The prompt to show for the next line.
    pub fn prompt(&self) -> &'static str {
        if self.is_continuing() { "... " } else { "You: " }
    }

    /// Feeds one line; returns the complete input once the line does not continue.
    pub fn push(&mut self, line: &str) -> Option<String> {
        match continuation(line) {
            Some(head) => {
                self.lines.push(head.to_string());
                None
            }
            None => {
                let line = line.strip_suffix("\\\\").map_or_else(
                    || line.to_string(),
                    |head| format!("{head}\\"),
                );
                self.lines.push(line);
                Some(std::mem::take(&mut self.lines).join("\n"))
            }
        }
    }

    /// Discards any partial input.
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

fn continuation(line: &str) -> Option<&str> {
    let head = line.strip_suffix('\\')?;
    if head.ends_with('\\') {
        None
    } else {
        Some(head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line() {
        let mut buffer = InputBuffer::new();
        assert_eq!(buffer.prompt(), "You: ");
        assert_eq!(buffer.push("hello"), Some("hello".to_string()));
        assert!(!buffer.is_continuing());
    }

    #[test]
    fn continued_lines_join_with_newlines() {
        let mut buffer = InputBuffer::new();
        assert_eq!(buffer.push("first\\"), None);
        assert!(buffer.is_continuing());
        assert_eq!(buffer.prompt(), "... ");
        assert_eq!(buffer.push("second\\"), None);
        assert_eq!(
            buffer.push("third"),
            Some("first\nsecond\nthird".to_string())
        );
        assert!(!buffer.is_continuing());
    }

    #[test]
    fn doubled_backslash_is_literal() {
        let mut buffer = InputBuffer::new();
        assert_eq!(buffer.push("C:\\\\"), Some("C:\\".to_string()));
    }

    #[test]
    fn clear_discards_partial_input() {
        let mut buffer = InputBuffer::new();
        buffer.push("draft\\");
        buffer.clear();
        assert_eq!(buffer.push("fresh"), Some("fresh".to_string()));
    }
}
