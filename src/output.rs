//! Terminal-style accumulation of streamed process output.

use std::fmt;

const BACKSPACE: char = '\u{8}';

type Publisher = Box<dyn FnMut(&str) + Send>;

/// Accumulates streamed text, honoring leading backspaces.
///
/// Installers redraw progress lines by emitting backspaces. A chunk that
/// starts with `n` backspace characters removes the last `n` characters of
/// the buffer (never more than the buffer holds) before the rest of the chunk
/// is appended. No other control sequences are interpreted.
///
/// Every change is handed to the publisher, if any, before `append` returns.
///
/// # Example
///
/// ```rust
/// use polyglot_check::OutputSink;
///
/// let mut sink = OutputSink::new();
/// sink.append("abc");
/// sink.append("\u{8}\u{8}XY");
/// assert_eq!(sink.text(), "aXY");
/// ```
#[derive(Default)]
pub struct OutputSink {
    buffer: String,
    publisher: Option<Publisher>,
}

impl OutputSink {
    /// A sink that only accumulates.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that publishes the whole buffer after each change.
    pub fn with_publisher<F>(publisher: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        Self {
            buffer: String::new(),
            publisher: Some(Box::new(publisher)),
        }
    }

    /// Replace the buffer with `text`.
    pub fn reset(&mut self, text: &str) {
        self.buffer.clear();
        self.buffer.push_str(text);
        self.publish();
    }

    /// Apply one chunk of output.
    pub fn append(&mut self, chunk: &str) {
        let backspaces = chunk.chars().take_while(|c| *c == BACKSPACE).count();
        for _ in 0..backspaces {
            if self.buffer.pop().is_none() {
                break;
            }
        }
        // backspace is a single byte, so the count is also a byte offset
        self.buffer.push_str(&chunk[backspaces..]);
        self.publish();
    }

    /// The accumulated text.
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Consume the sink, returning the accumulated text.
    pub fn into_text(self) -> String {
        self.buffer
    }

    fn publish(&mut self) {
        if let Some(publisher) = self.publisher.as_mut() {
            publisher(&self.buffer);
        }
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink")
            .field("buffer", &self.buffer)
            .field("publisher", &self.publisher.is_some())
            .finish()
    }
}

impl fmt::Write for OutputSink {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.append(s);
        Ok(())
    }
}
