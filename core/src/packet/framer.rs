use log::warn;

/// Longest run of bytes kept while waiting for a terminator.
pub const MAX_LINE_BYTES: usize = 4096;

/// Splits an arbitrary byte stream into text lines.
///
/// Bytes are buffered until `\n`; the completed line is decoded lossily and
/// trimmed, so `\r\n` terminated input frames the same as `\n`. Empty lines are
/// swallowed.
pub struct LineFramer {
    pending: Vec<u8>,
    overflowed: bool,
    max_line: usize,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::with_limit(MAX_LINE_BYTES)
    }

    pub fn with_limit(max_line: usize) -> Self {
        Self {
            pending: Vec::with_capacity(128),
            overflowed: false,
            max_line: max_line.max(1),
        }
    }

    /// Feeds a chunk and returns every line it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' {
                if self.overflowed {
                    self.overflowed = false;
                } else if let Some(line) = self.take_line() {
                    lines.push(line);
                }
                self.pending.clear();
                continue;
            }
            if self.overflowed {
                continue;
            }
            if self.pending.len() >= self.max_line {
                warn!(
                    "discarding unterminated line longer than {} bytes",
                    self.max_line
                );
                self.pending.clear();
                self.overflowed = true;
                continue;
            }
            self.pending.push(byte);
        }
        lines
    }

    /// Bytes waiting for a terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Flushes the unterminated tail once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        let line = if self.overflowed {
            None
        } else {
            self.take_line()
        };
        self.reset();
        line
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.overflowed = false;
    }

    fn take_line(&self) -> Option<String> {
        let text = String::from_utf8_lossy(&self.pending);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}
