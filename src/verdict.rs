use bytes::{BufMut, Bytes, BytesMut};
use std::fs;
use std::io;
use std::path::Path;

/// Verdict lines in the order they were delivered.
#[derive(Debug, Default)]
pub struct VerdictBuffer {
    lines: Vec<String>,
}

impl VerdictBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Every line followed by `\n`.
    pub fn to_bytes(&self) -> Bytes {
        let capacity = self.lines.iter().map(|line| line.len() + 1).sum();
        let mut buf = BytesMut::with_capacity(capacity);
        for line in &self.lines {
            buf.put_slice(line.as_bytes());
            buf.put_u8(b'\n');
        }
        buf.freeze()
    }

    /// Overwrites `path` with the buffer as it stands.
    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.to_bytes())
    }
}

/// Ends a non-empty verdict with a period unless it already closes with
/// terminal punctuation.
pub fn close_sentence(mut line: String) -> String {
    if !line.is_empty() && !line.ends_with(['.', '!', '?']) {
        line.push('.');
    }
    line
}
