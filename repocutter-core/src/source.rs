//! Line-buffered source over the raw dump stream
//!
//! The dump format interleaves newline-terminated header lines with sized
//! binary blobs, so the reader offers both: `read_line`/`peek`/`push` for
//! the line-oriented parts and `read` for exact byte counts that must not
//! interpret newlines. A line counter is kept for diagnostics only.

use std::io::BufRead;

use crate::error::Result;

/// Byte-accurate reader with one line of pushback
pub struct LineSource<R> {
    reader: R,
    pushed: Option<Vec<u8>>,
    line: u64,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pushed: None,
            line: 0,
        }
    }

    /// Next line including the trailing newline; empty at EOF.
    pub fn read_line(&mut self) -> Result<Vec<u8>> {
        if let Some(line) = self.pushed.take() {
            if !line.is_empty() {
                self.line += 1;
            }
            return Ok(line);
        }
        let mut buf = Vec::new();
        self.reader.read_until(b'\n', &mut buf)?;
        if !buf.is_empty() {
            self.line += 1;
        }
        Ok(buf)
    }

    /// Next line without consuming it; the following `read_line` returns
    /// the same bytes.
    pub fn peek(&mut self) -> Result<Vec<u8>> {
        if self.pushed.is_none() {
            let line = self.read_line()?;
            self.push(line);
        }
        Ok(self.pushed.clone().unwrap_or_default())
    }

    /// Store exactly one line of lookahead. Pushing onto an occupied
    /// buffer is a programming error, not a stream condition.
    pub fn push(&mut self, line: Vec<u8>) {
        assert!(self.pushed.is_none(), "pushback buffer already occupied");
        if !line.is_empty() {
            self.line = self.line.saturating_sub(1);
        }
        self.pushed = Some(line);
    }

    /// Exactly `n` bytes of raw input, newlines uninterpreted.
    pub fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        assert!(
            self.pushed.is_none(),
            "sized read with a pushed line pending"
        );
        let mut buf = vec![0u8; n];
        self.reader.read_exact(&mut buf)?;
        self.line += buf.iter().filter(|&&b| b == b'\n').count() as u64;
        Ok(buf)
    }

    /// Line number of the last line handed out, for error messages.
    pub fn line(&self) -> u64 {
        self.line
    }
}
