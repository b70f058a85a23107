//! Unbuffered reads from a stream.

use std::io::{self, Read};

use crate::ByteSource;

/// Pulls exactly as many bytes as requested from a [`Read`] on every call.
///
/// Nothing is buffered across calls, so the stream is never read past the
/// end of the decoded value, but each read goes to the underlying stream.
/// A request is only answered short once the stream reports end of input.
#[derive(Debug)]
pub struct PullReader<R> {
    inner: R,
    chunk: Vec<u8>,
    total: usize,
}

impl<R: Read> PullReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            chunk: Vec::new(),
            total: 0,
        }
    }
}

impl<R: Read> ByteSource for PullReader<R> {
    fn read(&mut self, len: usize) -> io::Result<&[u8]> {
        self.chunk.clear();
        if len == 0 {
            return Ok(&self.chunk);
        }
        // Growth follows the bytes actually produced, not the requested length.
        (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut self.chunk)?;
        self.total += self.chunk.len();
        Ok(&self.chunk)
    }

    fn total_read(&self) -> usize {
        self.total
    }
}
