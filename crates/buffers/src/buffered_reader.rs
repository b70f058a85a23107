//! Buffered reads from a seekable stream.

use std::io::{self, Read, Seek, SeekFrom};

use log::{debug, trace};

use crate::ByteSource;

/// Minimum number of bytes requested from the stream per refill.
pub const MIN_CHUNK_SIZE: usize = 256;

/// Reads a seekable stream in chunks of at least [`MIN_CHUNK_SIZE`] bytes.
///
/// Requests that fit in the current chunk are served as borrowed slices.
/// A request spanning the chunk boundary is assembled in a scratch buffer
/// from the chunk remainder plus a fresh refill.
///
/// Because refills read ahead, the stream ends up positioned past what the
/// decoder consumed. [`release`](ByteSource::release) seeks back by the
/// unused amount so the stream is left exactly after the decoded value. The
/// rewind is attempted once: on the first `release` call or, failing that,
/// when the reader is dropped.
#[derive(Debug)]
pub struct BufferedReader<R: Read + Seek> {
    inner: R,
    /// Most recently fetched chunk.
    chunk: Vec<u8>,
    /// Position within `chunk`.
    x: usize,
    /// Scratch buffer for reads spanning more than one chunk.
    scratch: Vec<u8>,
    total: usize,
    released: bool,
}

impl<R: Read + Seek> BufferedReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            chunk: Vec::new(),
            x: 0,
            scratch: Vec::new(),
            total: 0,
            released: false,
        }
    }

    /// Bytes fetched from the stream but not yet handed out.
    pub fn buffered(&self) -> usize {
        self.chunk.len() - self.x
    }

    fn rewind(&mut self) -> io::Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        let unused = self.buffered();
        self.chunk.clear();
        self.x = 0;
        self.scratch = Vec::new();
        if unused > 0 {
            debug!("rewinding stream by {unused} unused bytes");
            self.inner.seek(SeekFrom::Current(-(unused as i64)))?;
        }
        Ok(())
    }

    /// Fetches a new chunk of at least `want` bytes (or what is left).
    fn refill(&mut self, want: usize) -> io::Result<()> {
        let want = want.max(MIN_CHUNK_SIZE);
        trace!("refilling buffer with up to {want} bytes");
        self.chunk.clear();
        self.x = 0;
        (&mut self.inner)
            .take(want as u64)
            .read_to_end(&mut self.chunk)?;
        Ok(())
    }
}

impl<R: Read + Seek> ByteSource for BufferedReader<R> {
    fn read(&mut self, len: usize) -> io::Result<&[u8]> {
        if len == 0 {
            return Ok(&[]);
        }
        if len <= self.buffered() {
            let x = self.x;
            self.x += len;
            self.total += len;
            return Ok(&self.chunk[x..x + len]);
        }

        // Carry over what is left of the current chunk.
        self.scratch.clear();
        self.scratch.extend_from_slice(&self.chunk[self.x..]);
        let remaining_old = self.scratch.len();
        self.total += remaining_old;
        self.refill(len - remaining_old)?;

        let take = (len - remaining_old).min(self.chunk.len());
        self.scratch.extend_from_slice(&self.chunk[..take]);
        self.x = take;
        self.total += take;
        Ok(&self.scratch)
    }

    fn total_read(&self) -> usize {
        self.total
    }

    fn release(&mut self) -> io::Result<()> {
        self.rewind()
    }
}

impl<R: Read + Seek> Drop for BufferedReader<R> {
    fn drop(&mut self) {
        if let Err(err) = self.rewind() {
            debug!("failed to rewind stream on drop: {err}");
        }
    }
}
