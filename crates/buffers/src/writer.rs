//! Growable encode buffer with optional flushing to an external sink.

use std::collections::HashSet;
use std::fmt;
use std::io::{self, Write};

use log::trace;

/// Initial capacity when accumulating in memory.
pub const INITIAL_SIZE: usize = 64;
/// Block size when writing through a sink, i.e. the minimum number of bytes
/// collected before the sink is called.
pub const SINK_BLOCK_SIZE: usize = 256;

/// A byte sink used by the encoder.
///
/// Without a sink the buffer owns a single block which doubles in size
/// whenever a write does not fit, and [`finalize`](Self::finalize) returns
/// exactly the written bytes. With a sink, bytes are collected into a block
/// of [`SINK_BLOCK_SIZE`] and handed to the sink every time the block fills
/// up; `finalize` flushes whatever is left.
///
/// The buffer also tracks the identities of the containers currently being
/// traversed so the encoder can detect circular references.
///
/// # Example
///
/// ```
/// use ubjson_buffers::EncodeBuffer;
///
/// let mut buffer = EncodeBuffer::new();
/// buffer.u8(b'[').unwrap();
/// buffer.write(b"U\x01").unwrap();
/// buffer.u8(b']').unwrap();
/// assert_eq!(buffer.finalize().unwrap(), Some(b"[U\x01]".to_vec()));
/// ```
pub struct EncodeBuffer<'w> {
    /// Backing storage, its length is the current capacity.
    uint8: Vec<u8>,
    /// Current cursor position.
    x: usize,
    sink: Option<&'w mut dyn Write>,
    /// Containers currently being encoded.
    markers: HashSet<usize>,
}

impl Default for EncodeBuffer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EncodeBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodeBuffer")
            .field("capacity", &self.uint8.len())
            .field("position", &self.x)
            .field("sink", &self.sink.is_some())
            .field("open_containers", &self.markers.len())
            .finish()
    }
}

impl<'w> EncodeBuffer<'w> {
    /// Creates an in-memory buffer.
    pub fn new() -> Self {
        Self {
            uint8: vec![0u8; INITIAL_SIZE],
            x: 0,
            sink: None,
            markers: HashSet::new(),
        }
    }

    /// Creates a buffer which periodically flushes into `sink`.
    pub fn with_sink(sink: &'w mut dyn Write) -> Self {
        Self {
            uint8: vec![0u8; SINK_BLOCK_SIZE],
            x: 0,
            sink: Some(sink),
            markers: HashSet::new(),
        }
    }

    /// Number of bytes written since creation or the last flush.
    pub fn position(&self) -> usize {
        self.x
    }

    /// Current capacity of the backing block.
    pub fn capacity(&self) -> usize {
        self.uint8.len()
    }

    /// Writes a single byte.
    #[inline]
    pub fn u8(&mut self, val: u8) -> io::Result<()> {
        self.write(&[val])
    }

    /// Writes a byte slice, growing or flushing as required.
    pub fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        let length = chunk.len();
        if length == 0 {
            return Ok(());
        }
        if self.sink.is_none() {
            self.ensure_capacity(length);
            self.uint8[self.x..self.x + length].copy_from_slice(chunk);
            self.x += length;
            return Ok(());
        }
        // Fit the whole chunk first, then hand the full block over.
        if length > self.uint8.len() - self.x {
            self.uint8.resize(self.x + length, 0);
        }
        self.uint8[self.x..self.x + length].copy_from_slice(chunk);
        self.x += length;
        if self.x >= self.uint8.len() {
            self.flush_block()?;
        }
        Ok(())
    }

    /// Doubles the block until `capacity` more bytes fit.
    fn ensure_capacity(&mut self, capacity: usize) {
        let required = self.x + capacity;
        let mut new_size = self.uint8.len().max(1);
        if required <= new_size {
            return;
        }
        while new_size < required {
            new_size *= 2;
        }
        self.uint8.resize(new_size, 0);
    }

    fn flush_block(&mut self) -> io::Result<()> {
        if let Some(sink) = self.sink.as_mut() {
            trace!("flushing {} bytes to sink", self.x);
            sink.write_all(&self.uint8[..self.x])?;
            // reuse the block, dropping any growth from an oversized chunk
            self.uint8.truncate(SINK_BLOCK_SIZE);
            self.x = 0;
        }
        Ok(())
    }

    /// Marks a container as being encoded.
    ///
    /// Returns `false` if the identity is already present, i.e. the container
    /// (directly or indirectly) contains itself.
    pub fn enter(&mut self, identity: usize) -> bool {
        self.markers.insert(identity)
    }

    /// Removes a container identity added by [`enter`](Self::enter).
    pub fn leave(&mut self, identity: usize) {
        self.markers.remove(&identity);
    }

    /// Returns `true` while `identity` is being encoded.
    pub fn is_open(&self, identity: usize) -> bool {
        self.markers.contains(&identity)
    }

    /// Completes the buffer.
    ///
    /// In memory mode returns the written bytes, truncated to their exact
    /// length. In sink mode flushes the remainder (if any) and returns `None`.
    pub fn finalize(mut self) -> io::Result<Option<Vec<u8>>> {
        if self.sink.is_none() {
            self.uint8.truncate(self.x);
            return Ok(Some(std::mem::take(&mut self.uint8)));
        }
        if self.x > 0 {
            self.flush_block()?;
        }
        Ok(None)
    }
}
