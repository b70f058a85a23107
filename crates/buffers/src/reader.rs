//! Read strategies used by the decoder.

use std::io;

/// A source of bytes for the decoder.
///
/// `read(n)` returns at most `n` bytes. A shorter result means the input
/// ran out: an empty slice signals end of input, a non-empty short slice a
/// partial read. The returned slice is only valid until the next call.
pub trait ByteSource {
    /// Reads up to `len` bytes.
    fn read(&mut self, len: usize) -> io::Result<&[u8]>;

    /// Total number of bytes handed out so far.
    fn total_read(&self) -> usize;

    /// Gives back any resources tied to the underlying input.
    ///
    /// Called once decoding has finished, successfully or not.
    fn release(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read(&mut self, len: usize) -> io::Result<&[u8]> {
        (**self).read(len)
    }

    fn total_read(&self) -> usize {
        (**self).total_read()
    }

    fn release(&mut self) -> io::Result<()> {
        (**self).release()
    }
}

/// Reads from a single in-memory byte slice without copying.
///
/// # Example
///
/// ```
/// use ubjson_buffers::{ByteSource, FixedReader};
///
/// let data = [0x01, 0x02, 0x03];
/// let mut reader = FixedReader::new(&data);
///
/// assert_eq!(reader.read(2).unwrap(), &[0x01, 0x02]);
/// assert_eq!(reader.read(2).unwrap(), &[0x03]);
/// assert!(reader.read(1).unwrap().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct FixedReader<'a> {
    /// The underlying byte slice.
    pub uint8: &'a [u8],
    /// Current cursor position.
    pub x: usize,
}

impl<'a> FixedReader<'a> {
    /// Creates a new reader for the given byte slice.
    pub fn new(uint8: &'a [u8]) -> Self {
        Self { uint8, x: 0 }
    }

    /// Returns the number of remaining bytes.
    pub fn size(&self) -> usize {
        self.uint8.len() - self.x
    }

    /// Returns a subarray of at most `size` bytes and advances the cursor.
    pub fn buf(&mut self, size: usize) -> &'a [u8] {
        let x = self.x;
        let end = x + size.min(self.size());
        self.x = end;
        &self.uint8[x..end]
    }
}

impl ByteSource for FixedReader<'_> {
    fn read(&mut self, len: usize) -> io::Result<&[u8]> {
        Ok(self.buf(len))
    }

    fn total_read(&self) -> usize {
        self.x
    }
}
