//! Byte-level primitives shared by the UBJSON encoder and decoder.
//!
//! - [`EncodeBuffer`]: growable output buffer, optionally flushing into an
//!   [`std::io::Write`] sink, which also tracks open container identities.
//! - [`ByteSource`]: the read contract used by the decoder, implemented by
//!   [`FixedReader`] (in-memory slice), [`PullReader`] (any
//!   [`std::io::Read`], no read-ahead) and [`BufferedReader`] (chunked
//!   reads from a seekable stream, rewound on release).

mod buffered_reader;
mod pull_reader;
mod reader;
mod writer;

pub use buffered_reader::{BufferedReader, MIN_CHUNK_SIZE};
pub use pull_reader::PullReader;
pub use reader::{ByteSource, FixedReader};
pub use writer::{EncodeBuffer, INITIAL_SIZE, SINK_BLOCK_SIZE};
