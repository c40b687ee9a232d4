use crate::error::{Error, Result};
use crate::stream::{Compressor, Decompressor, Feed, Finish};
use std::fmt::Debug;

pub mod brotli;
pub mod lz4;
pub mod lzma;
pub mod snappy;
pub mod uncompressed;
pub mod zstd;

/// A compression algorithm bound to a fixed level.
///
/// Codecs are immutable and can be shared between threads: one-shot calls
/// allocate their own scratch state. Streaming sessions are opened per
/// logical stream with [`Codec::open_compressor`] and [`Codec::open_decompressor`].
pub trait Codec: Debug + Send + Sync {
    /// Stable identifier, also used as the registry key.
    fn name(&self) -> &'static str;

    /// Resolved compression level, or `None` for codecs without levels.
    fn level(&self) -> Option<i32> {
        None
    }

    /// Upper bound on the compressed size of `input_len` bytes.
    fn max_compressed_len(&self, input_len: usize) -> usize;

    /// Compresses `src` into `dest` and returns the number of bytes written.
    ///
    /// Fails with [`Error::BufferTooSmall`] when `dest` cannot hold the
    /// output. The call is atomic: a retry must start over with a larger buffer.
    fn compress(&self, src: &[u8], dest: &mut [u8]) -> Result<usize>;

    /// Decompresses `src` into `dest` and returns the number of bytes written.
    fn decompress(&self, src: &[u8], dest: &mut [u8]) -> Result<usize>;

    fn supports_streaming(&self) -> bool {
        false
    }

    fn open_compressor(&self) -> Result<Compressor> {
        Err(Error::StreamingUnsupported(self.name()))
    }

    fn open_decompressor(&self) -> Result<Decompressor> {
        Err(Error::StreamingUnsupported(self.name()))
    }
}

/// Incremental compression back-end driven by a [`Compressor`] session.
pub trait Encoder: Send {
    /// Consumes as much of `src` as possible, writing compressed bytes to `dest`.
    fn encode(&mut self, src: &[u8], dest: &mut [u8]) -> Result<Feed>;

    /// Emits pending output so that everything consumed so far is decodable.
    /// Must be repeated until it reports completion.
    fn flush(&mut self, dest: &mut [u8]) -> Result<Finish>;

    /// Writes the remaining output and the end-of-stream marker.
    /// Must be repeated until it reports completion.
    fn finish(&mut self, dest: &mut [u8]) -> Result<Finish>;
}

/// Incremental decompression back-end driven by a [`Decompressor`] session.
pub trait Decoder: Send {
    fn decode(&mut self, src: &[u8], dest: &mut [u8]) -> Result<Feed>;

    /// Writes buffered output without consuming input. `complete` is set once
    /// nothing is pending.
    fn drain(&mut self, dest: &mut [u8]) -> Result<Finish>;

    /// Whether the end-of-stream marker has been decoded.
    fn is_finished(&self) -> bool;
}

/// Runs a compressor that insists on `bound` bytes of output space.
///
/// A shorter `dest` is served from a scratch buffer, so the call only fails
/// when the actual output does not fit.
pub(crate) fn compress_within(
    dest: &mut [u8],
    bound: usize,
    compress: impl FnOnce(&mut [u8]) -> Result<usize>,
) -> Result<usize> {
    if dest.len() >= bound {
        return compress(dest);
    }
    let mut scratch = vec![0u8; bound];
    let len = compress(&mut scratch)?;
    if len > dest.len() {
        return Err(Error::BufferTooSmall {
            provided: dest.len(),
            required: Some(len),
        });
    }
    dest[..len].copy_from_slice(&scratch[..len]);
    Ok(len)
}

/// Maps a length reported as zero on overflow to a saturated bound.
pub(crate) fn saturate_bound(input_len: usize, bound: usize) -> usize {
    if bound == 0 && input_len > 0 {
        usize::MAX
    } else {
        bound
    }
}
