//! Output buffer sizing and the retry loops around it.
//!
//! One-shot calls are atomic: when a codec reports [`Error::BufferTooSmall`]
//! the whole call is repeated with a strictly larger buffer. Streaming calls
//! keep their progress: the caller drains the output buffer and calls again.
//! The helpers here implement both loops on top of growable `Vec<u8>` outputs.

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::stream::{Compressor, Decompressor};

pub const DEFAULT_INITIAL_LEN: usize = 64 * 1024;
pub const DEFAULT_LIMIT: usize = 1 << 30;

/// Scratch buffer length used by the streaming helpers.
pub const DEFAULT_SCRATCH_LEN: usize = 16 * 1024;

/// How one-shot decompression grows its output buffer between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthPolicy {
    pub initial: usize,
    pub factor: usize,
    /// Largest buffer that will be attempted.
    pub limit: usize,
}

impl Default for GrowthPolicy {
    fn default() -> Self {
        GrowthPolicy {
            initial: DEFAULT_INITIAL_LEN,
            factor: 2,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl GrowthPolicy {
    /// The buffer length to try after `current` was too small, or `None`
    /// once the limit would be exceeded. A known `required` length is used
    /// directly when it is larger than `current`.
    pub fn next_len(&self, current: usize, required: Option<usize>) -> Option<usize> {
        let next = match required {
            Some(required) if required > current => required,
            _ => current
                .saturating_mul(self.factor.max(2))
                .max(current.saturating_add(1)),
        };
        (next <= self.limit).then_some(next)
    }
}

/// Compresses `input` into a buffer sized by [`Codec::max_compressed_len`].
pub fn compress_to_vec(codec: &dyn Codec, input: &[u8]) -> Result<Vec<u8>> {
    let mut out = vec![0u8; codec.max_compressed_len(input.len())];
    let len = codec.compress(input, &mut out)?;
    out.truncate(len);
    Ok(out)
}

/// Decompresses `input` when the decompressed length is not known up front.
pub fn decompress_to_vec(
    codec: &dyn Codec,
    input: &[u8],
    policy: &GrowthPolicy,
) -> Result<Vec<u8>> {
    let mut out = vec![0u8; policy.initial.min(policy.limit)];
    loop {
        match codec.decompress(input, &mut out) {
            Ok(len) => {
                out.truncate(len);
                return Ok(out);
            }
            Err(Error::BufferTooSmall { provided, required }) => {
                match policy.next_len(out.len(), required) {
                    Some(next) => {
                        log::trace!(
                            "{} output of {} bytes too small, retrying with {}",
                            codec.name(),
                            out.len(),
                            next
                        );
                        out.resize(next, 0);
                    }
                    None => return Err(Error::BufferTooSmall { provided, required }),
                }
            }
            Err(e) => return Err(e),
        }
    }
}

fn check_scratch(scratch: &[u8]) -> Result<()> {
    if scratch.is_empty() {
        return Err(Error::too_small(0));
    }
    Ok(())
}

/// Feeds all of `input`, appending compressed output to `out`.
pub fn drive_feed(
    compressor: &mut Compressor,
    mut input: &[u8],
    scratch: &mut [u8],
    out: &mut Vec<u8>,
) -> Result<()> {
    check_scratch(scratch)?;
    loop {
        let feed = compressor.feed(input, scratch)?;
        out.extend_from_slice(&scratch[..feed.produced]);
        input = &input[feed.consumed..];
        if input.is_empty() && !feed.needs_more_output {
            return Ok(());
        }
    }
}

/// Calls [`Compressor::finish`] until the stream is complete.
pub fn drive_finish(
    compressor: &mut Compressor,
    scratch: &mut [u8],
    out: &mut Vec<u8>,
) -> Result<()> {
    check_scratch(scratch)?;
    loop {
        let finish = compressor.finish(scratch)?;
        out.extend_from_slice(&scratch[..finish.produced]);
        if finish.complete {
            return Ok(());
        }
    }
}

/// Decompresses all of `input`, appending output to `out`.
pub fn drive_decompress_chunk(
    decompressor: &mut Decompressor,
    mut input: &[u8],
    scratch: &mut [u8],
    out: &mut Vec<u8>,
) -> Result<()> {
    check_scratch(scratch)?;
    loop {
        let feed = decompressor.decompress_chunk(input, scratch)?;
        out.extend_from_slice(&scratch[..feed.produced]);
        input = &input[feed.consumed..];
        if input.is_empty() && !feed.needs_more_output {
            return Ok(());
        }
    }
}

/// Calls [`Decompressor::finish_decompress`] until the stream is complete.
pub fn drive_finish_decompress(
    decompressor: &mut Decompressor,
    scratch: &mut [u8],
    out: &mut Vec<u8>,
) -> Result<()> {
    check_scratch(scratch)?;
    loop {
        let finish = decompressor.finish_decompress(scratch)?;
        out.extend_from_slice(&scratch[..finish.produced]);
        if finish.complete {
            return Ok(());
        }
    }
}

/// Compresses `input` through a streaming session, submitting it in
/// `chunk_len` pieces and draining through a `scratch_len` buffer.
pub fn compress_streaming(
    codec: &dyn Codec,
    input: &[u8],
    chunk_len: usize,
    scratch_len: usize,
) -> Result<Vec<u8>> {
    let mut compressor = codec.open_compressor()?;
    let mut scratch = vec![0u8; scratch_len];
    let mut out = Vec::new();
    for chunk in input.chunks(chunk_len.max(1)) {
        drive_feed(&mut compressor, chunk, &mut scratch, &mut out)?;
    }
    drive_finish(&mut compressor, &mut scratch, &mut out)?;
    Ok(out)
}

/// Streaming counterpart of [`decompress_to_vec`].
pub fn decompress_streaming(
    codec: &dyn Codec,
    input: &[u8],
    chunk_len: usize,
    scratch_len: usize,
) -> Result<Vec<u8>> {
    let mut decompressor = codec.open_decompressor()?;
    let mut scratch = vec![0u8; scratch_len];
    let mut out = Vec::new();
    for chunk in input.chunks(chunk_len.max(1)) {
        drive_decompress_chunk(&mut decompressor, chunk, &mut scratch, &mut out)?;
    }
    drive_finish_decompress(&mut decompressor, &mut scratch, &mut out)?;
    Ok(out)
}
