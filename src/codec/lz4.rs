use crate::codec::{compress_within, Codec};
use crate::error::{Error, Result};
use crate::level::Levels;
use ::lz4::block::{self, CompressionMode};
use byteorder::{ByteOrder, LittleEndian};

pub const NAME: &str = "lz4";
pub const DEFAULT_LEVEL: i32 = 0;

/// Length of the little-endian decompressed-size prefix.
const SIZE_PREFIX_LEN: usize = 4;

/// Zero size prefix followed by a lone end-of-block token.
const EMPTY_BLOCK: [u8; SIZE_PREFIX_LEN + 1] = [0; SIZE_PREFIX_LEN + 1];

/// Negative levels select the fast mode with that acceleration, positive
/// levels select high compression.
pub fn levels() -> Levels {
    Levels::Range {
        min: -65537,
        max: 12,
        default: DEFAULT_LEVEL,
    }
}

/// LZ4 block format prefixed with the decompressed size.
///
/// Streaming is not supported.
#[derive(Debug, Clone, Copy)]
pub struct Lz4 {
    level: i32,
}

impl Lz4 {
    pub fn new(level: Option<i32>) -> Result<Self> {
        let level = levels().resolve(NAME, level)?.unwrap_or(DEFAULT_LEVEL);
        Ok(Lz4 { level })
    }

    fn mode(&self) -> CompressionMode {
        match self.level {
            i32::MIN..=-1 => CompressionMode::FAST(-self.level),
            0 => CompressionMode::DEFAULT,
            _ => CompressionMode::HIGHCOMPRESSION(self.level),
        }
    }
}

impl Codec for Lz4 {
    fn name(&self) -> &'static str {
        NAME
    }

    fn level(&self) -> Option<i32> {
        Some(self.level)
    }

    fn max_compressed_len(&self, input_len: usize) -> usize {
        block::compress_bound(input_len)
            .map(|bound| bound.saturating_add(SIZE_PREFIX_LEN))
            .unwrap_or(usize::MAX)
    }

    fn compress(&self, src: &[u8], dest: &mut [u8]) -> Result<usize> {
        // The optimal parser used above level 9 crashes on empty input.
        if src.is_empty() {
            if dest.len() < EMPTY_BLOCK.len() {
                return Err(Error::BufferTooSmall {
                    provided: dest.len(),
                    required: Some(EMPTY_BLOCK.len()),
                });
            }
            dest[..EMPTY_BLOCK.len()].copy_from_slice(&EMPTY_BLOCK);
            return Ok(EMPTY_BLOCK.len());
        }
        let bound = self.max_compressed_len(src.len());
        compress_within(dest, bound, |out| {
            block::compress_to_buffer(src, Some(self.mode()), true, out)
                .map_err(|e| Error::codec(NAME, e.to_string()))
        })
    }

    fn decompress(&self, src: &[u8], dest: &mut [u8]) -> Result<usize> {
        if src.len() < SIZE_PREFIX_LEN {
            return Err(Error::corrupt(NAME, "missing size prefix"));
        }
        let expected = LittleEndian::read_u32(&src[..SIZE_PREFIX_LEN]) as usize;
        if expected > i32::MAX as usize {
            return Err(Error::corrupt(NAME, "size prefix out of range"));
        }
        if expected > dest.len() {
            return Err(Error::BufferTooSmall {
                provided: dest.len(),
                required: Some(expected),
            });
        }
        let len = block::decompress_to_buffer(src, None, dest)
            .map_err(|e| Error::corrupt(NAME, e.to_string()))?;
        if len != expected {
            return Err(Error::corrupt(
                NAME,
                format!("decoded {} bytes, size prefix says {}", len, expected),
            ));
        }
        Ok(len)
    }
}
