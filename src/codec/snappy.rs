use crate::codec::{compress_within, saturate_bound, Codec};
use crate::error::{Error, Result};
use crate::level::Levels;

pub const NAME: &str = "snappy";

pub fn levels() -> Levels {
    Levels::Fixed
}

/// Snappy raw block format. The block starts with the varint-encoded
/// decompressed length, which is checked against the decoded size.
///
/// Streaming is not supported.
#[derive(Debug, Clone, Copy, Default)]
pub struct Snappy;

impl Snappy {
    pub fn new(level: Option<i32>) -> Result<Self> {
        levels().resolve(NAME, level)?;
        Ok(Snappy)
    }
}

impl Codec for Snappy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn max_compressed_len(&self, input_len: usize) -> usize {
        saturate_bound(input_len, snap::raw::max_compress_len(input_len))
    }

    fn compress(&self, src: &[u8], dest: &mut [u8]) -> Result<usize> {
        let bound = self.max_compressed_len(src.len());
        compress_within(dest, bound, |out| {
            snap::raw::Encoder::new()
                .compress(src, out)
                .map_err(|e| match e {
                    snap::Error::BufferTooSmall { given, min } => Error::BufferTooSmall {
                        provided: given as usize,
                        required: Some(min as usize),
                    },
                    e => Error::codec(NAME, e.to_string()),
                })
        })
    }

    fn decompress(&self, src: &[u8], dest: &mut [u8]) -> Result<usize> {
        snap::raw::Decoder::new()
            .decompress(src, dest)
            .map_err(|e| match e {
                snap::Error::BufferTooSmall { given, min } => Error::BufferTooSmall {
                    provided: given as usize,
                    required: Some(min as usize),
                },
                e => Error::corrupt(NAME, e.to_string()),
            })
    }
}
