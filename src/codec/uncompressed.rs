use crate::codec::{Codec, Decoder, Encoder};
use crate::error::{Error, Result};
use crate::level::Levels;
use crate::stream::{Compressor, Decompressor, Feed, Finish};

pub const NAME: &str = "uncompressed";

pub fn levels() -> Levels {
    Levels::Fixed
}

/// Identity codec: output is a copy of the input.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uncompressed;

impl Uncompressed {
    pub fn new(level: Option<i32>) -> Result<Self> {
        levels().resolve(NAME, level)?;
        Ok(Uncompressed)
    }
}

fn copy(src: &[u8], dest: &mut [u8]) -> Result<usize> {
    if dest.len() < src.len() {
        return Err(Error::BufferTooSmall {
            provided: dest.len(),
            required: Some(src.len()),
        });
    }
    dest[..src.len()].copy_from_slice(src);
    Ok(src.len())
}

impl Codec for Uncompressed {
    fn name(&self) -> &'static str {
        NAME
    }

    fn max_compressed_len(&self, input_len: usize) -> usize {
        input_len
    }

    fn compress(&self, src: &[u8], dest: &mut [u8]) -> Result<usize> {
        copy(src, dest)
    }

    fn decompress(&self, src: &[u8], dest: &mut [u8]) -> Result<usize> {
        copy(src, dest)
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn open_compressor(&self) -> Result<Compressor> {
        Ok(Compressor::new(NAME, Box::new(Passthrough)))
    }

    fn open_decompressor(&self) -> Result<Decompressor> {
        Ok(Decompressor::new(NAME, Box::new(Passthrough)))
    }
}

/// Streaming copy. Holds no state, so there is never pending output and any
/// prefix of the stream is a complete stream.
pub struct Passthrough;

impl Passthrough {
    fn pass(src: &[u8], dest: &mut [u8]) -> Feed {
        let len = src.len().min(dest.len());
        dest[..len].copy_from_slice(&src[..len]);
        Feed {
            consumed: len,
            produced: len,
            needs_more_output: len < src.len(),
        }
    }
}

impl Encoder for Passthrough {
    fn encode(&mut self, src: &[u8], dest: &mut [u8]) -> Result<Feed> {
        Ok(Self::pass(src, dest))
    }

    fn flush(&mut self, _dest: &mut [u8]) -> Result<Finish> {
        Ok(Finish {
            produced: 0,
            complete: true,
        })
    }

    fn finish(&mut self, _dest: &mut [u8]) -> Result<Finish> {
        Ok(Finish {
            produced: 0,
            complete: true,
        })
    }
}

impl Decoder for Passthrough {
    fn decode(&mut self, src: &[u8], dest: &mut [u8]) -> Result<Feed> {
        Ok(Self::pass(src, dest))
    }

    fn drain(&mut self, _dest: &mut [u8]) -> Result<Finish> {
        Ok(Finish {
            produced: 0,
            complete: true,
        })
    }

    fn is_finished(&self) -> bool {
        true
    }
}
