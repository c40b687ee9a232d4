use crate::codec::{compress_within, Codec, Decoder, Encoder};
use crate::error::{Error, Result};
use crate::level::Levels;
use crate::stream::{Compressor, Decompressor, Feed, Finish};
use ::zstd::stream::raw::{self, Operation, OutBuffer};
use ::zstd::zstd_safe;
use std::io;

pub const NAME: &str = "zstd";
pub const DEFAULT_LEVEL: i32 = ::zstd::DEFAULT_COMPRESSION_LEVEL;

pub fn levels() -> Levels {
    Levels::Range {
        min: zstd_safe::min_c_level(),
        max: zstd_safe::max_c_level(),
        default: DEFAULT_LEVEL,
    }
}

fn codec_error(e: io::Error) -> Error {
    Error::codec(NAME, e.to_string())
}

fn corrupt(e: io::Error) -> Error {
    Error::corrupt(NAME, e.to_string())
}

fn trailing_data() -> Error {
    Error::corrupt(NAME, "trailing data after end of frame")
}

/// Zstandard frames. One-shot frames record the content size.
#[derive(Debug, Clone, Copy)]
pub struct Zstd {
    level: i32,
}

impl Zstd {
    pub fn new(level: Option<i32>) -> Result<Self> {
        let level = levels().resolve(NAME, level)?.unwrap_or(DEFAULT_LEVEL);
        Ok(Zstd { level })
    }
}

impl Codec for Zstd {
    fn name(&self) -> &'static str {
        NAME
    }

    fn level(&self) -> Option<i32> {
        Some(self.level)
    }

    fn max_compressed_len(&self, input_len: usize) -> usize {
        zstd_safe::compress_bound(input_len)
    }

    fn compress(&self, src: &[u8], dest: &mut [u8]) -> Result<usize> {
        let bound = self.max_compressed_len(src.len());
        compress_within(dest, bound, |out| {
            ::zstd::bulk::compress_to_buffer(src, out, self.level).map_err(codec_error)
        })
    }

    fn decompress(&self, src: &[u8], dest: &mut [u8]) -> Result<usize> {
        // The bulk decoder would carry on into a second frame.
        if let Ok(frame_len) = zstd_safe::find_frame_compressed_size(src) {
            if frame_len < src.len() {
                return Err(trailing_data());
            }
        }
        let provided = dest.len();
        ::zstd::bulk::decompress_to_buffer(src, dest).map_err(|e| {
            match ::zstd::bulk::Decompressor::upper_bound(src) {
                Some(required) if required > provided => Error::BufferTooSmall {
                    provided,
                    required: Some(required),
                },
                _ => corrupt(e),
            }
        })
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn open_compressor(&self) -> Result<Compressor> {
        let raw = raw::Encoder::new(self.level).map_err(codec_error)?;
        Ok(Compressor::new(NAME, Box::new(ZstdEncoder { raw })))
    }

    fn open_decompressor(&self) -> Result<Decompressor> {
        let raw = raw::Decoder::new().map_err(codec_error)?;
        Ok(Decompressor::new(
            NAME,
            Box::new(ZstdDecoder {
                raw,
                frame_done: false,
            }),
        ))
    }
}

/// zstd does not report pending output directly, so a completely filled
/// output buffer is taken to mean that more may follow.
fn filled(written: usize, dest: &[u8]) -> bool {
    !dest.is_empty() && written == dest.len()
}

pub struct ZstdEncoder {
    raw: raw::Encoder<'static>,
}

impl Encoder for ZstdEncoder {
    fn encode(&mut self, src: &[u8], dest: &mut [u8]) -> Result<Feed> {
        let status = self.raw.run_on_buffers(src, dest).map_err(codec_error)?;
        Ok(Feed {
            consumed: status.bytes_read,
            produced: status.bytes_written,
            needs_more_output: status.bytes_read < src.len() || filled(status.bytes_written, dest),
        })
    }

    fn flush(&mut self, dest: &mut [u8]) -> Result<Finish> {
        let mut output = OutBuffer::around(dest);
        let remaining = self.raw.flush(&mut output).map_err(codec_error)?;
        Ok(Finish {
            produced: output.pos(),
            complete: remaining == 0,
        })
    }

    fn finish(&mut self, dest: &mut [u8]) -> Result<Finish> {
        let mut output = OutBuffer::around(dest);
        let remaining = self.raw.finish(&mut output, false).map_err(codec_error)?;
        Ok(Finish {
            produced: output.pos(),
            complete: remaining == 0,
        })
    }
}

/// Decodes a single zstd frame.
pub struct ZstdDecoder {
    raw: raw::Decoder<'static>,
    frame_done: bool,
}

impl Decoder for ZstdDecoder {
    fn decode(&mut self, src: &[u8], dest: &mut [u8]) -> Result<Feed> {
        if self.frame_done {
            return if src.is_empty() {
                Ok(Feed::default())
            } else {
                Err(trailing_data())
            };
        }
        let status = self.raw.run_on_buffers(src, dest).map_err(corrupt)?;
        // A zero hint means the current frame was decoded and fully flushed.
        self.frame_done = status.remaining == 0;
        Ok(Feed {
            consumed: status.bytes_read,
            produced: status.bytes_written,
            needs_more_output: !self.frame_done && filled(status.bytes_written, dest),
        })
    }

    fn drain(&mut self, dest: &mut [u8]) -> Result<Finish> {
        let feed = self.decode(&[], dest)?;
        Ok(Finish {
            produced: feed.produced,
            complete: !feed.needs_more_output,
        })
    }

    fn is_finished(&self) -> bool {
        self.frame_done
    }
}
