use crate::codec::{saturate_bound, Codec, Decoder, Encoder};
use crate::error::{Error, Result};
use crate::level::Levels;
use crate::stream::{Compressor, Decompressor, Feed, Finish};
use lzma_sys::lzma_stream_buffer_bound;
use xz2::stream::{Action, Check, Status, Stream};

pub const NAME: &str = "lzma";
pub const DEFAULT_PRESET: i32 = 6;

pub fn levels() -> Levels {
    Levels::Range {
        min: 0,
        max: 9,
        default: DEFAULT_PRESET,
    }
}

fn codec_error(e: xz2::stream::Error) -> Error {
    Error::codec(NAME, e.to_string())
}

fn decode_error(e: xz2::stream::Error) -> Error {
    match e {
        xz2::stream::Error::Mem | xz2::stream::Error::MemLimit => codec_error(e),
        e => Error::corrupt(NAME, e.to_string()),
    }
}

fn encoder(preset: u32) -> Result<Stream> {
    Stream::new_easy_encoder(preset, Check::Crc64).map_err(codec_error)
}

fn decoder() -> Result<Stream> {
    Stream::new_stream_decoder(u64::MAX, 0).map_err(codec_error)
}

/// Progress of one `process` call, measured from the stream totals.
fn process(
    stream: &mut Stream,
    src: &[u8],
    dest: &mut [u8],
    action: Action,
) -> std::result::Result<(usize, usize, Status), xz2::stream::Error> {
    let (total_in, total_out) = (stream.total_in(), stream.total_out());
    let status = stream.process(src, dest, action)?;
    Ok((
        (stream.total_in() - total_in) as usize,
        (stream.total_out() - total_out) as usize,
        status,
    ))
}

/// xz container with a CRC64 check over the uncompressed data.
#[derive(Debug, Clone, Copy)]
pub struct Lzma {
    preset: u32,
}

impl Lzma {
    pub fn new(level: Option<i32>) -> Result<Self> {
        let preset = levels().resolve(NAME, level)?.unwrap_or(DEFAULT_PRESET);
        Ok(Lzma {
            preset: preset as u32,
        })
    }
}

impl Codec for Lzma {
    fn name(&self) -> &'static str {
        NAME
    }

    fn level(&self) -> Option<i32> {
        Some(self.preset as i32)
    }

    fn max_compressed_len(&self, input_len: usize) -> usize {
        saturate_bound(input_len, unsafe { lzma_stream_buffer_bound(input_len) })
    }

    fn compress(&self, src: &[u8], dest: &mut [u8]) -> Result<usize> {
        let mut stream = encoder(self.preset)?;
        let (mut read, mut written) = (0, 0);
        loop {
            let (consumed, produced, status) =
                process(&mut stream, &src[read..], &mut dest[written..], Action::Finish)
                    .map_err(codec_error)?;
            read += consumed;
            written += produced;
            match status {
                Status::StreamEnd => return Ok(written),
                _ if consumed == 0 && produced == 0 => return Err(Error::too_small(dest.len())),
                _ => {}
            }
        }
    }

    fn decompress(&self, src: &[u8], dest: &mut [u8]) -> Result<usize> {
        let mut stream = decoder()?;
        let (mut read, mut written) = (0, 0);
        loop {
            let (consumed, produced, status) =
                process(&mut stream, &src[read..], &mut dest[written..], Action::Finish)
                    .map_err(decode_error)?;
            read += consumed;
            written += produced;
            match status {
                Status::StreamEnd if read < src.len() => {
                    return Err(Error::corrupt(NAME, "trailing data after end of stream"))
                }
                Status::StreamEnd => return Ok(written),
                // A full buffer does not end the loop: the end of the stream
                // can still be decoded without more output space.
                _ if consumed == 0 && produced == 0 => {
                    // With a full buffer the stall may still be truncated input:
                    // only pending output makes it a short buffer.
                    let mut spare = [0u8; 1];
                    let more = written == dest.len()
                        && process(&mut stream, &src[read..], &mut spare, Action::Finish)
                            .map_err(decode_error)?
                            .1
                            > 0;
                    return Err(if more {
                        Error::too_small(dest.len())
                    } else {
                        Error::corrupt(NAME, "unexpected end of input")
                    });
                }
                _ => {}
            }
        }
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn open_compressor(&self) -> Result<Compressor> {
        let stream = encoder(self.preset)?;
        Ok(Compressor::new(NAME, Box::new(LzmaEncoder { stream })))
    }

    fn open_decompressor(&self) -> Result<Decompressor> {
        let stream = decoder()?;
        Ok(Decompressor::new(
            NAME,
            Box::new(LzmaDecoder {
                stream,
                finished: false,
            }),
        ))
    }
}

/// liblzma does not expose pending output, so a filled buffer is taken to
/// mean that more may follow.
fn filled(written: usize, dest: &[u8]) -> bool {
    !dest.is_empty() && written == dest.len()
}

pub struct LzmaEncoder {
    stream: Stream,
}

impl LzmaEncoder {
    /// Runs an action that completes with `StreamEnd` (flush or finish).
    fn complete(&mut self, dest: &mut [u8], action: Action) -> Result<Finish> {
        let (_, produced, status) =
            process(&mut self.stream, &[], dest, action).map_err(codec_error)?;
        Ok(Finish {
            produced,
            complete: matches!(status, Status::StreamEnd),
        })
    }
}

impl Encoder for LzmaEncoder {
    fn encode(&mut self, src: &[u8], dest: &mut [u8]) -> Result<Feed> {
        let (consumed, produced, _) =
            process(&mut self.stream, src, dest, Action::Run).map_err(codec_error)?;
        Ok(Feed {
            consumed,
            produced,
            needs_more_output: consumed < src.len() || filled(produced, dest),
        })
    }

    fn flush(&mut self, dest: &mut [u8]) -> Result<Finish> {
        self.complete(dest, Action::SyncFlush)
    }

    fn finish(&mut self, dest: &mut [u8]) -> Result<Finish> {
        self.complete(dest, Action::Finish)
    }
}

pub struct LzmaDecoder {
    stream: Stream,
    finished: bool,
}

impl Decoder for LzmaDecoder {
    fn decode(&mut self, src: &[u8], dest: &mut [u8]) -> Result<Feed> {
        if self.finished {
            return if src.is_empty() {
                Ok(Feed::default())
            } else {
                Err(Error::corrupt(NAME, "trailing data after end of stream"))
            };
        }

        let (consumed, produced, status) =
            process(&mut self.stream, src, dest, Action::Run).map_err(decode_error)?;
        if matches!(status, Status::StreamEnd) {
            self.finished = true;
            if consumed < src.len() {
                return Err(Error::corrupt(NAME, "trailing data after end of stream"));
            }
        }
        Ok(Feed {
            consumed,
            produced,
            needs_more_output: !self.finished && filled(produced, dest),
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
        self.finished
    }
}
