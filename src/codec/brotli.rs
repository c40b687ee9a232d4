use crate::codec::{saturate_bound, Codec, Decoder, Encoder};
use crate::error::{Error, Result};
use crate::level::Levels;
use crate::stream::{Compressor, Decompressor, Feed, Finish};
use brotlic_sys::{
    BrotliDecoderCreateInstance, BrotliDecoderDecompressStream,
    BrotliDecoderDestroyInstance, BrotliDecoderErrorString, BrotliDecoderGetErrorCode,
    BrotliDecoderHasMoreOutput,
    BrotliDecoderResult_BROTLI_DECODER_RESULT_NEEDS_MORE_INPUT,
    BrotliDecoderResult_BROTLI_DECODER_RESULT_NEEDS_MORE_OUTPUT,
    BrotliDecoderResult_BROTLI_DECODER_RESULT_SUCCESS, BrotliDecoderState, BrotliEncoderCompress,
    BrotliEncoderCompressStream, BrotliEncoderCreateInstance, BrotliEncoderDestroyInstance,
    BrotliEncoderHasMoreOutput, BrotliEncoderIsFinished, BrotliEncoderMaxCompressedSize,
    BrotliEncoderMode_BROTLI_MODE_GENERIC, BrotliEncoderOperation,
    BrotliEncoderOperation_BROTLI_OPERATION_FINISH, BrotliEncoderOperation_BROTLI_OPERATION_FLUSH,
    BrotliEncoderOperation_BROTLI_OPERATION_PROCESS, BrotliEncoderParameter_BROTLI_PARAM_LGWIN,
    BrotliEncoderParameter_BROTLI_PARAM_MODE, BrotliEncoderParameter_BROTLI_PARAM_QUALITY,
    BrotliEncoderSetParameter, BrotliEncoderState, BROTLI_DEFAULT_WINDOW, BROTLI_MAX_QUALITY,
    BROTLI_MIN_QUALITY,
};
use std::ffi::{c_int, CStr};
use std::ptr;

pub const NAME: &str = "brotli";
pub const DEFAULT_QUALITY: i32 = 8;

pub fn levels() -> Levels {
    Levels::Range {
        min: BROTLI_MIN_QUALITY as i32,
        max: BROTLI_MAX_QUALITY as i32,
        default: DEFAULT_QUALITY,
    }
}

/// Brotli with a fixed quality and the default 4 MiB window.
#[derive(Debug, Clone, Copy)]
pub struct Brotli {
    quality: i32,
}

impl Brotli {
    pub fn new(level: Option<i32>) -> Result<Self> {
        let quality = levels().resolve(NAME, level)?.unwrap_or(DEFAULT_QUALITY);
        Ok(Brotli { quality })
    }
}

impl Codec for Brotli {
    fn name(&self) -> &'static str {
        NAME
    }

    fn level(&self) -> Option<i32> {
        Some(self.quality)
    }

    fn max_compressed_len(&self, input_len: usize) -> usize {
        saturate_bound(input_len, unsafe { BrotliEncoderMaxCompressedSize(input_len) })
    }

    fn compress(&self, src: &[u8], dest: &mut [u8]) -> Result<usize> {
        let mut output_len = dest.len();
        let result = unsafe {
            BrotliEncoderCompress(
                self.quality,
                BROTLI_DEFAULT_WINDOW as c_int,
                BrotliEncoderMode_BROTLI_MODE_GENERIC,
                src.len(),
                src.as_ptr(),
                &mut output_len,
                dest.as_mut_ptr(),
            )
        };
        // With a valid quality the encoder only fails when it runs out of room.
        if result != 0 {
            Ok(output_len)
        } else {
            Err(Error::too_small(dest.len()))
        }
    }

    fn decompress(&self, src: &[u8], dest: &mut [u8]) -> Result<usize> {
        // BrotliDecoderDecompress folds every failure into a single error
        // code, so the one-shot path runs its own stream decoder instead.
        let mut decoder = BrotliDecoder::new()?;
        let feed = decoder.decode(src, dest)?;
        if feed.needs_more_output {
            Err(Error::too_small(dest.len()))
        } else if !decoder.is_finished() {
            Err(Error::corrupt(NAME, "unexpected end of input"))
        } else {
            Ok(feed.produced)
        }
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn open_compressor(&self) -> Result<Compressor> {
        let encoder = BrotliEncoder::new(self.quality)?;
        Ok(Compressor::new(NAME, Box::new(encoder)))
    }

    fn open_decompressor(&self) -> Result<Decompressor> {
        let decoder = BrotliDecoder::new()?;
        Ok(Decompressor::new(NAME, Box::new(decoder)))
    }
}

pub struct BrotliEncoder {
    state: *mut BrotliEncoderState,
}

// The encoder state is exclusively owned and only touched through `&mut self`.
unsafe impl Send for BrotliEncoder {}

impl BrotliEncoder {
    pub fn new(quality: i32) -> Result<Self> {
        let state = unsafe { BrotliEncoderCreateInstance(None, None, ptr::null_mut()) };
        if state.is_null() {
            return Err(Error::codec(NAME, "failed to allocate encoder state"));
        }
        let encoder = BrotliEncoder { state };

        let params = [
            (BrotliEncoderParameter_BROTLI_PARAM_QUALITY, quality as u32),
            (BrotliEncoderParameter_BROTLI_PARAM_LGWIN, BROTLI_DEFAULT_WINDOW as u32),
            (
                BrotliEncoderParameter_BROTLI_PARAM_MODE,
                BrotliEncoderMode_BROTLI_MODE_GENERIC as u32,
            ),
        ];
        for (param, value) in params {
            if unsafe { BrotliEncoderSetParameter(encoder.state, param, value) } == 0 {
                return Err(Error::codec(NAME, "failed to set encoder parameter"));
            }
        }
        Ok(encoder)
    }

    fn run(
        &mut self,
        op: BrotliEncoderOperation,
        src: &[u8],
        dest: &mut [u8],
    ) -> Result<(usize, usize)> {
        let mut available_in = src.len();
        let mut next_in = src.as_ptr();
        let mut available_out = dest.len();
        let mut next_out = dest.as_mut_ptr();
        let mut total_out = 0;

        let result = unsafe {
            BrotliEncoderCompressStream(
                self.state,
                op,
                &mut available_in,
                &mut next_in,
                &mut available_out,
                &mut next_out,
                &mut total_out,
            )
        };
        if result == 0 {
            return Err(Error::codec(NAME, "encoder rejected the stream operation"));
        }
        Ok((src.len() - available_in, dest.len() - available_out))
    }

    fn has_more_output(&self) -> bool {
        unsafe { BrotliEncoderHasMoreOutput(self.state) != 0 }
    }
}

impl Encoder for BrotliEncoder {
    fn encode(&mut self, src: &[u8], dest: &mut [u8]) -> Result<Feed> {
        let (consumed, produced) =
            self.run(BrotliEncoderOperation_BROTLI_OPERATION_PROCESS, src, dest)?;
        Ok(Feed {
            consumed,
            produced,
            needs_more_output: consumed < src.len() || self.has_more_output(),
        })
    }

    fn flush(&mut self, dest: &mut [u8]) -> Result<Finish> {
        let (_, produced) = self.run(BrotliEncoderOperation_BROTLI_OPERATION_FLUSH, &[], dest)?;
        Ok(Finish {
            produced,
            complete: !self.has_more_output(),
        })
    }

    fn finish(&mut self, dest: &mut [u8]) -> Result<Finish> {
        let (_, produced) = self.run(BrotliEncoderOperation_BROTLI_OPERATION_FINISH, &[], dest)?;
        let finished = unsafe { BrotliEncoderIsFinished(self.state) != 0 };
        Ok(Finish {
            produced,
            complete: finished && !self.has_more_output(),
        })
    }
}

impl Drop for BrotliEncoder {
    fn drop(&mut self) {
        unsafe {
            BrotliEncoderDestroyInstance(self.state);
        }
    }
}

pub struct BrotliDecoder {
    state: *mut BrotliDecoderState,
    finished: bool,
}

// See `BrotliEncoder`.
unsafe impl Send for BrotliDecoder {}

impl BrotliDecoder {
    pub fn new() -> Result<Self> {
        let state = unsafe { BrotliDecoderCreateInstance(None, None, ptr::null_mut()) };
        if state.is_null() {
            return Err(Error::codec(NAME, "failed to allocate decoder state"));
        }
        Ok(BrotliDecoder {
            state,
            finished: false,
        })
    }

    fn error(&self) -> Error {
        let message = unsafe {
            CStr::from_ptr(BrotliDecoderErrorString(BrotliDecoderGetErrorCode(
                self.state,
            )))
        };
        Error::corrupt(NAME, message.to_string_lossy())
    }
}

impl Decoder for BrotliDecoder {
    fn decode(&mut self, src: &[u8], dest: &mut [u8]) -> Result<Feed> {
        if self.finished {
            return if src.is_empty() {
                Ok(Feed::default())
            } else {
                Err(Error::corrupt(NAME, "trailing data after end of stream"))
            };
        }

        let mut available_in = src.len();
        let mut next_in = src.as_ptr();
        let mut available_out = dest.len();
        let mut next_out = dest.as_mut_ptr();
        let mut total_out = 0;

        let result = unsafe {
            BrotliDecoderDecompressStream(
                self.state,
                &mut available_in,
                &mut next_in,
                &mut available_out,
                &mut next_out,
                &mut total_out,
            )
        };
        let consumed = src.len() - available_in;
        let produced = dest.len() - available_out;

        if result == BrotliDecoderResult_BROTLI_DECODER_RESULT_SUCCESS {
            self.finished = true;
            if available_in > 0 {
                return Err(Error::corrupt(NAME, "trailing data after end of stream"));
            }
            Ok(Feed {
                consumed,
                produced,
                needs_more_output: false,
            })
        } else if result == BrotliDecoderResult_BROTLI_DECODER_RESULT_NEEDS_MORE_OUTPUT {
            Ok(Feed {
                consumed,
                produced,
                needs_more_output: true,
            })
        } else if result == BrotliDecoderResult_BROTLI_DECODER_RESULT_NEEDS_MORE_INPUT {
            // Decoded bytes can stay buffered even when all input was taken.
            Ok(Feed {
                consumed,
                produced,
                needs_more_output: unsafe { BrotliDecoderHasMoreOutput(self.state) != 0 },
            })
        } else {
            Err(self.error())
        }
    }

    fn drain(&mut self, dest: &mut [u8]) -> Result<Finish> {
        if self.finished {
            return Ok(Finish {
                produced: 0,
                complete: true,
            });
        }
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

impl Drop for BrotliDecoder {
    fn drop(&mut self) {
        unsafe {
            BrotliDecoderDestroyInstance(self.state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_quality() {
        assert_eq!(Brotli::new(None).unwrap().level(), Some(8));
        assert_eq!(Brotli::new(Some(11)).unwrap().level(), Some(11));
        assert!(Brotli::new(Some(12)).is_err());
    }

    #[test]
    fn empty_input_needs_one_byte() {
        let codec = Brotli::new(None).unwrap();
        let mut dest = [0u8; 0];
        assert!(codec.compress(&[], &mut dest).unwrap_err().is_buffer_too_small());
        let mut dest = vec![0u8; codec.max_compressed_len(0)];
        let len = codec.compress(&[], &mut dest).unwrap();
        assert!(len >= 1);
        let mut out = [0u8; 4];
        assert_eq!(codec.decompress(&dest[..len], &mut out).unwrap(), 0);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let codec = Brotli::new(None).unwrap();
        let input = b"a brotli stream cut in half cannot be decoded. ".repeat(20);
        let mut compressed = vec![0u8; codec.max_compressed_len(input.len())];
        let len = codec.compress(&input, &mut compressed).unwrap();
        let mut out = vec![0u8; input.len()];
        let err = codec.decompress(&compressed[..len / 2], &mut out).unwrap_err();
        assert!(err.is_data_fault(), "{}", err);
    }

    #[test]
    fn buffered_output_after_flush_is_reported() {
        let mut encoder = BrotliEncoder::new(DEFAULT_QUALITY).unwrap();
        let mut flushed = vec![0u8; 256];
        let feed = encoder.encode(b"first half, ", &mut flushed).unwrap();
        assert_eq!(feed.consumed, 12);
        let mut len = feed.produced;
        loop {
            let flush = encoder.flush(&mut flushed[len..]).unwrap();
            len += flush.produced;
            if flush.complete {
                break;
            }
        }

        let mut decoder = BrotliDecoder::new().unwrap();
        let mut out = Vec::new();
        let mut scratch = [0u8; 8];
        let mut rest = &flushed[..len];
        loop {
            let feed = decoder.decode(rest, &mut scratch).unwrap();
            out.extend_from_slice(&scratch[..feed.produced]);
            rest = &rest[feed.consumed..];
            if rest.is_empty() && !feed.needs_more_output {
                break;
            }
        }
        assert_eq!(out, b"first half, ");
        assert!(!decoder.is_finished());
    }

    #[test]
    fn short_output_is_reported() {
        let codec = Brotli::new(Some(5)).unwrap();
        let input = b"0123456789".repeat(50);
        let mut compressed = vec![0u8; codec.max_compressed_len(input.len())];
        let len = codec.compress(&input, &mut compressed).unwrap();
        let mut out = vec![0u8; input.len() - 1];
        let err = codec.decompress(&compressed[..len], &mut out).unwrap_err();
        assert!(err.is_buffer_too_small(), "{}", err);
    }
}
