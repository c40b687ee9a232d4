//! Streaming compression and decompression sessions.
//!
//! A session wraps an algorithm back-end ([`Encoder`] or [`Decoder`]) in a
//! state machine that enforces the single-stream lifecycle and keeps byte
//! accounting. Callers own all buffers: each call reports how much input was
//! consumed and how much output was produced, and a full output buffer is
//! signalled through `needs_more_output` or `complete` rather than an error.

use crate::codec::{Decoder, Encoder};
use crate::error::{Error, Result};

/// Progress of a single `feed` or `decompress_chunk` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Feed {
    pub consumed: usize,
    pub produced: usize,
    /// More output is pending: call again with room in the output buffer.
    pub needs_more_output: bool,
}

/// Progress of a single `flush`, `finish` or `finish_decompress` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Finish {
    pub produced: usize,
    /// Nothing is pending. When false, call again with a drained or larger buffer.
    pub complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Accepting input.
    Ready,
    /// A flush ran out of output space and must be resumed.
    Flushing,
    /// A finish ran out of output space and must be resumed.
    Finishing,
    /// Terminal: the stream was completed or failed.
    Finished,
}

/// A compression session for one logical stream.
pub struct Compressor {
    codec: &'static str,
    encoder: Box<dyn Encoder>,
    state: StreamState,
    total_in: u64,
    total_out: u64,
}

impl Compressor {
    pub fn new(codec: &'static str, encoder: Box<dyn Encoder>) -> Self {
        Compressor {
            codec,
            encoder,
            state: StreamState::Ready,
            total_in: 0,
            total_out: 0,
        }
    }

    pub fn codec(&self) -> &'static str {
        self.codec
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Compresses part of `input` into `output`.
    ///
    /// Loop, draining `output` and resubmitting the unconsumed rest of the
    /// input, until everything is consumed and `needs_more_output` is false.
    pub fn feed(&mut self, input: &[u8], output: &mut [u8]) -> Result<Feed> {
        match self.state {
            StreamState::Ready => {}
            StreamState::Flushing => {
                let flushed = self.flush(output)?;
                return Ok(Feed {
                    consumed: 0,
                    produced: flushed.produced,
                    needs_more_output: !flushed.complete,
                });
            }
            StreamState::Finishing | StreamState::Finished => {
                return Err(Error::StreamAlreadyFinished { codec: self.codec })
            }
        }

        let feed = self.guard(|encoder| encoder.encode(input, output))?;
        self.total_in += feed.consumed as u64;
        self.total_out += feed.produced as u64;
        Ok(feed)
    }

    /// Emits everything consumed so far as decodable output without ending
    /// the stream.
    pub fn flush(&mut self, output: &mut [u8]) -> Result<Finish> {
        match self.state {
            StreamState::Ready | StreamState::Flushing => {}
            StreamState::Finishing | StreamState::Finished => {
                return Err(Error::StreamAlreadyFinished { codec: self.codec })
            }
        }

        let flushed = self.guard(|encoder| encoder.flush(output))?;
        self.total_out += flushed.produced as u64;
        self.state = if flushed.complete {
            StreamState::Ready
        } else {
            StreamState::Flushing
        };
        Ok(flushed)
    }

    /// Ends the stream. Call again with more room until `complete` is set;
    /// afterwards the session accepts no further calls.
    pub fn finish(&mut self, output: &mut [u8]) -> Result<Finish> {
        let mut produced = 0;
        match self.state {
            StreamState::Ready | StreamState::Finishing => {}
            StreamState::Flushing => {
                let flushed = self.flush(output)?;
                if !flushed.complete {
                    return Ok(Finish {
                        produced: flushed.produced,
                        complete: false,
                    });
                }
                produced = flushed.produced;
            }
            StreamState::Finished => {
                return Err(Error::StreamAlreadyFinished { codec: self.codec })
            }
        }

        let finished = self.guard(|encoder| encoder.finish(&mut output[produced..]))?;
        self.total_out += finished.produced as u64;
        if finished.complete {
            self.state = StreamState::Finished;
            log::trace!(
                "{} compressor finished: {} bytes in, {} bytes out",
                self.codec,
                self.total_in,
                self.total_out
            );
        } else {
            self.state = StreamState::Finishing;
        }
        Ok(Finish {
            produced: produced + finished.produced,
            complete: finished.complete,
        })
    }

    fn guard<T>(&mut self, op: impl FnOnce(&mut dyn Encoder) -> Result<T>) -> Result<T> {
        let result = op(self.encoder.as_mut());
        if result.is_err() {
            self.state = StreamState::Finished;
        }
        result
    }
}

impl Drop for Compressor {
    fn drop(&mut self) {
        if self.state != StreamState::Finished && self.total_in > 0 {
            log::debug!(
                "abandoning unfinished {} compressor after {} input bytes",
                self.codec,
                self.total_in
            );
        }
    }
}

/// A decompression session for one logical stream.
pub struct Decompressor {
    codec: &'static str,
    decoder: Box<dyn Decoder>,
    state: StreamState,
    total_in: u64,
    total_out: u64,
}

impl Decompressor {
    pub fn new(codec: &'static str, decoder: Box<dyn Decoder>) -> Self {
        Decompressor {
            codec,
            decoder,
            state: StreamState::Ready,
            total_in: 0,
            total_out: 0,
        }
    }

    pub fn codec(&self) -> &'static str {
        self.codec
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Whether the end-of-stream marker has been decoded.
    pub fn is_finished(&self) -> bool {
        self.decoder.is_finished()
    }

    /// Decompresses part of `input` into `output`, with the same looping
    /// contract as [`Compressor::feed`].
    pub fn decompress_chunk(&mut self, input: &[u8], output: &mut [u8]) -> Result<Feed> {
        if self.state == StreamState::Finished {
            return Err(Error::StreamAlreadyFinished { codec: self.codec });
        }

        let feed = self.guard(|decoder| decoder.decode(input, output))?;
        self.total_in += feed.consumed as u64;
        self.total_out += feed.produced as u64;
        Ok(feed)
    }

    /// Drains the remaining output and checks that the stream was complete.
    ///
    /// Fails with [`Error::TruncatedStream`] if nothing is pending but the
    /// end-of-stream marker was never seen.
    pub fn finish_decompress(&mut self, output: &mut [u8]) -> Result<Finish> {
        if self.state == StreamState::Finished {
            return Err(Error::StreamAlreadyFinished { codec: self.codec });
        }

        let drained = self.guard(|decoder| decoder.drain(output))?;
        self.total_out += drained.produced as u64;
        if !drained.complete {
            return Ok(drained);
        }

        self.state = StreamState::Finished;
        if !self.decoder.is_finished() {
            return Err(Error::TruncatedStream { codec: self.codec });
        }
        log::trace!(
            "{} decompressor finished: {} bytes in, {} bytes out",
            self.codec,
            self.total_in,
            self.total_out
        );
        Ok(drained)
    }

    fn guard<T>(&mut self, op: impl FnOnce(&mut dyn Decoder) -> Result<T>) -> Result<T> {
        let result = op(self.decoder.as_mut());
        if result.is_err() {
            self.state = StreamState::Finished;
        }
        result
    }
}

impl Drop for Decompressor {
    fn drop(&mut self) {
        if self.state != StreamState::Finished && self.total_in > 0 {
            log::debug!(
                "abandoning unfinished {} decompressor after {} input bytes",
                self.codec,
                self.total_in
            );
        }
    }
}
