//! Error taxonomy shared by codecs, streaming sessions and the registry.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No codec is registered under the requested name.
    #[error("unknown codec: {0}")]
    UnknownCodec(String),

    /// The level is outside the range accepted by the codec.
    #[error("invalid compression level {level} for {codec}: expected {expected}")]
    InvalidLevel {
        codec: String,
        level: i32,
        expected: String,
    },

    /// The output buffer cannot hold the result. `required` is set when the
    /// codec knows the exact or worst-case size it needs.
    #[error("output buffer too small: {provided} bytes provided")]
    BufferTooSmall {
        provided: usize,
        required: Option<usize>,
    },

    /// The input is not a well-formed stream for the codec.
    #[error("corrupt {codec} data: {message}")]
    CorruptData {
        codec: &'static str,
        message: String,
    },

    /// A decompression session ended before the end-of-stream marker.
    #[error("truncated {codec} stream")]
    TruncatedStream { codec: &'static str },

    #[error("{codec} stream already finished")]
    StreamAlreadyFinished { codec: &'static str },

    #[error("{0} does not support streaming")]
    StreamingUnsupported(&'static str),

    /// Failure inside the compression library that is not caused by the
    /// data, e.g. an allocation failure.
    #[error("{codec} error: {message}")]
    Codec {
        codec: &'static str,
        message: String,
    },
}

impl Error {
    pub(crate) fn corrupt(codec: &'static str, message: impl Into<String>) -> Self {
        Error::CorruptData {
            codec,
            message: message.into(),
        }
    }

    pub(crate) fn codec(codec: &'static str, message: impl Into<String>) -> Self {
        Error::Codec {
            codec,
            message: message.into(),
        }
    }

    pub(crate) fn too_small(provided: usize) -> Self {
        Error::BufferTooSmall {
            provided,
            required: None,
        }
    }

    /// Whether retrying with a larger output buffer can succeed.
    pub fn is_buffer_too_small(&self) -> bool {
        matches!(self, Error::BufferTooSmall { .. })
    }

    /// Whether the error reports ill-formed compressed input.
    pub fn is_data_fault(&self) -> bool {
        matches!(
            self,
            Error::CorruptData { .. } | Error::TruncatedStream { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(Error::too_small(3).is_buffer_too_small());
        assert!(!Error::too_small(3).is_data_fault());
        assert!(Error::corrupt("snappy", "bad header").is_data_fault());
        assert!(Error::TruncatedStream { codec: "brotli" }.is_data_fault());
        assert!(!Error::UnknownCodec("x".into()).is_data_fault());
    }

    #[test]
    fn messages() {
        let err = Error::InvalidLevel {
            codec: "brotli".into(),
            level: 12,
            expected: "a level in [0, 11]".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid compression level 12 for brotli: expected a level in [0, 11]"
        );
        assert_eq!(
            Error::StreamAlreadyFinished { codec: "zstd" }.to_string(),
            "zstd stream already finished"
        );
    }
}
