//! Interchangeable byte-buffer compression codecs.
//!
//! Every algorithm is exposed through the same [`Codec`] trait and looked up
//! by name in a [`Registry`]:
//!
//! ```no_run
//! let codec = compkit::get("zstd", Some(5))?;
//! let compressed = compkit::buffer::compress_to_vec(codec.as_ref(), b"hello hello hello")?;
//! let policy = compkit::buffer::GrowthPolicy::default();
//! let restored = compkit::buffer::decompress_to_vec(codec.as_ref(), &compressed, &policy)?;
//! assert_eq!(restored, b"hello hello hello");
//! # Ok::<(), compkit::Error>(())
//! ```
//!
//! Codecs that support it also open incremental sessions ([`Compressor`],
//! [`Decompressor`]) for data that arrives in pieces.

pub mod buffer;
pub mod codec;
pub mod error;
pub mod level;
pub mod registry;
pub mod stream;

pub use codec::Codec;
pub use error::{Error, Result};
pub use level::Levels;
pub use registry::{get, Registry};
pub use stream::{Compressor, Decompressor, Feed, Finish, StreamState};
