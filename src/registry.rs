//! Name-based lookup of codecs.
//!
//! The registry is the entry point for callers that should not depend on
//! concrete algorithm types. Codecs are constructed on first request for a
//! given name and level and then shared.

use crate::codec::brotli::Brotli;
use crate::codec::lz4::Lz4;
use crate::codec::lzma::Lzma;
use crate::codec::snappy::Snappy;
use crate::codec::uncompressed::Uncompressed;
use crate::codec::zstd::Zstd;
use crate::codec::{brotli, lz4, lzma, snappy, uncompressed, zstd, Codec};
use crate::error::{Error, Result};
use crate::level::Levels;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Builds a codec for an already validated level.
pub type Factory = dyn Fn(Option<i32>) -> Result<Arc<dyn Codec>> + Send + Sync;

struct Entry {
    levels: Levels,
    factory: Box<Factory>,
}

pub struct Registry {
    entries: RwLock<HashMap<String, Entry>>,
    cache: RwLock<HashMap<(String, Option<i32>), Arc<dyn Codec>>>,
}

fn shared<C: Codec + 'static>(codec: Result<C>) -> Result<Arc<dyn Codec>> {
    let codec: Arc<dyn Codec> = Arc::new(codec?);
    Ok(codec)
}

impl Registry {
    /// A registry without any codecs.
    pub fn empty() -> Self {
        Registry {
            entries: RwLock::default(),
            cache: RwLock::default(),
        }
    }

    /// A registry with all built-in codecs.
    pub fn new() -> Self {
        let registry = Registry::empty();
        registry.register(brotli::NAME, brotli::levels(), |level| {
            shared(Brotli::new(level))
        });
        registry.register(snappy::NAME, snappy::levels(), |level| {
            shared(Snappy::new(level))
        });
        registry.register(zstd::NAME, zstd::levels(), |level| shared(Zstd::new(level)));
        registry.register(lz4::NAME, lz4::levels(), |level| shared(Lz4::new(level)));
        registry.register(lzma::NAME, lzma::levels(), |level| shared(Lzma::new(level)));
        registry.register(uncompressed::NAME, uncompressed::levels(), |level| {
            shared(Uncompressed::new(level))
        });
        registry
    }

    /// Registers a codec under a case-insensitive name, replacing any
    /// previous registration and its cached instances.
    pub fn register<F>(&self, name: &str, levels: Levels, factory: F)
    where
        F: Fn(Option<i32>) -> Result<Arc<dyn Codec>> + Send + Sync + 'static,
    {
        let key = name.to_ascii_lowercase();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(name, _), _| *name != key);
        entries.insert(
            key,
            Entry {
                levels,
                factory: Box::new(factory),
            },
        );
    }

    /// Returns the codec registered under `name`, at `level` or the codec's default.
    ///
    /// Repeated calls with equivalent arguments return the same instance.
    pub fn get(&self, name: &str, level: Option<i32>) -> Result<Arc<dyn Codec>> {
        let key = name.to_ascii_lowercase();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .get(&key)
            .ok_or_else(|| Error::UnknownCodec(name.to_owned()))?;
        let level = entry.levels.resolve(&key, level)?;

        let cache_key = (key, level);
        if let Some(codec) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&cache_key)
        {
            return Ok(codec.clone());
        }

        let codec = (entry.factory)(level)?;
        log::debug!("constructed {} codec at level {:?}", cache_key.0, level);
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(cache.entry(cache_key).or_insert(codec).clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&name.to_ascii_lowercase())
    }

    /// Registered names in lexicographic order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn levels(&self, name: &str) -> Result<Levels> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name.to_ascii_lowercase())
            .map(|entry| entry.levels)
            .ok_or_else(|| Error::UnknownCodec(name.to_owned()))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

/// The process-wide registry holding the built-in codecs.
pub fn global() -> &'static Registry {
    static GLOBAL: OnceLock<Registry> = OnceLock::new();
    GLOBAL.get_or_init(Registry::new)
}

/// Looks up a codec in the [`global`] registry.
pub fn get(name: &str, level: Option<i32>) -> Result<Arc<dyn Codec>> {
    global().get(name, level)
}
