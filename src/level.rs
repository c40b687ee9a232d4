use crate::error::{Error, Result};

/// Compression levels accepted by a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Levels {
    /// The codec has a single fixed mode and takes no level.
    Fixed,
    Range { min: i32, max: i32, default: i32 },
}

impl Levels {
    /// Validates a requested level, substituting the default when none is given.
    ///
    /// Returns `None` for fixed codecs. Out-of-range values are rejected, never clamped.
    pub fn resolve(&self, codec: &str, level: Option<i32>) -> Result<Option<i32>> {
        match (*self, level) {
            (Levels::Fixed, None) => Ok(None),
            (Levels::Fixed, Some(level)) => Err(Error::InvalidLevel {
                codec: codec.to_owned(),
                level,
                expected: "no compression level".to_owned(),
            }),
            (Levels::Range { default, .. }, None) => Ok(Some(default)),
            (Levels::Range { min, max, .. }, Some(level)) if (min..=max).contains(&level) => {
                Ok(Some(level))
            }
            (Levels::Range { min, max, .. }, Some(level)) => Err(Error::InvalidLevel {
                codec: codec.to_owned(),
                level,
                expected: format!("a level in [{}, {}]", min, max),
            }),
        }
    }

    pub fn default_level(&self) -> Option<i32> {
        match self {
            Levels::Fixed => None,
            Levels::Range { default, .. } => Some(*default),
        }
    }
}
