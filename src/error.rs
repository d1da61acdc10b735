//! Error taxonomy for vector and lexicon operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::vector::DenseVector;

/// Errors surfaced by the vector space and the lexicon.
///
/// An absent word in an exclusive lexicon is not an error (`Ok(None)`), and a
/// full cache is not an error either: it triggers eviction.
#[derive(Debug, Error)]
pub enum RivError {
    /// Invalid dimensionality, nonzero count, capacity or open flags.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The record on disk does not match its declared layout.
    #[error("corrupt record for '{word}' at {}: {reason}", path.display())]
    CorruptRecord {
        word: String,
        path: PathBuf,
        reason: String,
    },

    /// Words become file names, so only `[A-Za-z_]+` is accepted.
    #[error("invalid word {0:?}: expected 1..=99 characters from [A-Za-z_]")]
    InvalidWord(String),

    /// The resident vector for this word is currently held by the caller.
    #[error("'{0}' is checked out of the cache; push it back before pulling again")]
    CheckedOut(String),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Normalisation against a zero context size or zero magnitude.
    #[error("degenerate vector '{name}': {reason}")]
    Degenerate { name: String, reason: &'static str },

    /// Header serialisation failure.
    #[error("record encoding failed: {0}")]
    Encode(#[from] bincode::Error),

    /// A vector leaving the cache could not be written. It is handed back so
    /// the caller can retry the push.
    #[error("could not write '{}' to disk: {source}", vector.name)]
    Unwritten {
        vector: Box<DenseVector>,
        #[source]
        source: Box<RivError>,
    },

    #[error("{failed} of {total} cached vectors could not be flushed")]
    FlushIncomplete { failed: usize, total: usize },
}

impl RivError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RivError::Io {
            path: path.into(),
            source,
        }
    }

    /// The vector carried by [`RivError::Unwritten`], if this is one.
    pub fn into_unwritten(self) -> Option<DenseVector> {
        match self {
            RivError::Unwritten { vector, .. } => Some(*vector),
            _ => None,
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, RivError>;
