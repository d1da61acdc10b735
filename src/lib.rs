//! # riv
//!
//! **Random Indexing Vectors**: a semantic vector space where every word is a
//! high-dimensional integer vector accumulated from the contexts it occurs in.
//!
//! ## Components
//!
//! 1. **SeededProjector**: a word's elemental ±1 "barcode", regenerable from
//!    the word alone
//! 2. **Dense / sparse vectors**: two encodings of the same integer vector
//!    with overflow-safe magnitude and pair-dispatched cosine / add
//! 3. **WordIndex**: a pruning prefix tree over `[A-Za-z_]` words
//! 4. **Lexicon**: one file per word behind a bounded cache with
//!    frequency-biased eviction and best-effort flush on termination signals
//!
//! ## Typical flow
//!
//! ```no_run
//! use riv::runtime::space::VectorSpace;
//! use riv::config::SpaceConfig;
//!
//! let space = VectorSpace::new(SpaceConfig::default())?;
//! let mut lexicon = space.open("lexicon", "rw", 1_000)?;
//! riv::runtime::ingest::ingest_line(&space, &mut lexicon, "the cat sat on the mat")?;
//! lexicon.close()?;
//! # Ok::<(), riv::RivError>(())
//! ```

pub mod core;
pub mod error;
pub mod memory;
pub mod runtime;
pub mod safety;

pub use error::{Result, RivError};

/// Vector-space constants and the startup configuration.
pub mod config {
    use serde::{Deserialize, Serialize};

    use crate::error::{Result, RivError};

    /// Default dimensionality of every vector.
    pub const DEFAULT_DIMENSIONS: usize = 25_000;

    /// Default number of ±1 entries in a word barcode.
    pub const DEFAULT_NONZEROS: usize = 2;

    /// Default number of cache slots for a lexicon.
    pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

    /// Smallest dimensionality accepted.
    pub const MIN_DIMENSIONS: usize = 4;

    /// Longest word accepted as a lexicon key (bytes).
    pub const MAX_WORD_LEN: usize = 99;

    /// Size of the fixed record header on disk:
    /// `u64` count + `i32` frequency + `i32` context size + `f32` magnitude.
    pub const RECORD_HEADER_BYTES: usize = 8 + 4 + 4 + 4;

    /// Records with fewer nonzeros than this are stored sparse.
    pub fn sparse_threshold(dimensions: usize) -> usize {
        dimensions / 2
    }

    /// How barcode signs are assigned to successive draws.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum SignScheme {
        /// +1, −1, +1, …; every barcode sums to zero.
        #[default]
        Alternating,
        /// An independent fair coin per draw.
        Random,
    }

    /// Whether character codes are folded modulo 32 before seeding.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum SeedCase {
        #[default]
        Sensitive,
        Insensitive,
    }

    /// Process-wide vector-space configuration, fixed at startup.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct SpaceConfig {
        /// Dimensionality D.
        pub dimensions: usize,

        /// Barcode nonzero count K (even, at least 2).
        pub nonzeros: usize,

        pub sign_scheme: SignScheme,

        pub seed_case: SeedCase,
    }

    impl Default for SpaceConfig {
        fn default() -> Self {
            Self {
                dimensions: DEFAULT_DIMENSIONS,
                nonzeros: DEFAULT_NONZEROS,
                sign_scheme: SignScheme::default(),
                seed_case: SeedCase::default(),
            }
        }
    }

    impl SpaceConfig {
        /// Configuration with the given D and K and default schemes.
        pub fn with_dimensions(dimensions: usize, nonzeros: usize) -> Self {
            Self {
                dimensions,
                nonzeros,
                ..Default::default()
            }
        }

        /// Reject configurations the vector space cannot run with.
        pub fn validate(&self) -> Result<()> {
            if self.dimensions < MIN_DIMENSIONS {
                return Err(RivError::Config(format!(
                    "dimensions must be at least {}, got {}",
                    MIN_DIMENSIONS, self.dimensions
                )));
            }
            if self.dimensions > i32::MAX as usize {
                return Err(RivError::Config(format!(
                    "dimensions must fit a 32-bit index, got {}",
                    self.dimensions
                )));
            }
            if self.nonzeros < 2 || self.nonzeros % 2 != 0 {
                return Err(RivError::Config(format!(
                    "nonzeros must be an even number >= 2, got {}",
                    self.nonzeros
                )));
            }
            Ok(())
        }
    }

    /// Returns whether `word` can be used as a lexicon key (`[A-Za-z_]{1,99}`).
    ///
    /// Keys become file names, so anything that could form a path
    /// (`/`, `.`, NUL) is excluded.
    pub fn is_clean_word(word: &str) -> bool {
        !word.is_empty()
            && word.len() <= MAX_WORD_LEN
            && word.bytes().all(|b| b.is_ascii_alphabetic() || b == b'_')
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_default_is_valid() {
            assert!(SpaceConfig::default().validate().is_ok());
        }

        #[test]
        fn test_odd_nonzeros_rejected() {
            let cfg = SpaceConfig::with_dimensions(100, 3);
            assert!(matches!(cfg.validate(), Err(RivError::Config(_))));
        }

        #[test]
        fn test_tiny_dimensions_rejected() {
            let cfg = SpaceConfig::with_dimensions(2, 2);
            assert!(cfg.validate().is_err());
        }

        #[test]
        fn test_sparse_threshold() {
            assert_eq!(sparse_threshold(25_000), 12_500);
            assert_eq!(sparse_threshold(9), 4);
        }

        #[test]
        fn test_clean_words() {
            assert!(is_clean_word("cat"));
            assert!(is_clean_word("new_york"));
            assert!(is_clean_word("Cat"));
            assert!(is_clean_word("neverSeen"));
            assert!(!is_clean_word(""));
            assert!(!is_clean_word("../etc"));
            assert!(!is_clean_word("a.b"));
            assert!(!is_clean_word("caf\u{e9}"));
            assert!(!is_clean_word(&"a".repeat(MAX_WORD_LEN + 1)));
        }

        #[test]
        fn test_config_bincode_round_trip() {
            let cfg = SpaceConfig {
                sign_scheme: SignScheme::Random,
                ..Default::default()
            };
            let bytes = bincode::serialize(&cfg).unwrap();
            let back: SpaceConfig = bincode::deserialize(&bytes).unwrap();
            assert_eq!(back, cfg);
        }
    }
}
