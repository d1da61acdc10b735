//! Seeded random projection of words into the vector space.
//!
//! A word's barcode is K signed unit entries at pseudo-random coordinates.
//! The generator is reseeded from the word's characters on every call, so a
//! barcode never needs to be stored: it can be regenerated to subtract a word
//! back out of any vector it was added to.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::{SeedCase, SignScheme, SpaceConfig};
use crate::core::vector::{DenseVector, SparseVector};
use crate::error::{Result, RivError};

/// One barcode entry: `values[coordinate] += sign`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Perturbation {
    pub coordinate: usize,
    pub sign: i32,
}

/// Positional sum of character codes: `Σ code(c) << (5·i)`.
///
/// Shift amounts wrap modulo 64 and the sum wraps on overflow, so long words
/// still produce a well-defined seed. With [`SeedCase::Insensitive`] each
/// code is reduced modulo 32 first, folding ASCII case together.
pub fn word_seed(word: &str, case: SeedCase) -> u64 {
    word.bytes().enumerate().fold(0u64, |seed, (i, b)| {
        let code = match case {
            SeedCase::Sensitive => b as u64,
            SeedCase::Insensitive => (b % 32) as u64,
        };
        let shift = ((5 * i) % 64) as u32;
        seed.wrapping_add(code << shift)
    })
}

/// Deterministic word → barcode generator for one vector space.
#[derive(Clone, Debug)]
pub struct SeededProjector {
    dimensions: usize,
    nonzeros: usize,
    sign_scheme: SignScheme,
    seed_case: SeedCase,
}

impl SeededProjector {
    pub fn new(config: &SpaceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            dimensions: config.dimensions,
            nonzeros: config.nonzeros,
            sign_scheme: config.sign_scheme,
            seed_case: config.seed_case,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn nonzeros(&self) -> usize {
        self.nonzeros
    }

    pub fn seed(&self, word: &str) -> u64 {
        word_seed(word, self.seed_case)
    }

    /// The K perturbations for `word`. Coordinates may collide.
    pub fn project(&self, word: &str) -> Vec<Perturbation> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed(word));
        (0..self.nonzeros)
            .map(|k| {
                let coordinate = rng.gen_range(0..self.dimensions);
                let sign = match self.sign_scheme {
                    SignScheme::Alternating => {
                        if k % 2 == 0 {
                            1
                        } else {
                            -1
                        }
                    }
                    SignScheme::Random => {
                        if rng.gen::<bool>() {
                            1
                        } else {
                            -1
                        }
                    }
                };
                Perturbation { coordinate, sign }
            })
            .collect()
    }

    /// Add `word`'s barcode to a raw coordinate buffer of length D.
    pub fn add_to_values(&self, values: &mut [i32], word: &str) -> Result<()> {
        if values.len() != self.dimensions {
            return Err(RivError::DimensionMismatch {
                expected: self.dimensions,
                got: values.len(),
            });
        }
        for p in self.project(word) {
            values[p.coordinate] += p.sign;
        }
        Ok(())
    }

    /// Add `word`'s barcode to `vector` in place.
    pub fn add_to_dense(&self, vector: &mut DenseVector, word: &str) -> Result<()> {
        self.check_dimensions(vector)?;
        for p in self.project(word) {
            vector.values[p.coordinate] += p.sign;
        }
        Ok(())
    }

    /// Regenerate `word`'s barcode and subtract it from `vector`.
    pub fn subtract_from_dense(&self, vector: &mut DenseVector, word: &str) -> Result<()> {
        self.check_dimensions(vector)?;
        for p in self.project(word) {
            vector.values[p.coordinate] -= p.sign;
        }
        Ok(())
    }

    /// Remove a word from its own context: subtract the barcode of
    /// `vector.name` and shrink `context_size` by one.
    pub fn subtract_own_word(&self, vector: &mut DenseVector) -> Result<()> {
        let name = vector.name.clone();
        self.subtract_from_dense(vector, &name)?;
        vector.context_size -= 1;
        Ok(())
    }

    /// `word`'s barcode as a sparse vector named `word`. Colliding
    /// coordinates are summed and cancelled entries dropped.
    pub fn barcode(&self, word: &str) -> SparseVector {
        let mut pairs: Vec<(usize, i32)> = Vec::with_capacity(self.nonzeros);
        for p in self.project(word) {
            match pairs.iter_mut().find(|(i, _)| *i == p.coordinate) {
                Some((_, v)) => *v += p.sign,
                None => pairs.push((p.coordinate, p.sign)),
            }
        }
        pairs.retain(|&(_, v)| v != 0);
        let mut sparse = SparseVector::from_pairs(word, pairs);
        sparse.refresh_magnitude();
        sparse
    }

    fn check_dimensions(&self, vector: &DenseVector) -> Result<()> {
        if vector.dimensions() != self.dimensions {
            return Err(RivError::DimensionMismatch {
                expected: self.dimensions,
                got: vector.dimensions(),
            });
        }
        Ok(())
    }
}
