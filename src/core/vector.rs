//! Dense and sparse encodings of a random-indexing vector.
//!
//! Both encodings carry the same metadata (`frequency`, `context_size`,
//! `magnitude`). The metadata is never recomputed on mutation: callers that
//! change `values` are responsible for calling [`DenseVector::refresh_magnitude`]
//! (or the sparse equivalent) before comparing.

use std::fmt;

use ndarray::Array1;

use crate::core::algebra;
use crate::error::{Result, RivError};

/// Identity of an open lexicon, used to mark vectors owned by its cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LexiconId(pub(crate) u64);

/// Full-length integer vector plus metadata.
#[derive(Clone, PartialEq)]
pub struct DenseVector {
    /// The word this vector represents (empty for anonymous contexts).
    pub name: String,

    /// Number of occurrences folded into this vector.
    pub frequency: i32,

    /// Aggregate size of all contexts folded into this vector.
    pub context_size: i32,

    /// Cached magnitude. Stale until refreshed by the caller.
    pub magnitude: f32,

    /// D signed coordinates.
    pub values: Array1<i32>,

    /// `Some(id)` while this vector belongs to lexicon `id`'s cache.
    pub(crate) cached: Option<LexiconId>,
}

impl DenseVector {
    /// Zero vector of `dimensions` coordinates.
    pub fn zeros(name: impl Into<String>, dimensions: usize) -> Self {
        Self {
            name: name.into(),
            frequency: 0,
            context_size: 0,
            magnitude: 0.0,
            values: Array1::zeros(dimensions),
            cached: None,
        }
    }

    /// Build from raw coordinates.
    pub fn from_values(name: impl Into<String>, values: Vec<i32>) -> Self {
        Self {
            name: name.into(),
            frequency: 0,
            context_size: 0,
            magnitude: 0.0,
            values: Array1::from_vec(values),
            cached: None,
        }
    }

    /// Dimensionality D.
    pub fn dimensions(&self) -> usize {
        self.values.len()
    }

    /// Number of nonzero coordinates.
    pub fn nonzero_count(&self) -> usize {
        self.values.iter().filter(|&&v| v != 0).count()
    }

    /// Whether every coordinate is zero.
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|&v| v == 0)
    }

    /// Whether this vector is currently owned by a lexicon cache.
    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    /// The lexicon whose cache owns this vector, if any.
    pub fn cached_by(&self) -> Option<LexiconId> {
        self.cached
    }

    /// Recompute and store the magnitude from `values`.
    pub fn refresh_magnitude(&mut self) -> f32 {
        self.magnitude = algebra::magnitude_dense(self) as f32;
        self.magnitude
    }

    /// Collect the nonzero coordinates, in index order, into a sparse vector.
    ///
    /// Metadata is *not* carried: the result is anonymous with zeroed
    /// frequency, context size and magnitude.
    pub fn consolidate(&self) -> SparseVector {
        let mut locations = Vec::new();
        let mut values = Vec::new();
        for (i, &v) in self.values.iter().enumerate() {
            if v != 0 {
                locations.push(i as i32);
                values.push(v);
            }
        }
        SparseVector::from_parts(String::new(), locations, values)
    }

    /// [`consolidate`](Self::consolidate), then copy name, frequency and
    /// context size and compute a fresh magnitude.
    pub fn consolidate_with_metadata(&self) -> SparseVector {
        let mut sparse = self.consolidate();
        sparse.name = self.name.clone();
        sparse.frequency = self.frequency;
        sparse.context_size = self.context_size;
        sparse.refresh_magnitude();
        sparse
    }
}

impl fmt::Debug for DenseVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DenseVector({:?}, dim={}, nonzero={}, freq={}, ctx={}, mag={:.3}, cached={})",
            self.name,
            self.dimensions(),
            self.nonzero_count(),
            self.frequency,
            self.context_size,
            self.magnitude,
            self.cached.is_some()
        )
    }
}

/// Nonzero coordinates as parallel index / value arrays.
///
/// Indices and values share one allocation: `data[..count]` holds the
/// indices, `data[count..]` the values. Indices are unique but unordered.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseVector {
    pub name: String,
    pub frequency: i32,
    pub context_size: i32,
    pub magnitude: f32,
    count: usize,
    data: Vec<i32>,
}

impl SparseVector {
    /// Empty (all-zero) sparse vector.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::from_parts(name, Vec::new(), Vec::new())
    }

    /// Build from parallel index / value arrays of equal length.
    ///
    /// # Panics
    /// If the arrays differ in length.
    pub fn from_parts(name: impl Into<String>, locations: Vec<i32>, values: Vec<i32>) -> Self {
        assert_eq!(
            locations.len(),
            values.len(),
            "sparse vector needs one value per location"
        );
        let count = locations.len();
        let mut data = locations;
        data.reserve_exact(count);
        data.extend_from_slice(&values);
        Self {
            name: name.into(),
            frequency: 0,
            context_size: 0,
            magnitude: 0.0,
            count,
            data,
        }
    }

    /// Build from `(index, value)` pairs. Indices must be unique.
    pub fn from_pairs(name: impl Into<String>, pairs: impl IntoIterator<Item = (usize, i32)>) -> Self {
        let (locations, values): (Vec<i32>, Vec<i32>) =
            pairs.into_iter().map(|(i, v)| (i as i32, v)).unzip();
        Self::from_parts(name, locations, values)
    }

    /// Number of stored coordinates.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Coordinate indices.
    pub fn locations(&self) -> &[i32] {
        &self.data[..self.count]
    }

    /// Coordinate values, parallel to [`locations`](Self::locations).
    pub fn values(&self) -> &[i32] {
        &self.data[self.count..]
    }

    pub fn values_mut(&mut self) -> &mut [i32] {
        let count = self.count;
        &mut self.data[count..]
    }

    /// `(index, value)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, i32)> + '_ {
        self.locations()
            .iter()
            .zip(self.values())
            .map(|(&i, &v)| (i as usize, v))
    }

    /// Largest stored index, if any.
    pub fn max_location(&self) -> Option<usize> {
        self.locations().iter().max().map(|&i| i as usize)
    }

    /// Recompute and store the magnitude from the stored values.
    pub fn refresh_magnitude(&mut self) -> f32 {
        self.magnitude = algebra::magnitude_sparse(self) as f32;
        self.magnitude
    }

    /// Accumulate into a dense vector: `dense[i] += v` for every pair.
    pub fn expand_into(&self, dense: &mut DenseVector) -> Result<()> {
        let dimensions = dense.dimensions();
        for (i, v) in self.iter() {
            match dense.values.get_mut(i) {
                Some(slot) => *slot += v,
                None => {
                    return Err(RivError::DimensionMismatch {
                        expected: dimensions,
                        got: i + 1,
                    })
                }
            }
        }
        Ok(())
    }

    /// Expand into a fresh dense vector carrying this vector's metadata.
    pub fn to_dense(&self, dimensions: usize) -> Result<DenseVector> {
        let mut dense = DenseVector::zeros(self.name.clone(), dimensions);
        self.expand_into(&mut dense)?;
        dense.frequency = self.frequency;
        dense.context_size = self.context_size;
        dense.magnitude = self.magnitude;
        Ok(dense)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let v = DenseVector::zeros("cat", 16);
        assert_eq!(v.dimensions(), 16);
        assert!(v.is_zero());
        assert!(!v.is_cached());
        assert_eq!(v.name, "cat");
    }

    #[test]
    fn test_consolidate_drops_zeros_and_metadata() {
        let mut dense = DenseVector::from_values("dog", vec![0, 3, 0, -2, 0, 7]);
        dense.frequency = 4;
        dense.context_size = 9;
        let sparse = dense.consolidate();
        assert_eq!(sparse.count(), 3);
        assert_eq!(sparse.locations(), &[1, 3, 5]);
        assert_eq!(sparse.values(), &[3, -2, 7]);
        assert_eq!(sparse.frequency, 0);
        assert_eq!(sparse.context_size, 0);
        assert!(sparse.name.is_empty());
    }

    #[test]
    fn test_consolidate_with_metadata() {
        let mut dense = DenseVector::from_values("dog", vec![0, 3, 0, 4]);
        dense.frequency = 2;
        dense.context_size = 5;
        let sparse = dense.consolidate_with_metadata();
        assert_eq!(sparse.name, "dog");
        assert_eq!(sparse.frequency, 2);
        assert_eq!(sparse.context_size, 5);
        assert!((sparse.magnitude - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_expand_accumulates() {
        let sparse = SparseVector::from_pairs("", vec![(0, 2), (4, -1)]);
        let mut dense = DenseVector::from_values("x", vec![1, 1, 1, 1, 1]);
        sparse.expand_into(&mut dense).unwrap();
        sparse.expand_into(&mut dense).unwrap();
        assert_eq!(dense.values.to_vec(), vec![5, 1, 1, 1, -1]);
    }

    #[test]
    fn test_expand_out_of_range() {
        let sparse = SparseVector::from_pairs("", vec![(9, 1)]);
        let mut dense = DenseVector::zeros("x", 4);
        let err = sparse.expand_into(&mut dense).unwrap_err();
        assert!(matches!(
            err,
            RivError::DimensionMismatch {
                expected: 4,
                got: 10
            }
        ));
    }

    #[test]
    fn test_colocated_layout() {
        let mut sparse = SparseVector::from_parts("w", vec![7, 2], vec![-1, 5]);
        sparse.values_mut()[0] = -3;
        assert_eq!(sparse.locations(), &[7, 2]);
        assert_eq!(sparse.values(), &[-3, 5]);
        assert_eq!(sparse.max_location(), Some(7));
        let pairs: Vec<_> = sparse.iter().collect();
        assert_eq!(pairs, vec![(7, -3), (2, 5)]);
    }

    #[test]
    fn test_to_dense_carries_metadata() {
        let mut sparse = SparseVector::from_pairs("w", vec![(1, 3)]);
        sparse.frequency = 6;
        sparse.context_size = 11;
        let dense = sparse.to_dense(3).unwrap();
        assert_eq!(dense.values.to_vec(), vec![0, 3, 0]);
        assert_eq!(dense.frequency, 6);
        assert_eq!(dense.context_size, 11);
    }
}
