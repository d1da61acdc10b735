//! Magnitude, cosine and addition across the two vector encodings.
//!
//! Every binary operation matches on the concrete `(sparse | dense)` pair
//! and calls a dedicated routine, so mixed operands never pay for a
//! conversion.

use std::collections::HashMap;

use crate::core::vector::{DenseVector, SparseVector};
use crate::error::{Result, RivError};

/// Borrowed view of either encoding.
#[derive(Clone, Copy, Debug)]
pub enum VectorRef<'a> {
    Sparse(&'a SparseVector),
    Dense(&'a DenseVector),
}

/// Mutable view of either encoding.
#[derive(Debug)]
pub enum VectorMut<'a> {
    Sparse(&'a mut SparseVector),
    Dense(&'a mut DenseVector),
}

impl<'a> From<&'a SparseVector> for VectorRef<'a> {
    fn from(v: &'a SparseVector) -> Self {
        VectorRef::Sparse(v)
    }
}

impl<'a> From<&'a DenseVector> for VectorRef<'a> {
    fn from(v: &'a DenseVector) -> Self {
        VectorRef::Dense(v)
    }
}

impl<'a> From<&'a mut SparseVector> for VectorMut<'a> {
    fn from(v: &'a mut SparseVector) -> Self {
        VectorMut::Sparse(v)
    }
}

impl<'a> From<&'a mut DenseVector> for VectorMut<'a> {
    fn from(v: &'a mut DenseVector) -> Self {
        VectorMut::Dense(v)
    }
}

impl VectorRef<'_> {
    pub fn name(&self) -> &str {
        match self {
            VectorRef::Sparse(v) => &v.name,
            VectorRef::Dense(v) => &v.name,
        }
    }

    /// The stored (possibly stale) magnitude.
    pub fn cached_magnitude(&self) -> f64 {
        match self {
            VectorRef::Sparse(v) => v.magnitude as f64,
            VectorRef::Dense(v) => v.magnitude as f64,
        }
    }
}

// ---- Magnitude ----

const HIGH_BIT: u64 = 1 << 63;

/// Euclidean norm of integer values without overflowing the sum of squares.
///
/// Squares accumulate exactly in a `u64`. Whenever that running sum reaches
/// the high bit it is folded into a rescaled floating accumulator, so the
/// result is `sqrt(acc + running/d) * sqrt(d)` where `d` counts the folds
/// plus one. With no fold the result is exactly `sqrt(Σv²)`.
pub fn overflow_safe_norm(values: impl IntoIterator<Item = i32>) -> f64 {
    let mut running: u64 = 0;
    let mut accumulator = 0.0f64;
    let mut divisor = 1.0f64;

    for v in values {
        let v = v as i64;
        // |i32::MIN|² = 2^62, so one square never reaches the high bit and
        // a sum below 2^63 plus one square stays below 2^64.
        running += (v * v) as u64;
        if running & HIGH_BIT != 0 {
            accumulator *= divisor / (divisor + 1.0);
            divisor += 1.0;
            accumulator += running as f64 / divisor;
            running = 0;
        }
    }

    (accumulator + running as f64 / divisor).sqrt() * divisor.sqrt()
}

pub fn magnitude_sparse(v: &SparseVector) -> f64 {
    overflow_safe_norm(v.values().iter().copied())
}

pub fn magnitude_dense(v: &DenseVector) -> f64 {
    overflow_safe_norm(v.values.iter().copied().filter(|&x| x != 0))
}

/// Freshly computed magnitude of either encoding.
pub fn magnitude<'a>(v: impl Into<VectorRef<'a>>) -> f64 {
    match v.into() {
        VectorRef::Sparse(s) => magnitude_sparse(s),
        VectorRef::Dense(d) => magnitude_dense(d),
    }
}

// ---- Cosine and the distance family ----

fn dot_sparse_sparse(a: &SparseVector, b: &SparseVector) -> i128 {
    let (small, large) = if a.count() <= b.count() { (a, b) } else { (b, a) };
    let lookup: HashMap<usize, i32> = small.iter().collect();
    large
        .iter()
        .filter_map(|(i, v)| lookup.get(&i).map(|&w| v as i128 * w as i128))
        .sum()
}

fn dot_sparse_dense(a: &SparseVector, b: &DenseVector) -> Result<i128> {
    let mut dot: i128 = 0;
    for (i, v) in a.iter() {
        let w = b.values.get(i).ok_or(RivError::DimensionMismatch {
            expected: b.dimensions(),
            got: i + 1,
        })?;
        dot += v as i128 * *w as i128;
    }
    Ok(dot)
}

fn dot_dense_sparse(a: &DenseVector, b: &SparseVector) -> Result<i128> {
    dot_sparse_dense(b, a)
}

fn dot_dense_dense(a: &DenseVector, b: &DenseVector) -> Result<i128> {
    if a.dimensions() != b.dimensions() {
        return Err(RivError::DimensionMismatch {
            expected: a.dimensions(),
            got: b.dimensions(),
        });
    }
    Ok(a.values
        .iter()
        .zip(b.values.iter())
        .map(|(&x, &y)| x as i128 * y as i128)
        .sum())
}

/// Cosine of the angle between `a` and `b`.
///
/// Divides by the product of the operands' *stored* magnitudes, which the
/// caller must keep fresh. A zero magnitude yields a non-finite result.
pub fn cosine<'a, 'b>(a: impl Into<VectorRef<'a>>, b: impl Into<VectorRef<'b>>) -> Result<f64> {
    let (a, b) = (a.into(), b.into());
    let dot = match (a, b) {
        (VectorRef::Sparse(x), VectorRef::Sparse(y)) => dot_sparse_sparse(x, y),
        (VectorRef::Sparse(x), VectorRef::Dense(y)) => dot_sparse_dense(x, y)?,
        (VectorRef::Dense(x), VectorRef::Sparse(y)) => dot_dense_sparse(x, y)?,
        (VectorRef::Dense(x), VectorRef::Dense(y)) => dot_dense_dense(x, y)?,
    };
    Ok(dot as f64 / (a.cached_magnitude() * b.cached_magnitude()))
}

/// Sine from a cosine: opposed vectors count as maximally distant.
pub fn cos_to_sine(cos: f64) -> f64 {
    if cos < 0.0 {
        1.0
    } else if cos >= 1.0 {
        0.0
    } else {
        (1.0 - cos * cos).sqrt()
    }
}

/// Tangent distance from a cosine; `f64::MAX` for opposed vectors.
pub fn cos_to_tangent(cos: f64) -> f64 {
    if cos >= 1.0 {
        0.0
    } else if cos < 0.0 {
        f64::MAX
    } else {
        (1.0 - cos * cos).sqrt() / cos
    }
}

/// Secant distance (`1/cos − 1`); `f64::MAX` for opposed vectors.
pub fn cos_to_secant(cos: f64) -> f64 {
    if cos >= 1.0 {
        0.0
    } else if cos < 0.0 {
        f64::MAX
    } else {
        1.0 / cos - 1.0
    }
}

pub fn sine<'a, 'b>(a: impl Into<VectorRef<'a>>, b: impl Into<VectorRef<'b>>) -> Result<f64> {
    cosine(a, b).map(cos_to_sine)
}

pub fn tangent_distance<'a, 'b>(
    a: impl Into<VectorRef<'a>>,
    b: impl Into<VectorRef<'b>>,
) -> Result<f64> {
    cosine(a, b).map(cos_to_tangent)
}

pub fn secant_distance<'a, 'b>(
    a: impl Into<VectorRef<'a>>,
    b: impl Into<VectorRef<'b>>,
) -> Result<f64> {
    cosine(a, b).map(cos_to_secant)
}

// ---- Addition ----

fn add_sparse_to_sparse(dest: &mut SparseVector, src: &SparseVector) {
    let lookup: HashMap<i32, i32> = src
        .locations()
        .iter()
        .copied()
        .zip(src.values().iter().copied())
        .collect();
    let locations = dest.locations().to_vec();
    for (slot, location) in dest.values_mut().iter_mut().zip(locations) {
        if let Some(v) = lookup.get(&location) {
            *slot += v;
        }
    }
}

fn add_dense_to_sparse(dest: &mut SparseVector, src: &DenseVector) -> Result<()> {
    let dimensions = src.dimensions();
    let locations = dest.locations().to_vec();
    for (slot, location) in dest.values_mut().iter_mut().zip(locations) {
        let v = src
            .values
            .get(location as usize)
            .ok_or(RivError::DimensionMismatch {
                expected: dimensions,
                got: location as usize + 1,
            })?;
        *slot += v;
    }
    Ok(())
}

fn add_sparse_to_dense(dest: &mut DenseVector, src: &SparseVector) -> Result<()> {
    src.expand_into(dest)
}

fn add_dense_to_dense(dest: &mut DenseVector, src: &DenseVector) -> Result<()> {
    if dest.dimensions() != src.dimensions() {
        return Err(RivError::DimensionMismatch {
            expected: dest.dimensions(),
            got: src.dimensions(),
        });
    }
    dest.values += &src.values;
    Ok(())
}

/// `dest += src`.
///
/// A sparse destination keeps its support: only positions it already
/// stores are updated. Metadata is left untouched.
pub fn add<'a, 'b>(dest: impl Into<VectorMut<'a>>, src: impl Into<VectorRef<'b>>) -> Result<()> {
    match (dest.into(), src.into()) {
        (VectorMut::Sparse(d), VectorRef::Sparse(s)) => {
            add_sparse_to_sparse(d, s);
            Ok(())
        }
        (VectorMut::Sparse(d), VectorRef::Dense(s)) => add_dense_to_sparse(d, s),
        (VectorMut::Dense(d), VectorRef::Sparse(s)) => add_sparse_to_dense(d, s),
        (VectorMut::Dense(d), VectorRef::Dense(s)) => add_dense_to_dense(d, s),
    }
}

// ---- Normalisation ----

fn rescale(dense: &DenseVector, multiplier: f64, round: fn(f64) -> f64) -> SparseVector {
    let pairs = dense.values.iter().enumerate().filter_map(|(i, &v)| {
        let scaled = round(v as f64 * multiplier) as i32;
        (scaled != 0).then_some((i, scaled))
    });
    let mut sparse = SparseVector::from_pairs(dense.name.clone(), pairs.collect::<Vec<_>>());
    sparse.frequency = dense.frequency;
    sparse.context_size = dense.context_size;
    sparse.refresh_magnitude();
    sparse
}

fn per_context(dense: &DenseVector, factor: f64) -> Result<f64> {
    if dense.context_size == 0 {
        return Err(RivError::Degenerate {
            name: dense.name.clone(),
            reason: "context size is zero",
        });
    }
    Ok(factor / dense.context_size as f64)
}

/// Scale by `factor / context_size`, rounding half away from zero.
pub fn normalize(dense: &DenseVector, factor: f64) -> Result<SparseVector> {
    let multiplier = per_context(dense, factor)?;
    Ok(rescale(dense, multiplier, f64::round))
}

/// As [`normalize`] but truncating toward zero.
pub fn normalize_floored(dense: &DenseVector, factor: f64) -> Result<SparseVector> {
    let multiplier = per_context(dense, factor)?;
    Ok(rescale(dense, multiplier, f64::trunc))
}

/// Scale so the magnitude approaches `target` (before rounding).
pub fn normalize_to_magnitude(dense: &DenseVector, target: f64) -> Result<SparseVector> {
    let current = magnitude_dense(dense);
    if current == 0.0 {
        return Err(RivError::Degenerate {
            name: dense.name.clone(),
            reason: "magnitude is zero",
        });
    }
    Ok(rescale(dense, target / current, f64::round))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn random_dense(name: &str, d: usize, seed: u64) -> DenseVector {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut v = DenseVector::from_values(name, (0..d).map(|_| rng.gen_range(-20..=20)).collect());
        v.refresh_magnitude();
        v
    }

    #[test]
    fn test_magnitude_exact_below_threshold() {
        let values = vec![3, -4, 12, 0, 84];
        let naive = values.iter().map(|&v| (v as i64 * v as i64) as u64).sum::<u64>() as f64;
        assert_eq!(overflow_safe_norm(values), naive.sqrt());
    }

    #[test]
    fn test_magnitude_overflow_safe() {
        let values = vec![i32::MAX; 10]
            .into_iter()
            .chain(vec![i32::MIN; 7])
            .collect::<Vec<_>>();
        let exact: u128 = values.iter().map(|&v| (v as i128 * v as i128) as u128).sum();
        let expected = (exact as f64).sqrt();
        let got = overflow_safe_norm(values);
        assert!(((got - expected) / expected).abs() < 1e-6, "{got} vs {expected}");
    }

    #[test]
    fn test_magnitude_dense_and_sparse_agree() {
        let d = random_dense("x", 400, 7);
        let s = d.consolidate();
        assert_eq!(magnitude(&d), magnitude(&s));
        assert_eq!(magnitude(&DenseVector::zeros("z", 5)), 0.0);
    }

    #[test]
    fn test_cosine_self_is_one() {
        let d = random_dense("x", 300, 1);
        let s = d.consolidate_with_metadata();
        for cos in [
            cosine(&d, &d).unwrap(),
            cosine(&d, &s).unwrap(),
            cosine(&s, &d).unwrap(),
            cosine(&s, &s).unwrap(),
        ] {
            assert!((cos - 1.0).abs() < 1e-5, "{cos}");
        }
    }

    #[test]
    fn test_cosine_bounds() {
        for seed in 0..20 {
            let a = random_dense("a", 64, seed);
            let b = random_dense("b", 64, seed + 100);
            let cos = cosine(&a, &b).unwrap();
            assert!((-1.0 - 1e-5..=1.0 + 1e-5).contains(&cos), "{cos}");
        }
    }

    #[test]
    fn test_cosine_mixed_pairs_agree() {
        let a = random_dense("a", 200, 3);
        let b = random_dense("b", 200, 4);
        let sa = a.consolidate_with_metadata();
        let sb = b.consolidate_with_metadata();
        let dd = cosine(&a, &b).unwrap();
        assert!((cosine(&sa, &b).unwrap() - dd).abs() < 1e-5);
        assert!((cosine(&a, &sb).unwrap() - dd).abs() < 1e-5);
        assert!((cosine(&sa, &sb).unwrap() - dd).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_zero_magnitude_not_finite() {
        let a = DenseVector::zeros("a", 8);
        let b = random_dense("b", 8, 2);
        assert!(!cosine(&a, &b).unwrap().is_finite());
    }

    #[test]
    fn test_cosine_dimension_mismatch() {
        let a = random_dense("a", 8, 1);
        let b = random_dense("b", 9, 1);
        assert!(matches!(
            cosine(&a, &b),
            Err(RivError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_sine_edges() {
        assert_eq!(cos_to_sine(-0.3), 1.0);
        assert_eq!(cos_to_sine(1.0), 0.0);
        assert_eq!(cos_to_sine(1.0000001), 0.0);
        assert!((cos_to_sine(0.6) - 0.8).abs() < 1e-12);
        assert_eq!(cos_to_sine(0.0), 1.0);
    }

    #[test]
    fn test_distance_family() {
        assert_eq!(cos_to_tangent(1.0), 0.0);
        assert_eq!(cos_to_tangent(-0.5), f64::MAX);
        assert!((cos_to_tangent(0.6) - 0.8 / 0.6).abs() < 1e-12);
        assert_eq!(cos_to_secant(1.0), 0.0);
        assert_eq!(cos_to_secant(-0.1), f64::MAX);
        assert!((cos_to_secant(0.5) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_sine_of_orthogonal_vectors() {
        let mut a = DenseVector::from_values("a", vec![1, 0, 0, 0]);
        let mut b = DenseVector::from_values("b", vec![0, 5, 0, 0]);
        a.refresh_magnitude();
        b.refresh_magnitude();
        assert_eq!(sine(&a, &b).unwrap(), 1.0);
        assert_eq!(cosine(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn test_add_dense_pairs() {
        let mut d = DenseVector::from_values("d", vec![1, 2, 3, 4]);
        let other = DenseVector::from_values("o", vec![1, 1, 1, 1]);
        add(&mut d, &other).unwrap();
        assert_eq!(d.values.to_vec(), vec![2, 3, 4, 5]);

        let s = SparseVector::from_pairs("s", vec![(3, -5)]);
        add(&mut d, &s).unwrap();
        assert_eq!(d.values.to_vec(), vec![2, 3, 4, 0]);
    }

    #[test]
    fn test_add_into_sparse_keeps_support() {
        let mut s = SparseVector::from_pairs("s", vec![(0, 1), (2, 1)]);
        let other = SparseVector::from_pairs("o", vec![(2, 4), (3, 9)]);
        add(&mut s, &other).unwrap();
        assert_eq!(s.locations(), &[0, 2]);
        assert_eq!(s.values(), &[1, 5]);

        let dense = DenseVector::from_values("d", vec![10, 10, 10, 10]);
        add(&mut s, &dense).unwrap();
        assert_eq!(s.values(), &[11, 15]);
    }

    #[test]
    fn test_add_dimension_mismatch() {
        let mut d = DenseVector::zeros("d", 4);
        let other = DenseVector::zeros("o", 5);
        assert!(add(&mut d, &other).is_err());
    }

    #[test]
    fn test_normalize_rounds_half_away() {
        let mut d = DenseVector::from_values("w", vec![1, -1, 3, 0, 2]);
        d.frequency = 7;
        d.context_size = 2;
        // multiplier 0.5: 0.5 -> 1, -0.5 -> -1, 1.5 -> 2, 1.0 -> 1
        let n = normalize(&d, 1.0).unwrap();
        assert_eq!(n.locations(), &[0, 1, 2, 4]);
        assert_eq!(n.values(), &[1, -1, 2, 1]);
        assert_eq!(n.name, "w");
        assert_eq!(n.frequency, 7);
        assert_eq!(n.context_size, 2);
        assert!((n.magnitude - 7.0f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_floored_drops_small() {
        let mut d = DenseVector::from_values("w", vec![1, -1, 3, 0, 2]);
        d.context_size = 2;
        let n = normalize_floored(&d, 1.0).unwrap();
        assert_eq!(n.locations(), &[2, 4]);
        assert_eq!(n.values(), &[1, 1]);
    }

    #[test]
    fn test_normalize_degenerate() {
        let d = DenseVector::from_values("w", vec![1, 2]);
        assert!(matches!(
            normalize(&d, 10.0),
            Err(RivError::Degenerate { .. })
        ));
        let z = DenseVector::zeros("z", 4);
        assert!(matches!(
            normalize_to_magnitude(&z, 10.0),
            Err(RivError::Degenerate { .. })
        ));
    }

    #[test]
    fn test_normalize_to_magnitude() {
        let d = DenseVector::from_values("w", vec![30, 0, 40]);
        let n = normalize_to_magnitude(&d, 10.0).unwrap();
        assert_eq!(n.values(), &[6, 8]);
        assert!((n.magnitude - 10.0).abs() < 1e-6);
    }
}
