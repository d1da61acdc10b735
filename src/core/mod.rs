//! Core vector space: seeded word barcodes, the two vector encodings and
//! the algebra between them.

pub mod algebra;
pub mod projector;
pub mod vector;

pub use algebra::{cosine, magnitude, sine, VectorMut, VectorRef};
pub use projector::{Perturbation, SeededProjector};
pub use vector::{DenseVector, LexiconId, SparseVector};
