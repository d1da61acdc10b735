//! Runtime: the vector-space context and the text ingestion steps built
//! on top of it.

pub mod ingest;
pub mod space;

pub use space::VectorSpace;
