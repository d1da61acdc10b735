//! Persistent lexicon storage.
//!
//! - **word_index**: pruning prefix tree over `[A-Za-z_]` words
//! - **codec**: the per-word record format
//! - **cache**: fixed slots with frequency-biased eviction
//! - **lexicon**: the directory-backed store tying them together

pub mod cache;
pub mod codec;
pub mod lexicon;
pub mod word_index;

pub use cache::FlushReport;
pub use lexicon::{CloseReport, Lexicon, LexiconStats, OpenMode, PushOutcome};
pub use word_index::WordIndex;
