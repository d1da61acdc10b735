//! Building and querying a lexicon from text, one line or one whole
//! document per context.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::config::{is_clean_word, MAX_WORD_LEN};
use crate::core::algebra;
use crate::core::projector::SeededProjector;
use crate::core::vector::{DenseVector, SparseVector};
use crate::error::Result;
use crate::memory::lexicon::Lexicon;
use crate::memory::word_index::WordIndex;
use crate::runtime::space::VectorSpace;

/// Lowercase ASCII letters, keep `_`, turn everything else into spaces and
/// drop words too long to be lexicon keys.
pub fn clean_line(line: &str) -> String {
    let mapped: String = line
        .chars()
        .map(|c| match c {
            'a'..='z' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => ' ',
        })
        .collect();
    mapped
        .split_whitespace()
        .filter(|w| w.len() <= MAX_WORD_LEN)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sum of the barcodes of every whitespace-separated word in `text`.
///
/// The result is anonymous; `context_size` is the number of words and the
/// magnitude is fresh.
pub fn text_to_context(projector: &SeededProjector, text: &str) -> Result<SparseVector> {
    let mut scratch = vec![0i32; projector.dimensions()];
    let mut words = 0;
    for word in text.split_whitespace() {
        projector.add_to_values(&mut scratch, word)?;
        words += 1;
    }
    let mut context = DenseVector::from_values("", scratch).consolidate();
    context.context_size = words;
    context.refresh_magnitude();
    Ok(context)
}

/// Fold one line of text into the lexicon.
///
/// Every word of the line receives the line's context minus its own
/// barcode, and its frequency grows by one. Lines of fewer than two words
/// carry no context and are skipped. Returns the number of words updated.
pub fn ingest_line(space: &VectorSpace, lexicon: &mut Lexicon, line: &str) -> Result<usize> {
    let projector = space.projector();
    let context = text_to_context(projector, line)?;
    if context.context_size <= 1 {
        return Ok(0);
    }

    let mut updated = 0;
    for word in line.split_whitespace() {
        if !is_clean_word(word) {
            debug!(word, "skipping unusable word");
            continue;
        }
        let Some(mut vector) = lexicon.pull(word)? else {
            continue;
        };
        algebra::add(&mut vector, &context)?;
        vector.context_size += context.context_size;
        projector.subtract_own_word(&mut vector)?;
        vector.frequency += 1;
        vector.refresh_magnitude();
        lexicon.push(vector)?;
        updated += 1;
    }
    Ok(updated)
}

/// Fold a whole document into the lexicon as a single context.
///
/// Each distinct word is updated once, however often it occurs: it receives
/// the document's context minus its own barcode and its frequency grows by
/// one. Returns the number of distinct words updated.
pub fn ingest_document(space: &VectorSpace, lexicon: &mut Lexicon, text: &str) -> Result<usize> {
    let projector = space.projector();
    let context = text_to_context(projector, text)?;
    if context.context_size <= 1 {
        return Ok(0);
    }

    let mut seen = HashSet::new();
    for word in text.split_whitespace() {
        if !is_clean_word(word) || !seen.insert(word) {
            continue;
        }
        let Some(mut vector) = lexicon.pull(word)? else {
            continue;
        };
        algebra::add(&mut vector, &context)?;
        vector.context_size += context.context_size;
        projector.subtract_own_word(&mut vector)?;
        vector.frequency += 1;
        vector.refresh_magnitude();
        lexicon.push(vector)?;
    }
    debug!(words = seen.len(), context = context.context_size, "document ingested");
    Ok(seen.len())
}

/// Sum of the stored vectors of a line's words, as a sparse vector.
///
/// With `stems`, each word is replaced by its stem and words without one
/// are skipped. Words the lexicon does not know (exclusive mode) are skipped
/// too. `context_size` counts the words that contributed.
pub fn line_to_composite(
    lexicon: &mut Lexicon,
    line: &str,
    stems: Option<&WordIndex<String>>,
) -> Result<SparseVector> {
    let mut accumulator = DenseVector::zeros("", lexicon.dimensions());
    let mut used = 0;
    for word in line.split_whitespace() {
        if !is_clean_word(word) {
            continue;
        }
        let key = match stems {
            Some(stems) => match stems.search(word) {
                Some(stem) => stem.as_str(),
                None => continue,
            },
            None => word,
        };
        let Some(vector) = lexicon.pull(key)? else {
            continue;
        };
        algebra::add(&mut accumulator, &vector)?;
        lexicon.push(vector)?;
        used += 1;
    }
    let mut composite = accumulator.consolidate();
    composite.context_size = used;
    composite.refresh_magnitude();
    Ok(composite)
}

/// Bag-of-words coordinates: each new word gets the next free dimension.
#[derive(Default)]
pub struct BagOfWords {
    index: WordIndex<usize>,
    next: usize,
}

impl BagOfWords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dimension assigned to `word`, assigning one if it is new.
    /// `None` for words outside `[A-Za-z_]`.
    pub fn index_of(&mut self, word: &str) -> Option<usize> {
        if let Some(&i) = self.index.search(word) {
            return Some(i);
        }
        if !self.index.insert(word, self.next) {
            return None;
        }
        self.next += 1;
        Some(self.next - 1)
    }

    pub fn get(&self, word: &str) -> Option<usize> {
        self.index.search(word).copied()
    }

    /// Number of assigned dimensions.
    pub fn len(&self) -> usize {
        self.next
    }

    pub fn is_empty(&self) -> bool {
        self.next == 0
    }

    /// Word counts of `text` keyed by dimension, in dimension order.
    pub fn vectorize(&mut self, text: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, i32> = BTreeMap::new();
        let mut words = 0;
        for word in text.split_whitespace() {
            if let Some(i) = self.index_of(word) {
                *counts.entry(i).or_default() += 1;
                words += 1;
            }
        }
        let mut bag = SparseVector::from_pairs("", counts);
        bag.context_size = words;
        bag.refresh_magnitude();
        bag
    }
}
