//! Fixed-capacity slot cache fronting a lexicon directory.
//!
//! Each slot owns at most one vector. A resident vector handed to the caller
//! leaves its slot `CheckedOut` until it is pushed back, so a vector is never
//! owned by the cache and the caller at the same time.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::vector::{DenseVector, LexiconId};
use crate::error::{Result, RivError};
use crate::memory::codec;
use crate::memory::word_index::WordIndex;

enum Slot {
    Empty,
    Resident(DenseVector),
    CheckedOut(String),
}

/// Where a vector offered to a full or free cache ended up.
#[derive(Debug)]
pub(crate) enum Placement {
    /// Stored in a free slot.
    Cached,
    /// Stored; the returned occupant lost its slot and must be written out.
    Displaced(DenseVector),
    /// No occupant ranks below the offered vector, which is handed back.
    Rejected(DenseVector),
}

/// Result of writing every resident slot to disk.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub written: usize,
    pub failed: usize,
    /// Words whose vectors were held by the caller and could not be written.
    pub checked_out: Vec<String>,
}

impl FlushReport {
    pub fn merge(&mut self, other: FlushReport) {
        self.written += other.written;
        self.failed += other.failed;
        self.checked_out.extend(other.checked_out);
    }

    pub fn total(&self) -> usize {
        self.written + self.failed
    }
}

pub struct SlotCache {
    id: LexiconId,
    root: PathBuf,
    slots: Vec<Slot>,
    index: WordIndex<usize>,
    free: Vec<usize>,
    cursor: usize,
}

impl SlotCache {
    pub(crate) fn new(id: LexiconId, root: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            id,
            root: root.into(),
            slots: (0..capacity).map(|_| Slot::Empty).collect(),
            index: WordIndex::new(),
            // Popped from the back: slot 0 fills first.
            free: (0..capacity).rev().collect(),
            cursor: 0,
        }
    }

    pub fn id(&self) -> LexiconId {
        self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slots holding a vector (checked-out slots included).
    pub fn occupied(&self) -> usize {
        self.index.len()
    }

    pub fn resident_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Resident(_)))
            .count()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.index.contains(word)
    }

    pub fn is_resident(&self, word: &str) -> bool {
        self.index
            .search(word)
            .is_some_and(|&i| matches!(self.slots[i], Slot::Resident(_)))
    }

    /// Words currently held by the caller.
    pub fn checked_out(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter_map(|s| match s {
                Slot::CheckedOut(word) => Some(word.clone()),
                _ => None,
            })
            .collect()
    }

    /// Frequencies of resident vectors in slot order (`None` for empty or
    /// checked-out slots).
    pub fn frequencies(&self) -> Vec<Option<i32>> {
        self.slots
            .iter()
            .map(|s| match s {
                Slot::Resident(v) => Some(v.frequency),
                _ => None,
            })
            .collect()
    }

    /// Move a resident vector out to the caller.
    ///
    /// `Ok(None)` if the word has no slot.
    pub(crate) fn check_out(&mut self, word: &str) -> Result<Option<DenseVector>> {
        let Some(&i) = self.index.search(word) else {
            return Ok(None);
        };
        match std::mem::replace(&mut self.slots[i], Slot::CheckedOut(word.to_string())) {
            Slot::Resident(vector) => Ok(Some(vector)),
            Slot::CheckedOut(held) => {
                self.slots[i] = Slot::CheckedOut(held);
                Err(RivError::CheckedOut(word.to_string()))
            }
            Slot::Empty => {
                // Index and slots disagree; drop the stale entry.
                self.slots[i] = Slot::Empty;
                self.index.remove(word);
                self.free.push(i);
                Ok(None)
            }
        }
    }

    /// Put `vector` back into the slot its word already occupies.
    ///
    /// Hands the vector back, with its cache marker cleared, if the word has
    /// no slot.
    pub(crate) fn reseat(&mut self, mut vector: DenseVector) -> std::result::Result<(), DenseVector> {
        match self.index.search(&vector.name) {
            Some(&i) => {
                vector.cached = Some(self.id);
                self.slots[i] = Slot::Resident(vector);
                Ok(())
            }
            None => {
                vector.cached = None;
                Err(vector)
            }
        }
    }

    /// Store `vector` in a free slot, or run the eviction scan when full.
    pub(crate) fn place(&mut self, vector: DenseVector) -> Placement {
        match self.free.pop() {
            Some(i) => {
                self.seat(i, vector);
                Placement::Cached
            }
            None => self.evict_for(vector),
        }
    }

    fn seat(&mut self, i: usize, mut vector: DenseVector) {
        vector.cached = Some(self.id);
        match self.index.search_mut(&vector.name) {
            Some(slot) => *slot = i,
            None => {
                self.index.insert(&vector.name, i);
            }
        }
        self.slots[i] = Slot::Resident(vector);
    }

    /// Approximate least-frequent replacement.
    ///
    /// Walks backward from the cursor over every slot once, carrying a
    /// candidate that starts as the incoming vector. Each resident occupant
    /// with a strictly lower frequency than the candidate trades places with
    /// it. Whatever candidate remains after the wrap is the one that leaves.
    fn evict_for(&mut self, incoming: DenseVector) -> Placement {
        let capacity = self.slots.len();
        if capacity == 0 {
            return Placement::Rejected(incoming);
        }

        let mut candidate = incoming;
        let mut last_swap = None;
        let mut pos = self.cursor % capacity;
        for _ in 0..capacity {
            let lower = match &self.slots[pos] {
                Slot::Resident(occupant) => occupant.frequency < candidate.frequency,
                _ => false,
            };
            if lower {
                let previous = std::mem::replace(&mut self.slots[pos], Slot::Empty);
                if let Slot::Resident(occupant) = previous {
                    let placed = std::mem::replace(&mut candidate, occupant);
                    self.seat(pos, placed);
                    last_swap = Some(pos);
                }
            }
            pos = (pos + capacity - 1) % capacity;
        }

        match last_swap {
            None => {
                debug!(word = %candidate.name, frequency = candidate.frequency, "no slot ranks below incoming vector");
                Placement::Rejected(candidate)
            }
            Some(swap) => {
                self.cursor = (swap + capacity - 1) % capacity;
                self.index.remove(&candidate.name);
                candidate.cached = None;
                debug!(word = %candidate.name, frequency = candidate.frequency, slot = swap, "evicting");
                Placement::Displaced(candidate)
            }
        }
    }

    /// Write every resident vector to its file, keeping it resident.
    pub fn flush_all(&self) -> FlushReport {
        let mut report = FlushReport::default();
        for slot in &self.slots {
            match slot {
                Slot::Resident(vector) => {
                    match codec::write_record(&self.root.join(&vector.name), vector) {
                        Ok(()) => report.written += 1,
                        Err(e) => {
                            warn!(word = %vector.name, error = %e, "flush failed");
                            report.failed += 1;
                        }
                    }
                }
                Slot::CheckedOut(word) => report.checked_out.push(word.clone()),
                Slot::Empty => {}
            }
        }
        report
    }

    /// Drop every slot and index entry.
    pub(crate) fn clear(&mut self) {
        let capacity = self.slots.len();
        self.slots.iter_mut().for_each(|s| *s = Slot::Empty);
        self.index.clear();
        self.free = (0..capacity).rev().collect();
        self.cursor = 0;
    }
}
