//! Persistent word → vector store: one file per word under a directory,
//! fronted by a bounded [`SlotCache`].
//!
//! Writes are deferred while a word stays resident; its file is brought up to
//! date on eviction, on [`Lexicon::flush`], on [`Lexicon::close`] (or drop),
//! and on a termination signal observed at a checkpoint.

use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use crate::config::is_clean_word;
use crate::core::vector::{DenseVector, LexiconId};
use crate::error::{Result, RivError};
use crate::memory::cache::{FlushReport, Placement, SlotCache};
use crate::memory::codec;
use crate::safety::crash_guard::CrashRegistry;

static NEXT_LEXICON_ID: AtomicU64 = AtomicU64::new(1);

/// Open mode parsed from a flag string such as `"r"`, `"rw"` or `"rwx"`.
///
/// * `r`: read records from disk
/// * `w`: create the directory if needed, cache and write records
/// * `x`: exclusive, so pulling an unknown word yields `None` instead of a
///   fresh zero vector
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpenMode {
    pub read: bool,
    pub write: bool,
    pub exclusive: bool,
}

impl OpenMode {
    pub fn inclusive(&self) -> bool {
        !self.exclusive
    }
}

impl FromStr for OpenMode {
    type Err = RivError;

    fn from_str(flags: &str) -> Result<Self> {
        let mut mode = OpenMode::default();
        for c in flags.chars() {
            match c {
                'r' => mode.read = true,
                'w' => mode.write = true,
                'x' => mode.exclusive = true,
                other => {
                    return Err(RivError::Config(format!(
                        "unknown lexicon flag {other:?} in {flags:?}"
                    )))
                }
            }
        }
        if !mode.read && !mode.write {
            return Err(RivError::Config(format!(
                "lexicon flags {flags:?} need at least one of 'r' or 'w'"
            )));
        }
        Ok(mode)
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.read {
            f.write_str("r")?;
        }
        if self.write {
            f.write_str("w")?;
        }
        if self.exclusive {
            f.write_str("x")?;
        }
        Ok(())
    }
}

/// What `push` did with a vector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// The word already had a slot; the vector went back into it.
    Resident,
    /// Stored in a free slot.
    Cached,
    /// Stored; a lower-frequency occupant was written out to make room.
    Evicted { word: String },
    /// The cache was full of higher-frequency vectors; written to disk.
    WrittenDirect,
    /// Caching disabled; written to disk.
    Written,
    /// Read-only lexicon; nothing was written.
    Discarded,
}

/// Lexicon counters.
#[derive(Clone, Debug, Default)]
pub struct LexiconStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub disk_reads: u64,
    pub evictions: u64,
    pub direct_writes: u64,
    pub flush_failures: u64,
}

impl LexiconStats {
    pub fn hit_rate(&self) -> f32 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f32 / total as f32
        }
    }
}

/// Summary of a close.
pub type CloseReport = FlushReport;

pub struct Lexicon {
    id: LexiconId,
    root: PathBuf,
    mode: OpenMode,
    dimensions: usize,
    capacity: usize,
    cache: Option<Rc<RefCell<SlotCache>>>,
    registry: Rc<CrashRegistry>,
    stats: LexiconStats,
    closed: bool,
}

impl Lexicon {
    /// Open the lexicon directory at `path`.
    ///
    /// Write mode creates the directory (and parents) if needed and, with a
    /// non-zero `capacity`, caches pushed vectors and registers the cache
    /// for crash-time flushing. Read-only mode requires the directory to
    /// exist and never writes.
    pub fn open(
        path: impl AsRef<Path>,
        mode: OpenMode,
        capacity: usize,
        dimensions: usize,
        registry: Rc<CrashRegistry>,
    ) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if mode.write {
            fs::create_dir_all(&root).map_err(|e| RivError::io(&root, e))?;
        } else if !root.is_dir() {
            return Err(RivError::io(
                &root,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "lexicon directory does not exist",
                ),
            ));
        }

        let id = LexiconId(NEXT_LEXICON_ID.fetch_add(1, Ordering::Relaxed));
        let cache = if mode.write && capacity > 0 {
            let cache = Rc::new(RefCell::new(SlotCache::new(id, &root, capacity)));
            registry.register(id, &cache);
            Some(cache)
        } else {
            None
        };

        info!(
            path = %root.display(),
            mode = %mode,
            capacity,
            dimensions,
            "lexicon opened"
        );
        Ok(Self {
            id,
            root,
            mode,
            dimensions,
            capacity,
            cache,
            registry,
            stats: LexiconStats::default(),
            closed: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn id(&self) -> LexiconId {
        self.id
    }

    pub fn stats(&self) -> &LexiconStats {
        &self.stats
    }

    pub fn is_caching(&self) -> bool {
        self.cache.is_some()
    }

    pub fn resident_count(&self) -> usize {
        self.cache
            .as_ref()
            .map_or(0, |c| c.borrow().resident_count())
    }

    pub fn is_resident(&self, word: &str) -> bool {
        self.cache
            .as_ref()
            .is_some_and(|c| c.borrow().is_resident(word))
    }

    /// Whether `word` has a slot in the cache or a file on disk.
    pub fn contains(&self, word: &str) -> bool {
        if !is_clean_word(word) {
            return false;
        }
        self.cache.as_ref().is_some_and(|c| c.borrow().contains(word))
            || self.record_path(word).is_file()
    }

    /// Path of the file backing `word`.
    pub fn record_path(&self, word: &str) -> PathBuf {
        self.root.join(word)
    }

    fn check_word(word: &str) -> Result<()> {
        if is_clean_word(word) {
            Ok(())
        } else {
            Err(RivError::InvalidWord(word.to_string()))
        }
    }

    /// Fetch the vector for `word`.
    ///
    /// A resident vector moves out of its slot; push it back to return it.
    /// Otherwise the record is read from disk. A word with no record yields
    /// a zero vector (inclusive) or `None` (exclusive).
    pub fn pull(&mut self, word: &str) -> Result<Option<DenseVector>> {
        self.registry.checkpoint();
        Self::check_word(word)?;

        if let Some(cache) = &self.cache {
            if let Some(vector) = cache.borrow_mut().check_out(word)? {
                self.stats.cache_hits += 1;
                debug!(word, "cache hit");
                return Ok(Some(vector));
            }
        }
        self.stats.cache_misses += 1;

        let path = self.record_path(word);
        match codec::read_record(&path, word, self.dimensions)? {
            Some(vector) => {
                self.stats.disk_reads += 1;
                Ok(Some(vector))
            }
            None if self.mode.exclusive => Ok(None),
            None => Ok(Some(DenseVector::zeros(word, self.dimensions))),
        }
    }

    /// Hand `vector` back to the lexicon.
    ///
    /// A vector whose word already has a slot (including one pulled from
    /// it) replaces that slot's contents. Otherwise it takes a free slot or
    /// goes through the eviction scan; see [`PushOutcome`].
    ///
    /// If the vector that has to leave the cache (the evicted occupant, or
    /// the pushed vector itself when it ranks lowest) cannot be written, the
    /// push fails with [`RivError::Unwritten`] carrying that vector.
    pub fn push(&mut self, vector: DenseVector) -> Result<PushOutcome> {
        self.registry.checkpoint();
        Self::check_word(&vector.name)?;
        if vector.dimensions() != self.dimensions {
            return Err(RivError::DimensionMismatch {
                expected: self.dimensions,
                got: vector.dimensions(),
            });
        }

        if !self.mode.write {
            debug!(word = %vector.name, "read-only lexicon, discarding");
            return Ok(PushOutcome::Discarded);
        }

        let Some(cache) = &self.cache else {
            codec::write_record(&self.record_path(&vector.name), &vector)?;
            self.stats.direct_writes += 1;
            return Ok(PushOutcome::Written);
        };

        let mut cache = cache.borrow_mut();
        let vector = match cache.reseat(vector) {
            Ok(()) => return Ok(PushOutcome::Resident),
            Err(vector) => vector,
        };

        match cache.place(vector) {
            Placement::Cached => Ok(PushOutcome::Cached),
            Placement::Displaced(evicted) => {
                self.stats.evictions += 1;
                let word = evicted.name.clone();
                write_back(&self.root, evicted)?;
                Ok(PushOutcome::Evicted { word })
            }
            Placement::Rejected(vector) => {
                self.stats.direct_writes += 1;
                write_back(&self.root, vector)?;
                Ok(PushOutcome::WrittenDirect)
            }
        }
    }

    /// Write every resident vector without evicting it.
    pub fn flush(&mut self) -> Result<FlushReport> {
        let Some(cache) = &self.cache else {
            return Ok(FlushReport::default());
        };
        let report = cache.borrow().flush_all();
        self.stats.flush_failures += report.failed as u64;
        if report.failed > 0 {
            return Err(RivError::FlushIncomplete {
                failed: report.failed,
                total: report.total(),
            });
        }
        debug!(written = report.written, "flushed");
        Ok(report)
    }

    /// Flush (write mode) and release the cache.
    pub fn close(mut self) -> Result<CloseReport> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<CloseReport> {
        if self.closed {
            return Ok(CloseReport::default());
        }
        self.closed = true;

        let Some(cache) = self.cache.take() else {
            info!(path = %self.root.display(), "lexicon closed");
            return Ok(CloseReport::default());
        };
        self.registry.unregister(self.id);

        let report = cache.borrow().flush_all();
        cache.borrow_mut().clear();
        self.stats.flush_failures += report.failed as u64;

        if !report.checked_out.is_empty() {
            warn!(
                words = ?report.checked_out,
                "vectors still checked out at close were not written"
            );
        }
        info!(
            path = %self.root.display(),
            written = report.written,
            failed = report.failed,
            hit_rate = self.stats.hit_rate(),
            evictions = self.stats.evictions,
            "lexicon closed"
        );
        if report.failed > 0 {
            return Err(RivError::FlushIncomplete {
                failed: report.failed,
                total: report.total(),
            });
        }
        Ok(report)
    }
}

/// Write a vector leaving the cache, handing it back inside the error on
/// failure.
fn write_back(root: &Path, vector: DenseVector) -> Result<()> {
    match codec::write_record(&root.join(&vector.name), &vector) {
        Ok(()) => Ok(()),
        Err(source) => {
            warn!(word = %vector.name, error = %source, "write-back failed");
            Err(RivError::Unwritten {
                vector: Box::new(vector),
                source: Box::new(source),
            })
        }
    }
}

impl Drop for Lexicon {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(path = %self.root.display(), error = %e, "lexicon close on drop failed");
        }
    }
}

impl fmt::Debug for Lexicon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lexicon")
            .field("root", &self.root)
            .field("mode", &self.mode)
            .field("capacity", &self.capacity)
            .field("resident", &self.resident_count())
            .finish()
    }
}
