//! The vector-space context: configuration, projector and crash registry
//! shared by every lexicon opened through it.

use std::path::Path;
use std::rc::Rc;

use tracing::info;

use crate::config::SpaceConfig;
use crate::core::projector::SeededProjector;
use crate::core::vector::{DenseVector, SparseVector};
use crate::error::Result;
use crate::memory::lexicon::{Lexicon, OpenMode};
use crate::safety::crash_guard::CrashRegistry;

pub struct VectorSpace {
    config: SpaceConfig,
    projector: SeededProjector,
    registry: Rc<CrashRegistry>,
}

impl VectorSpace {
    /// Validate `config` and build a space whose write-mode lexica are
    /// flushed on SIGINT, SIGTERM, SIGHUP and SIGQUIT.
    ///
    /// All such spaces on a thread share one registry, so a signal acted on
    /// in one of them also flushes the lexica of the others.
    pub fn new(config: SpaceConfig) -> Result<Self> {
        Self::with_registry(config, CrashRegistry::shared())
    }

    /// As [`new`](Self::new) but without touching signal dispositions.
    pub fn without_signal_handlers(config: SpaceConfig) -> Result<Self> {
        Self::with_registry(config, Rc::new(CrashRegistry::new()))
    }

    fn with_registry(config: SpaceConfig, registry: Rc<CrashRegistry>) -> Result<Self> {
        let projector = SeededProjector::new(&config)?;
        info!(
            dimensions = config.dimensions,
            nonzeros = config.nonzeros,
            sign_scheme = ?config.sign_scheme,
            seed_case = ?config.seed_case,
            "vector space ready"
        );
        Ok(Self {
            config,
            projector,
            registry,
        })
    }

    pub fn config(&self) -> &SpaceConfig {
        &self.config
    }

    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    pub fn projector(&self) -> &SeededProjector {
        &self.projector
    }

    pub fn registry(&self) -> &CrashRegistry {
        &self.registry
    }

    /// Open a lexicon directory; `flags` as for [`OpenMode`].
    pub fn open(&self, path: impl AsRef<Path>, flags: &str, capacity: usize) -> Result<Lexicon> {
        let mode: OpenMode = flags.parse()?;
        Lexicon::open(
            path,
            mode,
            capacity,
            self.config.dimensions,
            Rc::clone(&self.registry),
        )
    }

    /// Safe point for long-running loops that do not touch a lexicon.
    pub fn checkpoint(&self) {
        self.registry.checkpoint();
    }

    pub fn zero_vector(&self, name: impl Into<String>) -> DenseVector {
        DenseVector::zeros(name, self.config.dimensions)
    }

    pub fn barcode(&self, word: &str) -> SparseVector {
        self.projector.barcode(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_config() {
        let cfg = SpaceConfig::with_dimensions(1, 2);
        assert!(VectorSpace::without_signal_handlers(cfg).is_err());
    }

    #[test]
    fn test_open_uses_space_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let space = VectorSpace::without_signal_handlers(SpaceConfig::with_dimensions(128, 4)).unwrap();
        let mut lexicon = space.open(dir.path(), "rw", 8).unwrap();
        assert_eq!(lexicon.dimensions(), 128);
        assert_eq!(lexicon.pull("kite").unwrap().unwrap().dimensions(), 128);
        assert_eq!(space.registry().registered(), 1);
        assert!(space.open(dir.path(), "q", 8).is_err());
    }

    #[test]
    fn test_signal_spaces_share_a_registry() {
        let a = VectorSpace::new(SpaceConfig::with_dimensions(32, 2)).unwrap();
        let b = VectorSpace::new(SpaceConfig::with_dimensions(64, 2)).unwrap();
        assert!(std::ptr::eq(a.registry(), b.registry()));
        let quiet = VectorSpace::without_signal_handlers(SpaceConfig::with_dimensions(32, 2)).unwrap();
        assert!(!std::ptr::eq(a.registry(), quiet.registry()));
    }

    #[test]
    fn test_barcode_has_nonzeros() {
        let space = VectorSpace::without_signal_handlers(SpaceConfig::with_dimensions(10_000, 2)).unwrap();
        let b = space.barcode("word");
        assert!(b.count() <= 2);
        assert_eq!(b.values().iter().sum::<i32>(), 0);
    }
}
