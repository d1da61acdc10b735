//! Crash safety: deferred flushing of write-mode caches on termination
//! signals.

pub mod crash_guard;

pub use crash_guard::CrashRegistry;
