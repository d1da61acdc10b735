//! Best-effort flush of write-mode caches when the process is told to stop.
//!
//! The signal handler only records which signal arrived. File I/O happens
//! later, at a checkpoint: `Lexicon::pull`/`push` call
//! [`CrashRegistry::checkpoint`] on entry, and long-running callers can call
//! it themselves. When a signal is pending the checkpoint flushes every
//! registered cache, restores the default disposition and re-raises, so the
//! process still dies the way the sender intended.
//!
//! Synchronous faults (SIGSEGV, SIGBUS) are left alone: a handler that
//! returns from one re-executes the faulting instruction.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Once;

use tracing::{debug, error, info, warn};

use crate::core::vector::LexiconId;
use crate::memory::cache::{FlushReport, SlotCache};

/// Signals that trigger a flush before the process goes down.
pub const FLUSH_SIGNALS: [libc::c_int; 4] =
    [libc::SIGINT, libc::SIGTERM, libc::SIGHUP, libc::SIGQUIT];

static PENDING_SIGNAL: AtomicI32 = AtomicI32::new(0);
static INSTALL: Once = Once::new();

thread_local! {
    static SHARED: Rc<CrashRegistry> = Rc::new(CrashRegistry::with_signal_handlers());
}

extern "C" fn record_signal(signal: libc::c_int) {
    PENDING_SIGNAL.store(signal, Ordering::SeqCst);
}

/// Install the recording handler for [`FLUSH_SIGNALS`], once per process.
pub fn install_handlers() {
    INSTALL.call_once(|| {
        for &signal in &FLUSH_SIGNALS {
            // SAFETY: `record_signal` performs a single atomic store, which is
            // async-signal-safe, and `action` is fully initialised before use.
            let rc = unsafe {
                let mut action: libc::sigaction = std::mem::zeroed();
                action.sa_sigaction =
                    record_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
                action.sa_flags = libc::SA_RESTART;
                libc::sigemptyset(&mut action.sa_mask);
                libc::sigaction(signal, &action, std::ptr::null_mut())
            };
            if rc != 0 {
                warn!(signal, error = %std::io::Error::last_os_error(), "could not install flush handler");
            }
        }
        debug!(signals = ?FLUSH_SIGNALS, "flush handlers installed");
    });
}

/// The signal recorded by the handler and not yet acted on, if any.
pub fn pending_signal() -> Option<i32> {
    match PENDING_SIGNAL.load(Ordering::SeqCst) {
        0 => None,
        signal => Some(signal),
    }
}

fn reraise(signal: libc::c_int) -> ! {
    // SAFETY: restoring SIG_DFL and raising are plain libc calls with no
    // memory-safety preconditions.
    unsafe {
        libc::signal(signal, libc::SIG_DFL);
        libc::raise(signal);
    }
    // Only reached if the signal is blocked.
    std::process::exit(128 + signal)
}

/// Weak links to write-mode caches that must be flushed before the process
/// dies by a signal.
pub struct CrashRegistry {
    caches: RefCell<Vec<(LexiconId, Weak<RefCell<SlotCache>>)>>,
    handle_signals: bool,
}

impl Default for CrashRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CrashRegistry {
    /// A registry that never reacts to signals (flushes only on request).
    pub fn new() -> Self {
        Self {
            caches: RefCell::new(Vec::new()),
            handle_signals: false,
        }
    }

    /// A registry that installs the flush handlers on first registration and
    /// acts on pending signals at every checkpoint.
    pub fn with_signal_handlers() -> Self {
        Self {
            caches: RefCell::new(Vec::new()),
            handle_signals: true,
        }
    }

    /// The signal-handling registry of this thread.
    ///
    /// Every space built with signal handling shares it, so a checkpoint
    /// reached through any of them flushes the caches of all before the
    /// process goes down.
    pub fn shared() -> Rc<CrashRegistry> {
        SHARED.with(Rc::clone)
    }

    pub(crate) fn register(&self, id: LexiconId, cache: &Rc<RefCell<SlotCache>>) {
        if self.handle_signals {
            install_handlers();
        }
        let mut caches = self.caches.borrow_mut();
        caches.retain(|(_, weak)| weak.strong_count() > 0);
        caches.push((id, Rc::downgrade(cache)));
    }

    pub(crate) fn unregister(&self, id: LexiconId) {
        self.caches.borrow_mut().retain(|(other, _)| *other != id);
    }

    /// Number of live registered caches.
    pub fn registered(&self) -> usize {
        self.caches
            .borrow()
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }

    /// Write every resident vector of every registered cache.
    pub fn flush_registered(&self) -> FlushReport {
        let mut report = FlushReport::default();
        for (id, weak) in self.caches.borrow().iter() {
            let Some(cache) = weak.upgrade() else {
                continue;
            };
            match cache.try_borrow() {
                Ok(cache) => report.merge(cache.flush_all()),
                Err(_) => error!(lexicon = id.0, "cache busy, cannot flush"),
            };
        }
        report
    }

    /// Act on a pending signal: flush, then die by that signal.
    ///
    /// Returns immediately when no signal is pending.
    pub fn checkpoint(&self) {
        if !self.handle_signals {
            return;
        }
        let Some(signal) = pending_signal() else {
            return;
        };
        warn!(signal, "termination requested, flushing caches");
        let report = self.flush_registered();
        if report.failed > 0 {
            error!(
                failed = report.failed,
                total = report.total(),
                "some cached vectors were lost"
            );
        }
        if !report.checked_out.is_empty() {
            error!(words = ?report.checked_out, "checked-out vectors were not flushed");
        }
        info!(written = report.written, "flush complete");
        reraise(signal)
    }
}
