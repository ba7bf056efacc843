//! Collection point for the diagnostics a placement run raises.

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Accumulates diagnostics over the lifetime of a placement run.
///
/// The engine treats the sink as append-only while it anneals: warnings
/// (clamped channel spans, an under-accepted starting-temperature probe) are
/// recorded and the run continues, while the consistency checker deposits
/// its individual findings here before failing with only a count. Tallies
/// are kept per severity in atomics, so the hot path can ask
/// [`has_errors`](Self::has_errors) without touching the entry lock.
pub struct DiagnosticSink {
    entries: Mutex<Vec<Diagnostic>>,
    notes: AtomicUsize,
    warnings: AtomicUsize,
    errors: AtomicUsize,
}

impl DiagnosticSink {
    /// Creates a sink with no recorded diagnostics.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            notes: AtomicUsize::new(0),
            warnings: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        }
    }

    /// Records a diagnostic and bumps its severity tally.
    pub fn emit(&self, diag: Diagnostic) {
        self.tally(diag.severity).fetch_add(1, Ordering::Relaxed);
        self.entries.lock().unwrap().push(diag);
    }

    fn tally(&self, severity: Severity) -> &AtomicUsize {
        match severity {
            Severity::Note => &self.notes,
            Severity::Warning => &self.warnings,
            Severity::Error => &self.errors,
        }
    }

    /// Returns how many diagnostics of the given severity have been recorded.
    pub fn count(&self, severity: Severity) -> usize {
        self.tally(severity).load(Ordering::Relaxed)
    }

    /// Returns `true` if any error-severity diagnostics have been recorded.
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Returns the number of error diagnostics recorded so far.
    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    /// Returns the number of warning diagnostics recorded so far.
    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// Drains the recorded diagnostics, oldest first.
    ///
    /// The severity tallies are left intact; they describe the whole run,
    /// not the current contents of the sink.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.entries.lock().unwrap())
    }

    /// Returns a copy of the recorded diagnostics without draining them.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.entries.lock().unwrap().clone()
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}
