//! Diagnostic accumulator for one program construction.

use crate::diagnostic::Diagnostic;

/// Collects diagnostics emitted while a program is built.
///
/// Construction is single-threaded, so the sink is plain owned state; the
/// builder holds it by `&mut` and hands the finished list to the program.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
}

impl DiagnosticSink {
    /// Creates a new empty diagnostic sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits a diagnostic into the sink.
    pub fn emit(&mut self, diag: Diagnostic) {
        if diag.severity.is_error() {
            self.error_count += 1;
        }
        self.diagnostics.push(diag);
    }

    /// Returns `true` if any error-severity diagnostics have been emitted.
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Returns the number of error-severity diagnostics emitted so far.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Returns the diagnostics in emission order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Consumes the sink, returning its diagnostics sorted and deduplicated.
    pub fn finish(self) -> Vec<Diagnostic> {
        sort_and_dedup(self.diagnostics)
    }
}

impl Extend<Diagnostic> for DiagnosticSink {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        for diag in iter {
            self.emit(diag);
        }
    }
}

/// Sorts diagnostics by location, code and message, removing exact duplicates.
pub fn sort_and_dedup(mut diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
    diagnostics.sort_by(|a, b| a.report_order(b));
    diagnostics.dedup();
    diagnostics
}
