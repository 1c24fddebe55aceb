//! Structured diagnostic messages with severity, codes, labels and notes.

use crate::code::DiagnosticCode;
use crate::label::Label;
use crate::severity::Severity;
use keel_source::Span;
use serde::Serialize;
use std::cmp::Ordering;

/// A structured diagnostic message.
///
/// Program-level problems (an invalid option, a missing root) have no
/// location; everything attributable to a place in a unit carries a
/// [`Span`]. Notes hold the explanation chain, such as the list of reasons
/// a file is part of the program.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The code identifying the kind of diagnostic.
    pub code: DiagnosticCode,
    /// The main diagnostic message.
    pub message: String,
    /// Where the problem is, if it has a location.
    pub location: Option<Span>,
    /// Related locations.
    pub labels: Vec<Label>,
    /// Explanatory footnotes.
    pub notes: Vec<String>,
    /// Actionable suggestions.
    pub help: Vec<String>,
}

impl Diagnostic {
    /// Creates an error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>, location: Option<Span>) -> Self {
        Self::new(Severity::Error, code, message, location)
    }

    /// Creates a warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>, location: Option<Span>) -> Self {
        Self::new(Severity::Warning, code, message, location)
    }

    /// Creates a diagnostic with an explicit severity.
    pub fn new(
        severity: Severity,
        code: DiagnosticCode,
        message: impl Into<String>,
        location: Option<Span>,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            location,
            labels: Vec::new(),
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    /// Adds a label to this diagnostic.
    pub fn with_label(mut self, label: Label) -> Self {
        self.labels.push(label);
        self
    }

    /// Adds a note to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Adds several notes, in order.
    pub fn with_notes(mut self, notes: impl IntoIterator<Item = String>) -> Self {
        self.notes.extend(notes);
        self
    }

    /// Adds a help message to this diagnostic.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }

    /// Compares by location (unlocated first), then code, then message.
    pub fn report_order(&self, other: &Self) -> Ordering {
        self.location
            .cmp(&other.location)
            .then_with(|| self.code.cmp(&other.code))
            .then_with(|| self.message.cmp(&other.message))
            .then_with(|| self.notes.cmp(&other.notes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Category;
    use keel_common::Canonicalizer;

    const CODE: DiagnosticCode = DiagnosticCode::new(Category::Resolution, 101);

    #[test]
    fn create_error() {
        let diag = Diagnostic::error(CODE, "cannot find module './x'", None);
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.code.to_string(), "R101");
    }

    #[test]
    fn builder_methods() {
        let span = Span::new(Canonicalizer::new(true).canonical("/a.ts"), 0, 5);
        let diag = Diagnostic::warning(CODE, "w", Some(span.clone()))
            .with_label(Label::related(span, "imported here"))
            .with_note("file is a root")
            .with_help("check the path");
        assert_eq!(diag.labels.len(), 1);
        assert_eq!(diag.notes, vec!["file is a root"]);
        assert_eq!(diag.help.len(), 1);
    }

    #[test]
    fn unlocated_sorts_first() {
        let span = Span::new(Canonicalizer::new(true).canonical("/a.ts"), 0, 5);
        let located = Diagnostic::error(CODE, "a", Some(span));
        let global = Diagnostic::error(CODE, "z", None);
        assert_eq!(global.report_order(&located), Ordering::Less);
    }
}
