//! Structured diagnostics for program construction.
//!
//! Everything that goes wrong while building a program, short of
//! cancellation, becomes a [`Diagnostic`]: unresolved imports, missing
//! referenced files, conflicting redirects, invalid option combinations and
//! host I/O failures. The [`DiagnosticSink`] collects them and produces a
//! deduplicated, deterministically sorted list; renderers format them for a
//! terminal or as JSON.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod label;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use label::{Label, LabelStyle};
pub use renderer::{DiagnosticRenderer, JsonRenderer, SourceLookup, TerminalRenderer};
pub use severity::Severity;
pub use sink::{sort_and_dedup, DiagnosticSink};
