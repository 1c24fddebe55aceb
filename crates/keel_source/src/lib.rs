//! Compilation-unit data model for program construction.
//!
//! This crate provides [`CompilationUnit`], the graph's view of one source
//! text (its paths, version and declared references), the [`UnitArena`] that
//! stores units and redirects by [`UnitId`], path-based [`Span`]s for
//! diagnostics, and the directive [`scan`](scan::scan) used as the default
//! parse collaborator.

#![warn(missing_docs)]

pub mod arena;
pub mod extension;
pub mod reference;
pub mod resolved_span;
pub mod scan;
pub mod span;
pub mod unit;
pub mod unit_id;

pub use arena::{DuplicatePath, Redirect, UnitArena, UnitSlot};
pub use extension::Extension;
pub use reference::{FileReference, ModuleFormat, ModuleSpecifier, SpecifierKind};
pub use resolved_span::ResolvedSpan;
pub use span::{Span, TextRange};
pub use unit::{CompilationUnit, UnitFlags};
pub use unit_id::UnitId;
