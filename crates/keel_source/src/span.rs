//! Source locations used to attribute diagnostics.

use keel_common::CanonicalPath;
use serde::Serialize;

/// A byte offset range within one source text.
///
/// The `start` is inclusive and `end` is exclusive.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default, Serialize)]
pub struct TextRange {
    /// Byte offset of the start of the range (inclusive).
    pub start: u32,
    /// Byte offset of the end of the range (exclusive).
    pub end: u32,
}

impl TextRange {
    /// Creates a range from byte offsets.
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Creates a range from `usize` offsets as produced by string searches.
    pub fn from_usize(start: usize, end: usize) -> Self {
        Self::new(start as u32, end as u32)
    }

    /// Returns the length of this range in bytes.
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Returns `true` if this range has zero length.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A range in a specific unit, addressed by canonical path.
///
/// Spans name their unit by path rather than by arena index so they stay
/// meaningful when a later program generation reorders its units.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize)]
pub struct Span {
    /// The unit this span belongs to.
    pub path: CanonicalPath,
    /// The byte range within the unit's text.
    pub range: TextRange,
}

impl Span {
    /// Creates a span in the unit at `path` with the given byte range.
    pub fn new(path: CanonicalPath, start: u32, end: u32) -> Self {
        Self {
            path,
            range: TextRange::new(start, end),
        }
    }

    /// Creates a span from an existing range.
    pub fn at(path: CanonicalPath, range: TextRange) -> Self {
        Self { path, range }
    }
}
