//! Human-readable resolved source locations with line/column coordinates.

use std::fmt;

/// A span resolved to human-readable line/column coordinates.
///
/// All line and column values are 1-indexed for display to users.
/// Produced by [`CompilationUnit::resolve_range`](crate::CompilationUnit::resolve_range).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSpan {
    /// The file name as the user spelled it.
    pub file_name: String,
    /// The starting line number (1-indexed).
    pub start_line: u32,
    /// The starting column number (1-indexed).
    pub start_col: u32,
    /// The ending line number (1-indexed).
    pub end_line: u32,
    /// The ending column number (1-indexed).
    pub end_col: u32,
}

impl fmt::Display for ResolvedSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file_name, self.start_line, self.start_col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_shows_start_only() {
        let rs = ResolvedSpan {
            file_name: "src/app.ts".into(),
            start_line: 5,
            start_col: 3,
            end_line: 12,
            end_col: 20,
        };
        assert_eq!(format!("{rs}"), "src/app.ts:5:3");
    }
}
