//! Diagnostic codes with category prefixes for structured error identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The area of program construction a diagnostic comes from, determining its
/// prefix letter.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Module and type-reference resolution, prefixed with `R`.
    Resolution,
    /// File discovery and graph structure, prefixed with `F`.
    File,
    /// Compiler option validation, prefixed with `O`.
    Options,
    /// Project references, prefixed with `P`.
    Project,
    /// Host and filesystem faults, prefixed with `H`.
    Host,
    /// Diagnostics produced by checker collaborators, prefixed with `C`.
    Check,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Resolution => 'R',
            Category::File => 'F',
            Category::Options => 'O',
            Category::Project => 'P',
            Category::Host => 'H',
            Category::Check => 'C',
        }
    }
}

/// A structured diagnostic code combining a category prefix and a numeric identifier.
///
/// Displayed as the category prefix followed by a zero-padded 3-digit number,
/// e.g., `R101`, `O204`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a new diagnostic code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}
