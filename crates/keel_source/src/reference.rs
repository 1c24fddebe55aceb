//! References a unit declares to other units: module specifiers and
//! triple-slash reference directives.

use crate::span::TextRange;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The module system a unit or a reference is interpreted under.
///
/// Doubles as the resolution mode of a specifier: `EsModule` selects the
/// `import` conditions of a package, `CommonJs` the `require` ones.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    /// `require`-style modules.
    CommonJs,
    /// `import`-style modules.
    EsModule,
}

impl ModuleFormat {
    /// Parses the value of a `resolution-mode` attribute.
    pub fn from_resolution_mode(value: &str) -> Option<Self> {
        match value {
            "require" => Some(ModuleFormat::CommonJs),
            "import" => Some(ModuleFormat::EsModule),
            _ => None,
        }
    }
}

impl fmt::Display for ModuleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleFormat::CommonJs => f.write_str("commonjs"),
            ModuleFormat::EsModule => f.write_str("esm"),
        }
    }
}

/// How a module specifier was written.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecifierKind {
    /// `import ... from "x"`, `import "x"` or `export ... from "x"`.
    Static,
    /// `import("x")`.
    Dynamic,
    /// `require("x")`.
    Require,
}

/// A module specifier string found in a unit.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct ModuleSpecifier {
    /// The specifier text without quotes.
    pub text: String,
    /// Range of the string literal, quotes included.
    pub range: TextRange,
    /// How the specifier was written.
    pub kind: SpecifierKind,
}

impl ModuleSpecifier {
    /// Creates a static import specifier.
    pub fn new(text: impl Into<String>, range: TextRange, kind: SpecifierKind) -> Self {
        Self {
            text: text.into(),
            range,
            kind,
        }
    }
}

/// A `/// <reference ... />` directive: a file path, a type library name or
/// a library name, depending on the list it appears in.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct FileReference {
    /// The referenced name as written.
    pub file_name: String,
    /// Range of the attribute value.
    pub range: TextRange,
    /// Explicit `resolution-mode` override.
    pub resolution_mode: Option<ModuleFormat>,
}

impl FileReference {
    /// Creates a reference without a mode override.
    pub fn new(file_name: impl Into<String>, range: TextRange) -> Self {
        Self {
            file_name: file_name.into(),
            range,
            resolution_mode: None,
        }
    }
}

/// Compares two specifier lists by text and kind, ignoring positions.
pub fn same_specifiers(a: &[ModuleSpecifier], b: &[ModuleSpecifier]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.text == y.text && x.kind == y.kind)
}

/// Compares two directive lists by name and mode, ignoring positions.
pub fn same_references(a: &[FileReference], b: &[FileReference]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.file_name == y.file_name && x.resolution_mode == y.resolution_mode)
}
