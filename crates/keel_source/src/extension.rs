//! Source file extensions recognized by the engine.

use crate::reference::ModuleFormat;
use serde::{Serialize, Serializer};
use std::fmt;

/// A supported source file extension.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Extension {
    /// `.ts`
    Ts,
    /// `.tsx`
    Tsx,
    /// `.d.ts`
    Dts,
    /// `.mts`
    Mts,
    /// `.cts`
    Cts,
    /// `.d.mts`
    Dmts,
    /// `.d.cts`
    Dcts,
    /// `.js`
    Js,
    /// `.jsx`
    Jsx,
    /// `.mjs`
    Mjs,
    /// `.cjs`
    Cjs,
    /// `.json`
    Json,
}

/// Extensions in match order: compound declaration suffixes first.
const ALL: [Extension; 12] = [
    Extension::Dmts,
    Extension::Dcts,
    Extension::Dts,
    Extension::Mts,
    Extension::Cts,
    Extension::Tsx,
    Extension::Ts,
    Extension::Mjs,
    Extension::Cjs,
    Extension::Jsx,
    Extension::Js,
    Extension::Json,
];

impl Extension {
    /// Extensions tried, in order, when a specifier names no extension and
    /// only typed sources are allowed.
    pub const TYPESCRIPT: &'static [Extension] = &[Extension::Ts, Extension::Tsx, Extension::Dts];

    /// Extensions tried after [`TYPESCRIPT`](Self::TYPESCRIPT) when plain
    /// scripts are allowed.
    pub const JAVASCRIPT: &'static [Extension] = &[Extension::Js, Extension::Jsx];

    /// Returns the extension text including the leading dot.
    pub fn as_str(self) -> &'static str {
        match self {
            Extension::Ts => ".ts",
            Extension::Tsx => ".tsx",
            Extension::Dts => ".d.ts",
            Extension::Mts => ".mts",
            Extension::Cts => ".cts",
            Extension::Dmts => ".d.mts",
            Extension::Dcts => ".d.cts",
            Extension::Js => ".js",
            Extension::Jsx => ".jsx",
            Extension::Mjs => ".mjs",
            Extension::Cjs => ".cjs",
            Extension::Json => ".json",
        }
    }

    /// Determines the extension of a file name, ignoring ASCII case.
    pub fn of(file_name: &str) -> Option<Extension> {
        ALL.into_iter().find(|ext| has_suffix(file_name, ext.as_str()))
    }

    /// Splits `file_name` into its stem and recognized extension.
    pub fn split(file_name: &str) -> Option<(&str, Extension)> {
        let ext = Self::of(file_name)?;
        Some((&file_name[..file_name.len() - ext.as_str().len()], ext))
    }

    /// Returns `true` for declaration-only extensions.
    pub fn is_declaration(self) -> bool {
        matches!(self, Extension::Dts | Extension::Dmts | Extension::Dcts)
    }

    /// Returns `true` for plain script extensions.
    pub fn is_javascript(self) -> bool {
        matches!(
            self,
            Extension::Js | Extension::Jsx | Extension::Mjs | Extension::Cjs
        )
    }

    /// Returns `true` for typed source extensions, declarations included.
    pub fn is_typescript(self) -> bool {
        !self.is_javascript() && self != Extension::Json
    }

    /// The module format forced by the extension, if any.
    pub fn implied_format(self) -> Option<ModuleFormat> {
        match self {
            Extension::Mts | Extension::Dmts | Extension::Mjs => Some(ModuleFormat::EsModule),
            Extension::Cts | Extension::Dcts | Extension::Cjs => Some(ModuleFormat::CommonJs),
            _ => None,
        }
    }

    /// Typed extensions substituted for a script extension written in a
    /// specifier (`./a.js` may name `./a.ts`).
    pub fn typed_counterparts(self) -> &'static [Extension] {
        match self {
            Extension::Js => &[Extension::Ts, Extension::Tsx, Extension::Dts],
            Extension::Jsx => &[Extension::Tsx, Extension::Dts],
            Extension::Mjs => &[Extension::Mts, Extension::Dmts],
            Extension::Cjs => &[Extension::Cts, Extension::Dcts],
            _ => &[],
        }
    }

    /// The declaration extension emitted for a source of this extension.
    pub fn declaration_output(self) -> Extension {
        match self {
            Extension::Mts | Extension::Mjs | Extension::Dmts => Extension::Dmts,
            Extension::Cts | Extension::Cjs | Extension::Dcts => Extension::Dcts,
            _ => Extension::Dts,
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Extension {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

fn has_suffix(name: &str, suffix: &str) -> bool {
    name.len() >= suffix.len()
        && name
            .get(name.len() - suffix.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_suffixes_win() {
        assert_eq!(Extension::of("/a/b.d.ts"), Some(Extension::Dts));
        assert_eq!(Extension::of("/a/b.d.mts"), Some(Extension::Dmts));
        assert_eq!(Extension::of("/a/b.ts"), Some(Extension::Ts));
        assert_eq!(Extension::of("/a/b.JS"), Some(Extension::Js));
        assert_eq!(Extension::of("/a/b.css"), None);
    }

    #[test]
    fn split_returns_stem() {
        assert_eq!(Extension::split("lib/index.d.ts"), Some(("lib/index", Extension::Dts)));
        assert_eq!(Extension::split("noext"), None);
    }

    #[test]
    fn classification() {
        assert!(Extension::Dcts.is_declaration());
        assert!(!Extension::Ts.is_declaration());
        assert!(Extension::Cjs.is_javascript());
        assert!(Extension::Tsx.is_typescript());
        assert!(!Extension::Json.is_typescript());
    }

    #[test]
    fn implied_formats() {
        assert_eq!(Extension::Mts.implied_format(), Some(ModuleFormat::EsModule));
        assert_eq!(Extension::Cjs.implied_format(), Some(ModuleFormat::CommonJs));
        assert_eq!(Extension::Ts.implied_format(), None);
    }

    #[test]
    fn script_specifiers_map_to_typed_sources() {
        assert_eq!(Extension::Js.typed_counterparts()[0], Extension::Ts);
        assert_eq!(Extension::Mjs.typed_counterparts(), &[Extension::Mts, Extension::Dmts]);
        assert!(Extension::Ts.typed_counterparts().is_empty());
    }

    #[test]
    fn declaration_outputs() {
        assert_eq!(Extension::Ts.declaration_output(), Extension::Dts);
        assert_eq!(Extension::Mts.declaration_output(), Extension::Dmts);
    }
}
