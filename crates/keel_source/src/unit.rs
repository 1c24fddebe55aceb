//! The compilation unit: one source text's identity as tracked by a program.

use crate::extension::Extension;
use crate::reference::{FileReference, ModuleFormat, ModuleSpecifier, SpecifierKind};
use crate::resolved_span::ResolvedSpan;
use crate::scan;
use crate::span::TextRange;
use keel_common::{CanonicalPath, ContentHash};

/// Per-unit flags derived from the text and file name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnitFlags {
    /// The unit only declares types (`.d.ts` and friends).
    pub is_declaration: bool,
    /// The unit carries `/// <reference no-default-lib="true" />`.
    pub has_no_default_lib: bool,
    /// The unit has top-level import or export syntax.
    pub is_external_module: bool,
    /// The file kind, from its extension.
    pub kind: Extension,
}

/// One source text's discovered identity: paths, version and the references
/// it declares. Syntax trees live with the parse collaborator, not here.
///
/// Units are shared behind `Arc` between program generations. Hosts hand
/// back the same `Arc` for unchanged content, which lets the reuse engine
/// compare identity with [`Arc::ptr_eq`](std::sync::Arc::ptr_eq).
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    /// The name the unit was requested by, as spelled by the requester.
    pub file_name: String,
    /// Canonical identity key.
    pub path: CanonicalPath,
    /// Canonical path the text was actually read from (after symlinks).
    pub resolved_path: CanonicalPath,
    /// Content identity token.
    pub version: ContentHash,
    /// The full text.
    pub text: String,
    /// Module specifiers in source order.
    pub imports: Vec<ModuleSpecifier>,
    /// `/// <reference path>` directives.
    pub referenced_files: Vec<FileReference>,
    /// `/// <reference types>` directives.
    pub type_reference_directives: Vec<FileReference>,
    /// `/// <reference lib>` directives.
    pub lib_reference_directives: Vec<FileReference>,
    /// Ambient module names this unit declares.
    pub ambient_modules: Vec<String>,
    /// Module names this unit augments.
    pub module_augmentations: Vec<String>,
    /// Flags derived from the text and name.
    pub flags: UnitFlags,
    /// Module format implied by extension or package scope, when the
    /// resolution strategy distinguishes formats.
    pub implied_format: Option<ModuleFormat>,
    line_starts: Vec<u32>,
}

impl CompilationUnit {
    /// Scans `text` and builds a unit. `resolved_path` defaults to `path`.
    pub fn new(
        file_name: impl Into<String>,
        path: CanonicalPath,
        text: String,
        implied_format: Option<ModuleFormat>,
    ) -> Self {
        let file_name = file_name.into();
        let kind = Extension::of(&file_name).unwrap_or(Extension::Ts);
        let scanned = if kind == Extension::Json {
            scan::ScanResult::default()
        } else {
            scan::scan(&text)
        };
        Self {
            version: ContentHash::of_text(&text),
            line_starts: compute_line_starts(&text),
            resolved_path: path.clone(),
            flags: UnitFlags {
                is_declaration: kind.is_declaration(),
                has_no_default_lib: scanned.has_no_default_lib,
                is_external_module: scanned.is_external_module,
                kind,
            },
            imports: scanned.imports,
            referenced_files: scanned.referenced_files,
            type_reference_directives: scanned.type_reference_directives,
            lib_reference_directives: scanned.lib_reference_directives,
            ambient_modules: scanned.ambient_modules,
            module_augmentations: scanned.module_augmentations,
            file_name,
            path,
            text,
            implied_format,
        }
    }

    /// Sets the path the text was read from.
    pub fn with_resolved_path(mut self, resolved_path: CanonicalPath) -> Self {
        self.resolved_path = resolved_path;
        self
    }

    /// Returns `true` for declaration-only units.
    pub fn is_declaration(&self) -> bool {
        self.flags.is_declaration
    }

    /// The resolution mode used for an import of this unit.
    ///
    /// `None` when the unit has no implied format, which means the resolution
    /// strategy in effect does not distinguish module formats.
    pub fn mode_for_import(&self, specifier: &ModuleSpecifier) -> Option<ModuleFormat> {
        let implied = self.implied_format?;
        Some(match specifier.kind {
            SpecifierKind::Dynamic => ModuleFormat::EsModule,
            SpecifierKind::Require => ModuleFormat::CommonJs,
            SpecifierKind::Static => implied,
        })
    }

    /// The resolution mode used for a reference directive of this unit.
    pub fn mode_for_reference(&self, reference: &FileReference) -> Option<ModuleFormat> {
        reference.resolution_mode.or(self.implied_format)
    }

    /// Converts a byte offset into 1-indexed (line, column) coordinates.
    pub fn line_col(&self, byte_offset: u32) -> (u32, u32) {
        let line_idx = match self.line_starts.binary_search(&byte_offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let line = (line_idx as u32) + 1;
        let col = byte_offset - self.line_starts[line_idx] + 1;
        (line, col)
    }

    /// Resolves a range in this unit to line/column coordinates.
    pub fn resolve_range(&self, range: TextRange) -> ResolvedSpan {
        let end = range.end.min(self.text.len() as u32);
        let start = range.start.min(end);
        let (start_line, start_col) = self.line_col(start);
        let (end_line, end_col) = self.line_col(end.saturating_sub(1).max(start));
        ResolvedSpan {
            file_name: self.file_name.clone(),
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Returns the text covered by `range`, or `""` if it is out of bounds.
    pub fn snippet(&self, range: TextRange) -> &str {
        self.text
            .get(range.start as usize..range.end as usize)
            .unwrap_or("")
    }
}

/// Computes the byte offsets of each line start in the given content.
fn compute_line_starts(content: &str) -> Vec<u32> {
    let mut starts = vec![0u32];
    for (i, byte) in content.bytes().enumerate() {
        if byte == b'\n' {
            starts.push((i + 1) as u32);
        }
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_common::Canonicalizer;

    fn unit(name: &str, text: &str) -> CompilationUnit {
        let path = Canonicalizer::new(true).canonical(name);
        CompilationUnit::new(name, path, text.to_string(), None)
    }

    #[test]
    fn scans_references() {
        let u = unit(
            "/src/a.ts",
            "/// <reference path=\"./g.d.ts\" />\nimport { b } from './b';\nexport {};\n",
        );
        assert_eq!(u.imports.len(), 1);
        assert_eq!(u.referenced_files.len(), 1);
        assert!(u.flags.is_external_module);
        assert!(!u.is_declaration());
        assert_eq!(u.flags.kind, Extension::Ts);
    }

    #[test]
    fn declaration_flag_from_extension() {
        let u = unit("/lib/lib.es5.d.ts", "/// <reference no-default-lib=\"true\"/>\ninterface Array<T> {}\n");
        assert!(u.is_declaration());
        assert!(u.flags.has_no_default_lib);
    }

    #[test]
    fn json_units_have_no_references() {
        let u = unit("/data.json", "{ \"import\": \"./x\" }");
        assert!(u.imports.is_empty());
        assert_eq!(u.flags.kind, Extension::Json);
    }

    #[test]
    fn version_tracks_text() {
        assert_eq!(unit("/a.ts", "x").version, unit("/b.ts", "x").version);
        assert_ne!(unit("/a.ts", "x").version, unit("/a.ts", "y").version);
    }

    #[test]
    fn line_col_resolution() {
        let u = unit("/a.ts", "abc\ndef\nghi");
        assert_eq!(u.line_col(0), (1, 1));
        assert_eq!(u.line_col(5), (2, 2));
        assert_eq!(u.line_col(8), (3, 1));
        let rs = u.resolve_range(TextRange::new(4, 7));
        assert_eq!((rs.start_line, rs.start_col, rs.end_line, rs.end_col), (2, 1, 2, 3));
        assert_eq!(u.snippet(TextRange::new(4, 7)), "def");
        assert_eq!(u.snippet(TextRange::new(40, 70)), "");
    }

    #[test]
    fn import_modes_follow_implied_format() {
        let path = Canonicalizer::new(true).canonical("/a.mts");
        let u = CompilationUnit::new(
            "/a.mts",
            path,
            "import a from 'a';\nconst b = require('b');\n".into(),
            Some(ModuleFormat::EsModule),
        );
        assert_eq!(u.mode_for_import(&u.imports[0]), Some(ModuleFormat::EsModule));
        assert_eq!(u.mode_for_import(&u.imports[1]), Some(ModuleFormat::CommonJs));

        let plain = unit("/b.ts", "import a from 'a';");
        assert_eq!(plain.mode_for_import(&plain.imports[0]), None);
    }
}
