//! Directive scanner: extracts the references a unit declares without
//! building a syntax tree.
//!
//! Program construction only needs a unit's outgoing edges, so the default
//! parse collaborator scans text for module specifiers, triple-slash
//! directives and `declare module` blocks. Comments are blanked first
//! (offsets preserved) so commented-out imports are not picked up.

use crate::reference::{FileReference, ModuleFormat, ModuleSpecifier, SpecifierKind};
use crate::span::TextRange;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^///\s*<reference\s+(path|types|lib|no-default-lib)\s*=\s*["']([^"']*)["']([^>]*)/?>"#,
    )
    .expect("directive regex")
});

static RESOLUTION_MODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"resolution-mode\s*=\s*["'](require|import)["']"#).expect("mode regex")
});

static STATIC_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|[^.\w$])import\b\s*(?:[\w$*{},\s]+?\s*from\s*)?["']([^"'\r\n]+)["']"#)
        .expect("import regex")
});

static EXPORT_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?:^|[^.\w$])export\b\s*(?:type\b\s*)?(?:\*(?:\s*as\s+[\w$]+)?|\{[^}]*\})\s*from\s*["']([^"'\r\n]+)["']"#,
    )
    .expect("export regex")
});

static DYNAMIC_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|[^.\w$])import\s*\(\s*["']([^"'\r\n]+)["']\s*[,)]"#)
        .expect("dynamic import regex")
});

static REQUIRE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|[^.\w$])require\s*\(\s*["']([^"'\r\n]+)["']\s*\)"#).expect("require regex")
});

static DECLARE_MODULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|[^.\w$])declare\s+module\s+["']([^"'\r\n]+)["']"#)
        .expect("declare module regex")
});

/// Everything the scanner extracts from one text.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Module specifiers in source order.
    pub imports: Vec<ModuleSpecifier>,
    /// `/// <reference path="..." />` directives.
    pub referenced_files: Vec<FileReference>,
    /// `/// <reference types="..." />` directives.
    pub type_reference_directives: Vec<FileReference>,
    /// `/// <reference lib="..." />` directives.
    pub lib_reference_directives: Vec<FileReference>,
    /// `declare module "x"` names in a non-module unit.
    pub ambient_modules: Vec<String>,
    /// `declare module "x"` names in a module unit.
    pub module_augmentations: Vec<String>,
    /// Whether `/// <reference no-default-lib="true" />` was present.
    pub has_no_default_lib: bool,
    /// Whether the text has top-level import or export syntax.
    pub is_external_module: bool,
}

/// Scans `text` for the references it declares.
pub fn scan(text: &str) -> ScanResult {
    let mut result = ScanResult::default();
    scan_header_directives(text, &mut result);

    let code = blank_comments(text);
    result.is_external_module = has_top_level_module_syntax(&code);

    let mut imports: Vec<ModuleSpecifier> = Vec::new();
    for (regex, kind) in [
        (&*STATIC_IMPORT, SpecifierKind::Static),
        (&*EXPORT_FROM, SpecifierKind::Static),
        (&*DYNAMIC_IMPORT, SpecifierKind::Dynamic),
        (&*REQUIRE, SpecifierKind::Require),
    ] {
        for caps in regex.captures_iter(&code) {
            let (name, range) = quoted(&caps);
            imports.push(ModuleSpecifier::new(name, range, kind));
        }
    }
    imports.sort_by_key(|s| s.range.start);
    imports.dedup_by_key(|s| s.range.start);
    result.imports = imports;

    for caps in DECLARE_MODULE.captures_iter(&code) {
        let (name, _) = quoted(&caps);
        let list = if result.is_external_module {
            &mut result.module_augmentations
        } else {
            &mut result.ambient_modules
        };
        if !list.iter().any(|existing| existing == name) {
            list.push(name.to_string());
        }
    }
    result
}

/// Replaces comment text with spaces, keeping newlines and byte offsets.
pub fn blank_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' | b'`' => i = skip_string(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out[i] = b' ';
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = text[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |pos| i + 2 + pos + 2);
                for slot in &mut out[i..end] {
                    if *slot != b'\n' {
                        *slot = b' ';
                    }
                }
                i = end;
            }
            _ => i += 1,
        }
    }
    // Only ASCII bytes inside comments were replaced, so this cannot fail.
    String::from_utf8(out).unwrap_or_else(|_| text.to_string())
}

/// Returns `true` if `import` or `export` appears as a statement at brace
/// depth zero. Exports inside `declare module` bodies do not count.
fn has_top_level_module_syntax(code: &str) -> bool {
    let bytes = code.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' | b'`' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b if depth == 0 && is_ident_start(b) => {
                let start = i;
                while i < bytes.len() && is_ident_byte(bytes[i]) {
                    i += 1;
                }
                let preceded_by_dot = start > 0 && bytes[start - 1] == b'.';
                if !preceded_by_dot {
                    let next = code[i..].trim_start().bytes().next();
                    match &code[start..i] {
                        "export" => return true,
                        "import" if next.is_some_and(|c| is_ident_start(c) || b"*{\"'".contains(&c)) => {
                            return true
                        }
                        _ => {}
                    }
                }
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    false
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_ident_byte(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut j = start + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'\n' if quote != b'`' => return j,
            b if b == quote => return j + 1,
            _ => j += 1,
        }
    }
    bytes.len()
}

/// Reads triple-slash directives from the leading comment block.
fn scan_header_directives(text: &str, out: &mut ScanResult) {
    let mut offset = 0;
    let mut in_block = false;
    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let trimmed = line.trim();
        if in_block {
            in_block = !trimmed.contains("*/");
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("///") {
            let lead = line.len() - line.trim_start().len();
            parse_directive(line[lead..].trim_end(), line_start + lead, out);
        } else if trimmed.starts_with("//") {
            continue;
        } else if trimmed.starts_with("/*") {
            in_block = !trimmed.contains("*/");
        } else {
            break;
        }
    }
}

fn parse_directive(line: &str, base: usize, out: &mut ScanResult) {
    let Some(caps) = DIRECTIVE.captures(line) else {
        return;
    };
    let value = &caps[2];
    let value_match = caps.get(2).map_or(0..0, |m| m.range());
    let range = TextRange::from_usize(base + value_match.start, base + value_match.end);
    let resolution_mode = RESOLUTION_MODE
        .captures(&caps[3])
        .and_then(|m| ModuleFormat::from_resolution_mode(&m[1]));
    let reference = FileReference {
        file_name: value.to_string(),
        range,
        resolution_mode,
    };
    match &caps[1] {
        "path" => out.referenced_files.push(reference),
        "types" => out.type_reference_directives.push(reference),
        "lib" => out.lib_reference_directives.push(FileReference {
            file_name: value.to_ascii_lowercase(),
            ..reference
        }),
        _ => out.has_no_default_lib |= value == "true",
    }
}

/// Extracts capture 1 and the range of its enclosing string literal.
fn quoted<'t>(caps: &Captures<'t>) -> (&'t str, TextRange) {
    match caps.get(1) {
        Some(m) => (
            m.as_str(),
            TextRange::from_usize(m.start().saturating_sub(1), m.end() + 1),
        ),
        None => ("", TextRange::default()),
    }
}
