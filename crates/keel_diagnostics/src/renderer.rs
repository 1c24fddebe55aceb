//! Diagnostic rendering backends for human-readable and machine-readable output.

use crate::diagnostic::Diagnostic;
use crate::label::LabelStyle;
use keel_common::CanonicalPath;
use keel_source::{CompilationUnit, ResolvedSpan, Span, UnitArena};

/// Finds the unit a span points into, for line/column resolution.
pub trait SourceLookup {
    /// Returns the unit registered at `path`.
    fn lookup(&self, path: &CanonicalPath) -> Option<&CompilationUnit>;

    /// Resolves a span to line/column coordinates, if its unit is known.
    fn resolve(&self, span: &Span) -> Option<ResolvedSpan> {
        self.lookup(&span.path).map(|unit| unit.resolve_range(span.range))
    }
}

impl SourceLookup for UnitArena {
    fn lookup(&self, path: &CanonicalPath) -> Option<&CompilationUnit> {
        self.unit_at(path).map(|unit| unit.as_ref())
    }
}

/// Formats diagnostics for an output target.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic, sources: &dyn SourceLookup) -> String;
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// Produces output like:
/// ```text
/// error[R101]: cannot find module './util'
///   --> src/app.ts:3:21
///    |
///  3 | import { f } from './util';
///    |                   ^^^^^^^^
///    = note: src/app.ts is a root file
/// ```
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, text: &str, ansi: &str) -> String {
        if self.color {
            format!("\x1b[{ansi}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic, sources: &dyn SourceLookup) -> String {
        let mut out = String::new();
        let head = format!("{}[{}]", diag.severity, diag.code);
        let ansi = if diag.severity.is_error() { "1;31" } else { "1;33" };
        out.push_str(&format!("{}: {}\n", self.paint(&head, ansi), diag.message));

        if let Some(span) = &diag.location {
            match sources.lookup(&span.path) {
                Some(unit) => {
                    let resolved = unit.resolve_range(span.range);
                    out.push_str(&format!("  --> {resolved}\n"));
                    let line_num = resolved.start_line.to_string();
                    let padding = " ".repeat(line_num.len());
                    let line_content = source_line(&unit.text, span.range.start);
                    out.push_str(&format!("{padding} |\n"));
                    out.push_str(&format!("{line_num} | {line_content}\n"));
                    let carets = "^".repeat(span.range.len().max(1) as usize);
                    let col_padding = " ".repeat((resolved.start_col as usize).saturating_sub(1));
                    let primary_msg = diag
                        .labels
                        .iter()
                        .find(|l| l.style == LabelStyle::Primary)
                        .map(|l| format!(" {}", l.message))
                        .unwrap_or_default();
                    out.push_str(&format!(
                        "{padding} | {col_padding}{}{primary_msg}\n",
                        self.paint(&carets, ansi)
                    ));
                }
                None => out.push_str(&format!("  --> {}\n", span.path)),
            }
        }

        for label in diag.labels.iter().filter(|l| l.style == LabelStyle::Related) {
            let place = sources
                .resolve(&label.span)
                .map_or_else(|| label.span.path.to_string(), |r| r.to_string());
            out.push_str(&format!("   = {place}: {}\n", label.message));
        }
        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }
        out
    }
}

/// Renders each diagnostic as one line of JSON.
pub struct JsonRenderer;

impl DiagnosticRenderer for JsonRenderer {
    fn render(&self, diag: &Diagnostic, sources: &dyn SourceLookup) -> String {
        let position = diag.location.as_ref().and_then(|span| sources.resolve(span));
        let value = serde_json::json!({
            "severity": diag.severity,
            "code": diag.code.to_string(),
            "message": diag.message,
            "file": diag.location.as_ref().map(|span| span.path.as_str()),
            "line": position.as_ref().map(|p| p.start_line),
            "column": position.as_ref().map(|p| p.start_col),
            "notes": diag.notes,
            "help": diag.help,
        });
        value.to_string()
    }
}

/// Extracts the line of source code containing the given byte offset.
fn source_line(content: &str, byte_offset: u32) -> &str {
    let offset = (byte_offset as usize).min(content.len());
    let start = content
        .get(..offset)
        .and_then(|head| head.rfind('\n'))
        .map_or(0, |pos| pos + 1);
    let end = content
        .get(offset..)
        .and_then(|tail| tail.find('\n'))
        .map_or(content.len(), |pos| offset + pos);
    content.get(start..end).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Category, DiagnosticCode};
    use crate::label::Label;
    use keel_common::Canonicalizer;
    use keel_source::UnitSlot;
    use std::sync::Arc;

    fn arena_with(name: &str, text: &str) -> (UnitArena, CanonicalPath) {
        let path = Canonicalizer::new(true).canonical(name);
        let mut arena = UnitArena::new();
        arena
            .insert(UnitSlot::Source(Arc::new(CompilationUnit::new(
                name,
                path.clone(),
                text.to_string(),
                None,
            ))))
            .unwrap();
        (arena, path)
    }

    #[test]
    fn render_error_with_span() {
        let (arena, path) = arena_with("src/app.ts", "let a = 1;\nimport { f } from './util';\n");
        let code = DiagnosticCode::new(Category::Resolution, 101);
        let span = Span::new(path, 29, 37);
        let diag = Diagnostic::error(code, "cannot find module './util'", Some(span.clone()))
            .with_label(Label::primary(span, "not found"))
            .with_note("src/app.ts is a root file");

        let output = TerminalRenderer::new(false).render(&diag, &arena);
        assert!(output.contains("error[R101]: cannot find module './util'"));
        assert!(output.contains("--> src/app.ts:2:19"));
        assert!(output.contains("import { f } from './util';"));
        assert!(output.contains("^^^^^^^^ not found"));
        assert!(output.contains("= note: src/app.ts is a root file"));
    }

    #[test]
    fn render_unlocated() {
        let arena = UnitArena::new();
        let code = DiagnosticCode::new(Category::Options, 201);
        let diag = Diagnostic::error(code, "option 'lib' cannot be specified with 'no_lib'", None);
        let output = TerminalRenderer::new(false).render(&diag, &arena);
        assert!(output.starts_with("error[O201]"));
        assert!(!output.contains("-->"));
    }

    #[test]
    fn color_wraps_header() {
        let arena = UnitArena::new();
        let diag = Diagnostic::warning(DiagnosticCode::new(Category::File, 1), "w", None);
        let output = TerminalRenderer::new(true).render(&diag, &arena);
        assert!(output.contains("\x1b[1;33mwarning[F001]\x1b[0m"));
    }

    #[test]
    fn json_has_position() {
        let (arena, path) = arena_with("/a.ts", "\nimport './b';");
        let diag = Diagnostic::error(
            DiagnosticCode::new(Category::Resolution, 101),
            "missing",
            Some(Span::new(path, 8, 13)),
        );
        let line = JsonRenderer.render(&diag, &arena);
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["code"], "R101");
        assert_eq!(value["line"], 2);
        assert_eq!(value["column"], 8);
        assert_eq!(value["file"], "/a.ts");
        assert_eq!(value["severity"], "error");
    }
}
