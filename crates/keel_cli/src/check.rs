//! `keel check`: report the program's diagnostics.

use keel_diagnostics::{Diagnostic, DiagnosticRenderer, JsonRenderer, Severity, TerminalRenderer};
use keel_program::ProgramGraph;

use crate::pipeline::load_selected;
use crate::{CheckArgs, GlobalArgs, ReportFormat};

/// Runs the `keel check` command.
///
/// Returns exit code 0 if the program has no errors, 2 if it has.
pub fn run(args: &CheckArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let loaded = load_selected(global)?;
    let diagnostics = loaded.graph.program_diagnostics();

    match args.format {
        ReportFormat::Text => {
            for rendered in render(&loaded.graph, &diagnostics, &TerminalRenderer::new(global.color)) {
                eprintln!("{rendered}");
            }
        }
        ReportFormat::Json => {
            for rendered in render(&loaded.graph, &diagnostics, &JsonRenderer) {
                println!("{rendered}");
            }
        }
    }

    let (errors, warnings) = count(&diagnostics);
    if !global.quiet && args.format == ReportFormat::Text {
        eprintln!("   Result: {errors} error(s), {warnings} warning(s)");
    }
    Ok(if errors > 0 { 2 } else { 0 })
}

/// Renders each diagnostic against the program's units.
pub fn render(graph: &ProgramGraph, diagnostics: &[Diagnostic], renderer: &dyn DiagnosticRenderer) -> Vec<String> {
    diagnostics.iter().map(|diag| renderer.render(diag, graph)).collect()
}

/// Error and warning counts.
pub fn count(diagnostics: &[Diagnostic]) -> (usize, usize) {
    let errors = diagnostics.iter().filter(|d| d.severity == Severity::Error).count();
    let warnings = diagnostics.iter().filter(|d| d.severity == Severity::Warning).count();
    (errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::load_program;
    use crate::pipeline::testing::{sample_project, write_tree};
    use tempfile::TempDir;

    #[test]
    fn clean_project_has_no_diagnostics() {
        let tmp = TempDir::new().unwrap();
        sample_project(tmp.path());
        let loaded = load_program(tmp.path(), None).unwrap();
        assert_eq!(count(&loaded.graph.program_diagnostics()), (0, 0));
    }

    #[test]
    fn unresolved_import_renders_with_location() {
        let tmp = TempDir::new().unwrap();
        sample_project(tmp.path());
        write_tree(tmp.path(), &[("src/main.ts", "import { util } from './util';\nimport './nope';\n")]);
        let loaded = load_program(tmp.path(), None).unwrap();
        let diagnostics = loaded.graph.program_diagnostics();
        assert_eq!(count(&diagnostics), (1, 0));

        let text = render(&loaded.graph, &diagnostics, &TerminalRenderer::new(false));
        assert!(text[0].starts_with("error[R101]"));
        assert!(text[0].contains("main.ts:2:"));

        let json = render(&loaded.graph, &diagnostics, &JsonRenderer);
        assert!(json[0].contains("\"code\":\"R101\""));
        assert!(json[0].contains("\"line\":2"));
    }

    #[test]
    fn missing_library_is_reported() {
        let tmp = TempDir::new().unwrap();
        sample_project(tmp.path());
        let loaded = load_program(tmp.path(), Some("no-such-lib")).unwrap();
        let codes: Vec<String> = loaded
            .graph
            .program_diagnostics()
            .iter()
            .map(|d| d.code.to_string())
            .collect();
        assert_eq!(codes, ["F101"]);
    }
}
