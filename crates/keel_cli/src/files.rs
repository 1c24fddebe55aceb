//! `keel files`: the program's units in order.

use keel_program::ProgramGraph;
use keel_source::UnitSlot;

use crate::pipeline::{display_path, load_selected};
use crate::{FilesArgs, GlobalArgs};

/// Runs the `keel files` command. Returns exit code 0.
pub fn run(args: &FilesArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let loaded = load_selected(global)?;
    for line in render(&loaded.graph, &loaded.project_dir, args.explain) {
        println!("{line}");
    }
    Ok(0)
}

/// One line per unit, followed by its indented reasons when `explain` is
/// set. Library units and redirects are marked.
pub fn render(graph: &ProgramGraph, project_dir: &str, explain: bool) -> Vec<String> {
    let mut lines = Vec::new();
    for slot in graph.units() {
        let name = display_path(slot.file_name(), project_dir);
        let line = match slot {
            UnitSlot::Redirect(redirect) => {
                let target = graph
                    .get_unit(&redirect.path)
                    .map_or("?", |unit| display_path(&unit.file_name, project_dir));
                format!("{name} -> {target}")
            }
            UnitSlot::Source(_) if graph.is_library(slot.path()) => format!("{name} [lib]"),
            UnitSlot::Source(_) => name.to_string(),
        };
        lines.push(line);
        if explain {
            lines.extend(
                graph
                    .explain_inclusion(slot.path(), None)
                    .into_iter()
                    .map(|reason| format!("  {reason}")),
            );
        }
    }
    for path in graph.missing_paths() {
        lines.push(format!("{} [missing]", display_path(path.as_str(), project_dir)));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::load_program;
    use crate::pipeline::testing::sample_project;
    use tempfile::TempDir;

    #[test]
    fn lists_units_in_program_order() {
        let tmp = TempDir::new().unwrap();
        sample_project(tmp.path());
        let loaded = load_program(tmp.path(), None).unwrap();
        assert_eq!(
            render(&loaded.graph, &loaded.project_dir, false),
            ["lib/lib.d.ts [lib]", "src/util.ts", "src/main.ts"]
        );
    }

    #[test]
    fn explain_adds_reasons() {
        let tmp = TempDir::new().unwrap();
        sample_project(tmp.path());
        let loaded = load_program(tmp.path(), None).unwrap();
        let lines = render(&loaded.graph, &loaded.project_dir, true);
        assert_eq!(lines[2], "src/util.ts");
        assert!(lines[3].starts_with("  Imported via \"./util\" from file '"));
        assert_eq!(lines.last().unwrap(), "  Root file specified for compilation");
    }
}
