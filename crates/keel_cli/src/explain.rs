//! `keel explain`: why one file is part of the program.

use keel_common::path::{combine_paths, normalize_path};
use keel_program::ProgramGraph;

use crate::pipeline::{display_path, load_selected};
use crate::{ExplainArgs, GlobalArgs};

/// Runs the `keel explain` command.
///
/// Returns exit code 0 if the file is in the program (or was requested but
/// is missing), 1 if nothing requested it.
pub fn run(args: &ExplainArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let loaded = load_selected(global)?;
    let cwd = normalize_path(&std::env::current_dir()?.to_string_lossy());
    let file_name = combine_paths(&cwd, &args.file);
    match explain(&loaded.graph, &loaded.project_dir, &file_name) {
        Some(lines) => {
            for line in lines {
                println!("{line}");
            }
            Ok(0)
        }
        None => {
            eprintln!("error: `{}` is not part of the program", args.file);
            Ok(1)
        }
    }
}

/// The heading and inclusion chain for `file_name`, or `None` if the
/// program never requested it.
pub fn explain(graph: &ProgramGraph, project_dir: &str, file_name: &str) -> Option<Vec<String>> {
    let path = graph.canonicalizer().canonical(file_name);
    let heading = if let Some(slot) = graph.slot(&path) {
        let name = display_path(slot.file_name(), project_dir);
        match graph.get_unit(&path) {
            Some(target) if slot.is_redirect() => {
                format!("{name} (redirect to {})", display_path(&target.file_name, project_dir))
            }
            _ => name.to_string(),
        }
    } else if graph.is_missing(&path) {
        format!("{} (missing)", display_path(file_name, project_dir))
    } else {
        return None;
    };
    let reasons = graph.explain_inclusion(&path, None);
    Some(
        std::iter::once(heading)
            .chain(reasons.into_iter().map(|reason| format!("  {reason}")))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::load_program;
    use crate::pipeline::testing::{sample_project, write_tree};
    use tempfile::TempDir;

    #[test]
    fn explains_imported_file() {
        let tmp = TempDir::new().unwrap();
        sample_project(tmp.path());
        let loaded = load_program(tmp.path(), None).unwrap();
        let file = format!("{}/src/util.ts", loaded.project_dir);
        let lines = explain(&loaded.graph, &loaded.project_dir, &file).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "src/util.ts");
        assert!(lines[1].contains("Imported via \"./util\""));
    }

    #[test]
    fn explains_missing_root() {
        let tmp = TempDir::new().unwrap();
        sample_project(tmp.path());
        write_tree(
            tmp.path(),
            &[("keel.toml", "[project]\nname = \"s\"\nfiles = [\"src/main.ts\", \"src/gone.ts\"]\n")],
        );
        let loaded = load_program(tmp.path(), None).unwrap();
        let file = format!("{}/src/gone.ts", loaded.project_dir);
        let lines = explain(&loaded.graph, &loaded.project_dir, &file).unwrap();
        assert_eq!(lines, ["src/gone.ts (missing)", "  Root file specified for compilation"]);
    }

    #[test]
    fn unknown_file_is_none() {
        let tmp = TempDir::new().unwrap();
        sample_project(tmp.path());
        let loaded = load_program(tmp.path(), None).unwrap();
        let file = format!("{}/src/other.ts", loaded.project_dir);
        assert!(explain(&loaded.graph, &loaded.project_dir, &file).is_none());
    }
}
