//! Shared pipeline helpers for CLI commands.
//!
//! Finds the project root, loads `keel.toml`, and builds the program over
//! the real filesystem.

use std::path::{Path, PathBuf};

use keel_common::path::{combine_paths, normalize_path};
use keel_config::CONFIG_FILE_NAME;
use keel_program::{create_program, NoChanges, ProgramGraph, ProgramRequest, SourceHost};
use keel_resolve::OsFileSystem;

use crate::GlobalArgs;

/// A built program and the directory it was built from.
pub struct LoadedProgram {
    /// The program.
    pub graph: ProgramGraph,
    /// The normalized project directory.
    pub project_dir: String,
}

/// Walks up from `start` looking for the nearest directory containing
/// `keel.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE_NAME).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE_NAME} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the project root directory from global CLI args.
///
/// `--config` may name the file (its directory is used) or the directory.
/// Otherwise walks up from the current directory.
pub fn resolve_project_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match &global.config {
        Some(config_path) => {
            let p = PathBuf::from(config_path);
            if p.is_file() {
                Ok(p.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf))
            } else {
                Ok(p)
            }
        }
        None => find_project_root(&std::env::current_dir()?),
    }
}

/// Loads the configuration in `project_dir` and builds its program.
pub fn load_program(project_dir: &Path, lib_dir: Option<&str>) -> Result<LoadedProgram, Box<dyn std::error::Error>> {
    let config = keel_config::load_config(project_dir)?;
    let absolute = if project_dir.is_absolute() {
        project_dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(project_dir)
    };
    let project_dir = normalize_path(&absolute.to_string_lossy());
    let lib_dir = match lib_dir {
        Some(dir) => combine_paths(&project_dir, dir),
        None => combine_paths(&project_dir, "lib"),
    };
    tracing::debug!(project = %config.project.name, dir = %project_dir, lib = %lib_dir, "loading program");

    let host = SourceHost::new(OsFileSystem::with_current_directory(project_dir.clone()), lib_dir);
    let request = ProgramRequest::from_config(&config, &project_dir);
    let graph = create_program(&request, &host, None, &NoChanges)?;
    Ok(LoadedProgram { graph, project_dir })
}

/// [`load_program`] for the project the global flags select.
pub fn load_selected(global: &GlobalArgs) -> Result<LoadedProgram, Box<dyn std::error::Error>> {
    let root = resolve_project_root(global)?;
    let loaded = load_program(&root, global.lib_dir.as_deref())?;
    if !global.quiet {
        eprintln!(
            "   Building program ({} file(s), {} library file(s))",
            loaded.graph.unit_count(),
            loaded.graph.library_count()
        );
    }
    Ok(loaded)
}

/// `name` relative to `dir` when it lies inside it.
pub fn display_path<'a>(name: &'a str, dir: &str) -> &'a str {
    name.strip_prefix(dir)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(name)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::fs;
    use std::path::Path;

    /// Writes `files` under `root`, creating directories.
    pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
        for (name, text) in files {
            let path = root.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, text).unwrap();
        }
    }

    /// A project with one root importing a sibling, and a default library.
    pub fn sample_project(root: &Path) {
        write_tree(
            root,
            &[
                ("keel.toml", "[project]\nname = \"sample\"\nfiles = [\"src/main.ts\"]\n"),
                ("src/main.ts", "import { util } from './util';\n"),
                ("src/util.ts", "export const util = 1;\n"),
                ("lib/lib.d.ts", "interface Array<T> {}\n"),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{sample_project, write_tree};
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn find_project_root_in_current_dir() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("keel.toml"), "[project]\nname=\"t\"\nfiles=[\"a.ts\"]\n").unwrap();
        let root = find_project_root(tmp.path()).unwrap();
        assert_eq!(root, tmp.path());
    }

    #[test]
    fn find_project_root_in_parent() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("keel.toml"), "[project]\nname=\"t\"\nfiles=[\"a.ts\"]\n").unwrap();
        let sub = tmp.path().join("src");
        fs::create_dir_all(&sub).unwrap();
        assert_eq!(find_project_root(&sub).unwrap(), tmp.path());
    }

    #[test]
    fn find_project_root_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = find_project_root(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("could not find keel.toml"));
    }

    #[test]
    fn config_flag_accepts_file_or_directory() {
        let tmp = TempDir::new().unwrap();
        sample_project(tmp.path());
        let as_file = GlobalArgs {
            quiet: true,
            verbose: false,
            color: false,
            config: Some(tmp.path().join("keel.toml").to_string_lossy().into_owned()),
            lib_dir: None,
        };
        assert_eq!(resolve_project_root(&as_file).unwrap(), tmp.path());
        let as_dir = GlobalArgs {
            config: Some(tmp.path().to_string_lossy().into_owned()),
            ..as_file
        };
        assert_eq!(resolve_project_root(&as_dir).unwrap(), tmp.path());
    }

    #[test]
    fn load_sample_program() {
        let tmp = TempDir::new().unwrap();
        sample_project(tmp.path());
        let loaded = load_program(tmp.path(), None).unwrap();
        let names: Vec<&str> = loaded
            .graph
            .units()
            .map(|slot| display_path(slot.file_name(), &loaded.project_dir))
            .collect();
        assert_eq!(names, ["lib/lib.d.ts", "src/util.ts", "src/main.ts"]);
        assert!(loaded.graph.program_diagnostics().is_empty());
    }

    #[test]
    fn missing_config_is_an_error() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("src/main.ts", "")]);
        assert!(load_program(tmp.path(), None).is_err());
    }

    #[test]
    fn display_path_strips_project_dir() {
        assert_eq!(display_path("/p/src/a.ts", "/p"), "src/a.ts");
        assert_eq!(display_path("/other/a.ts", "/p"), "/other/a.ts");
        assert_eq!(display_path("/p", "/p"), "/p");
    }
}
