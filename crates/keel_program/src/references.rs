//! Project references: loading referenced `keel.toml` files and mapping
//! their sources to declaration outputs.

use crate::errors;
use keel_common::path::{base_name, combine_paths, directory_of};
use keel_common::{CanonicalPath, Canonicalizer, ContentHash};
use keel_config::{load_config_from_str, CompilerOptions, ProjectReference, CONFIG_FILE_NAME};
use keel_diagnostics::{Diagnostic, DiagnosticSink};
use keel_resolve::FileSystem;
use keel_source::Extension;
use std::collections::HashMap;
use std::sync::Arc;

/// A referenced project, loaded.
#[derive(Debug, Clone)]
pub struct ResolvedProjectReference {
    /// Canonical path of the project's `keel.toml`.
    pub config_path: CanonicalPath,
    /// The configuration file name as spelled.
    pub config_file: String,
    /// Hash of the configuration text.
    pub config_hash: ContentHash,
    /// The project directory.
    pub project_dir: String,
    /// The project name.
    pub name: String,
    /// Absolute root file names.
    pub root_names: Vec<String>,
    /// The project's compiler options.
    pub options: CompilerOptions,
    /// The `prepend` flag of the referencing entry.
    pub prepend: bool,
    /// The `circular` flag of the referencing entry.
    pub circular: bool,
    /// The project's own references.
    pub references: Vec<Option<Arc<ResolvedProjectReference>>>,
}

impl ResolvedProjectReference {
    /// The declaration file `source` is emitted to, or `None` for files that
    /// have no declaration output (declarations and JSON).
    pub fn output_declaration(&self, source: &str) -> Option<String> {
        let (stem, ext) = Extension::split(source)?;
        if ext.is_declaration() || ext == Extension::Json {
            return None;
        }
        let out_ext = ext.declaration_output();
        if let Some(out_file) = &self.options.out_file {
            let out = combine_paths(&self.project_dir, out_file);
            let out_stem = Extension::split(&out).map_or(out.as_str(), |(s, _)| s);
            return Some(format!("{out_stem}{}", Extension::Dts));
        }
        let out_dir = self
            .options
            .declaration_dir
            .as_ref()
            .or(self.options.out_dir.as_ref())
            .map(|dir| combine_paths(&self.project_dir, dir));
        let Some(out_dir) = out_dir else {
            return Some(format!("{stem}{out_ext}"));
        };
        let source_root = self.source_root();
        let relative = stem
            .strip_prefix(source_root.as_str())
            .map(|rest| rest.trim_start_matches('/'))
            .unwrap_or_else(|| base_name(stem));
        Some(format!("{}{out_ext}", combine_paths(&out_dir, relative)))
    }

    /// The directory source paths are made relative to when computing
    /// outputs: `root_dir`, else the project directory.
    pub fn source_root(&self) -> String {
        match &self.options.root_dir {
            Some(root) => combine_paths(&self.project_dir, root),
            None => self.project_dir.clone(),
        }
    }

    /// Every root file with its declaration output.
    pub fn outputs(&self) -> impl Iterator<Item = (&str, Option<String>)> {
        self.root_names
            .iter()
            .map(|name| (name.as_str(), self.output_declaration(name)))
    }
}

/// Loads `references` of the project in `project_dir`, recursively.
///
/// Missing or invalid projects yield `None` with a diagnostic. A cycle is
/// cut where it closes; it is diagnosed unless the closing entry is marked
/// `circular`.
pub fn load_references(
    fs: &dyn FileSystem,
    canon: Canonicalizer,
    project_dir: &str,
    references: &[ProjectReference],
    sink: &mut DiagnosticSink,
) -> Vec<Option<Arc<ResolvedProjectReference>>> {
    let mut loader = Loader {
        fs,
        canon,
        sink,
        loaded: HashMap::new(),
        stack: Vec::new(),
    };
    loader.load_all(project_dir, references)
}

struct Loader<'a> {
    fs: &'a dyn FileSystem,
    canon: Canonicalizer,
    sink: &'a mut DiagnosticSink,
    loaded: HashMap<(CanonicalPath, bool, bool), Arc<ResolvedProjectReference>>,
    stack: Vec<CanonicalPath>,
}

impl Loader<'_> {
    fn load_all(
        &mut self,
        project_dir: &str,
        references: &[ProjectReference],
    ) -> Vec<Option<Arc<ResolvedProjectReference>>> {
        references
            .iter()
            .map(|reference| self.load_one(project_dir, reference))
            .collect()
    }

    fn load_one(
        &mut self,
        project_dir: &str,
        reference: &ProjectReference,
    ) -> Option<Arc<ResolvedProjectReference>> {
        let config_file = config_file_of(project_dir, &reference.path);
        let config_path = self.canon.canonical(&config_file);
        if self.stack.contains(&config_path) {
            if !reference.circular {
                self.sink.emit(Diagnostic::error(
                    errors::P103,
                    format!("project references may not form a cycle through `{config_file}`"),
                    None,
                ));
            }
            return None;
        }
        let key = (config_path.clone(), reference.prepend, reference.circular);
        if let Some(done) = self.loaded.get(&key) {
            return Some(Arc::clone(done));
        }
        let text = match self.fs.read_file(&config_file) {
            Ok(Some(text)) => text,
            Ok(None) => {
                self.sink.emit(Diagnostic::error(
                    errors::P101,
                    format!("referenced project `{config_file}` does not exist"),
                    None,
                ));
                return None;
            }
            Err(e) => {
                self.sink.emit(errors::error_read_failed(&config_file, &e.to_string(), None));
                return None;
            }
        };
        let config = match load_config_from_str(&text) {
            Ok(config) => config,
            Err(e) => {
                self.sink.emit(Diagnostic::error(
                    errors::P105,
                    format!("referenced project `{config_file}` is invalid: {e}"),
                    None,
                ));
                return None;
            }
        };
        let dir = directory_of(&config_file).to_string();
        self.stack.push(config_path.clone());
        let nested = self.load_all(&dir, &config.references);
        self.stack.pop();

        let resolved = Arc::new(ResolvedProjectReference {
            config_hash: ContentHash::of_text(&text),
            root_names: config
                .project
                .files
                .iter()
                .map(|f| combine_paths(&dir, f))
                .collect(),
            name: config.project.name,
            options: config.compiler,
            prepend: reference.prepend,
            circular: reference.circular,
            references: nested,
            project_dir: dir,
            config_path,
            config_file,
        });
        self.loaded.insert(key, Arc::clone(&resolved));
        Some(resolved)
    }
}

/// `<dir>/<path>` if it names a `.toml` file, else `<dir>/<path>/keel.toml`.
pub fn config_file_of(project_dir: &str, path: &str) -> String {
    let joined = combine_paths(project_dir, path);
    if joined.ends_with(".toml") {
        joined
    } else {
        combine_paths(&joined, CONFIG_FILE_NAME)
    }
}

/// Returns `true` if two reference lists have the same shape: same
/// configuration files with the same content and flags, recursively.
pub fn same_references(
    old: &[Option<Arc<ResolvedProjectReference>>],
    new: &[Option<Arc<ResolvedProjectReference>>],
) -> bool {
    old.len() == new.len()
        && old.iter().zip(new).all(|pair| match pair {
            (None, None) => true,
            (Some(a), Some(b)) => {
                Arc::ptr_eq(a, b)
                    || (a.config_path == b.config_path
                        && a.config_hash == b.config_hash
                        && a.prepend == b.prepend
                        && a.circular == b.circular
                        && same_references(&a.references, &b.references))
            }
            _ => false,
        })
}

/// Calls `f` for every loaded reference, depth first, each once.
pub fn for_each_reference<'r>(
    references: &'r [Option<Arc<ResolvedProjectReference>>],
    f: &mut dyn FnMut(&'r ResolvedProjectReference),
) {
    fn walk<'r>(
        references: &'r [Option<Arc<ResolvedProjectReference>>],
        seen: &mut Vec<&'r CanonicalPath>,
        f: &mut dyn FnMut(&'r ResolvedProjectReference),
    ) {
        for reference in references.iter().flatten() {
            if seen.contains(&&reference.config_path) {
                continue;
            }
            seen.push(&reference.config_path);
            f(reference);
            walk(&reference.references, seen, f);
        }
    }
    walk(references, &mut Vec::new(), f);
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_resolve::MemoryFileSystem;

    const CORE: &str = r#"
[project]
name = "core"
files = ["src/index.ts", "src/util.ts", "src/types.d.ts"]

[compiler]
composite = true
out_dir = "dist"
root_dir = "src"
"#;

    fn load(fs: &MemoryFileSystem, refs: &[ProjectReference]) -> (Vec<Option<Arc<ResolvedProjectReference>>>, Vec<Diagnostic>) {
        let mut sink = DiagnosticSink::new();
        let loaded = load_references(fs, Canonicalizer::new(true), "/app", refs, &mut sink);
        (loaded, sink.finish())
    }

    fn reference(path: &str) -> ProjectReference {
        ProjectReference {
            path: path.to_string(),
            prepend: false,
            circular: false,
        }
    }

    #[test]
    fn loads_and_maps_outputs() {
        let fs = MemoryFileSystem::new(true).with_file("/core/keel.toml", CORE);
        let (loaded, diags) = load(&fs, &[reference("../core")]);
        assert!(diags.is_empty());
        let core = loaded[0].as_ref().unwrap();
        assert_eq!(core.name, "core");
        assert_eq!(core.root_names[0], "/core/src/index.ts");
        assert_eq!(
            core.output_declaration("/core/src/index.ts").as_deref(),
            Some("/core/dist/index.d.ts")
        );
        assert_eq!(core.output_declaration("/core/src/types.d.ts"), None);
        assert_eq!(core.outputs().filter(|(_, out)| out.is_some()).count(), 2);
    }

    #[test]
    fn out_file_and_no_out_dir() {
        let mut r = ResolvedProjectReference {
            config_path: Canonicalizer::new(true).canonical("/p/keel.toml"),
            config_file: "/p/keel.toml".into(),
            config_hash: ContentHash::of_text(""),
            project_dir: "/p".into(),
            name: "p".into(),
            root_names: vec![],
            options: CompilerOptions::default(),
            prepend: false,
            circular: false,
            references: vec![],
        };
        assert_eq!(r.output_declaration("/p/a.tsx").as_deref(), Some("/p/a.d.ts"));
        assert_eq!(r.output_declaration("/p/a.mts").as_deref(), Some("/p/a.d.mts"));
        r.options.out_file = Some("out/bundle.js".into());
        assert_eq!(r.output_declaration("/p/a.ts").as_deref(), Some("/p/out/bundle.d.ts"));
    }

    #[test]
    fn missing_project_is_diagnosed() {
        let fs = MemoryFileSystem::new(true);
        let (loaded, diags) = load(&fs, &[reference("../nowhere")]);
        assert!(loaded[0].is_none());
        assert_eq!(diags[0].code, errors::P101);
    }

    #[test]
    fn cycles_are_cut() {
        let fs = MemoryFileSystem::new(true)
            .with_file("/a/keel.toml", "[project]\nname = \"a\"\nfiles = [\"a.ts\"]\n[[references]]\npath = \"../b\"\n")
            .with_file("/b/keel.toml", "[project]\nname = \"b\"\nfiles = [\"b.ts\"]\n[[references]]\npath = \"../a\"\n");
        let (loaded, diags) = load(&fs, &[reference("../a")]);
        let a = loaded[0].as_ref().unwrap();
        let b = a.references[0].as_ref().unwrap();
        assert!(b.references[0].is_none());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, errors::P103);

        let mut names = Vec::new();
        for_each_reference(&loaded, &mut |r| names.push(r.name.clone()));
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn structural_comparison() {
        let mut fs = MemoryFileSystem::new(true).with_file("/core/keel.toml", CORE);
        let (first, _) = load(&fs, &[reference("../core")]);
        let (second, _) = load(&fs, &[reference("../core")]);
        assert!(same_references(&first, &second));

        fs.write("/core/keel.toml", &format!("{CORE}\n# edited\n"));
        let (edited, _) = load(&fs, &[reference("../core")]);
        assert!(!same_references(&first, &edited));
        assert!(!same_references(&first, &[]));
    }

    #[test]
    fn config_file_paths() {
        assert_eq!(config_file_of("/app", "../core"), "/core/keel.toml");
        assert_eq!(config_file_of("/app", "../core/custom.toml"), "/core/custom.toml");
    }
}
