//! Program construction for keel.
//!
//! [`create_program`] turns a [`ProgramRequest`] (root files, compiler
//! options, project references) into an immutable [`ProgramGraph`]: every
//! unit the roots depend on, each import and directive resolved, the reasons
//! each unit is included, and the file-processing and option diagnostics.
//!
//! Given the previous generation, construction first decides how much can
//! be kept ([`ReuseVerdict`]). A `Completely` verdict carries the previous
//! graph over; `SafeModules` rediscovers the graph while keeping unchanged
//! units and their resolutions; `Not` rebuilds from scratch. Checker
//! diagnostics are memoized per program in a [`DiagnosticsStore`] and
//! evicted for units affected by a change.
//!
//! [`ProgramSession`] holds the current generation for a watch loop.

#![warn(missing_docs)]

mod builder;
pub mod errors;
pub mod graph;
pub mod host;
pub mod libs;
mod options_check;
pub mod reasons;
pub mod references;
mod reresolve;
pub mod reuse;
pub mod store;

pub use graph::{ProgramGraph, UnitResolutions};
pub use host::{ChangeOracle, CompilerHost, InvalidatedPaths, NoChanges, SourceHost, UnitRequest};
pub use reasons::{IncludeReason, ReasonStore};
pub use references::{load_references, ResolvedProjectReference};
pub use reuse::{ChangeSignal, ReuseReport, ReuseVerdict};
pub use store::{Checker, DependencyGraph, DiagnosticKind, DiagnosticsStore};

use builder::{BuildInput, ReuseContext};
use keel_common::path::{combine_paths, normalize_path};
use keel_common::{CanonicalPath, KeelResult};
use keel_config::affects::affects_semantic_diagnostics;
use keel_config::{CompilerOptions, ProjectConfig, ProjectReference};
use keel_diagnostics::DiagnosticSink;
use keel_resolve::ResolutionCache;
use keel_source::UnitSlot;
use reuse::{decide, Decision, NewRequest};
use std::collections::HashSet;

/// What to build a program from.
#[derive(Debug, Clone, Default)]
pub struct ProgramRequest {
    /// Root file names, in order. Relative names are taken from the project
    /// directory.
    pub root_names: Vec<String>,
    /// Compiler options.
    pub options: CompilerOptions,
    /// Directory relative paths in the request are resolved against.
    pub project_dir: String,
    /// Referenced projects.
    pub project_references: Vec<ProjectReference>,
}

impl ProgramRequest {
    /// A request without project references.
    pub fn new(root_names: Vec<String>, options: CompilerOptions, project_dir: impl Into<String>) -> Self {
        Self {
            root_names,
            options,
            project_dir: project_dir.into(),
            project_references: Vec::new(),
        }
    }

    /// The request described by a loaded `keel.toml` in `project_dir`.
    pub fn from_config(config: &ProjectConfig, project_dir: &str) -> Self {
        let project_dir = normalize_path(project_dir);
        Self {
            root_names: config
                .project
                .files
                .iter()
                .map(|file| combine_paths(&project_dir, file))
                .collect(),
            options: config.compiler.clone(),
            project_references: config.references.clone(),
            project_dir,
        }
    }
}

/// Builds the program for `request`, reusing what it can of `old`.
///
/// Only cancellation fails; every other problem becomes a diagnostic on the
/// returned graph. `old` is only read.
pub fn create_program(
    request: &ProgramRequest,
    host: &dyn CompilerHost,
    old: Option<&ProgramGraph>,
    oracle: &dyn ChangeOracle,
) -> KeelResult<ProgramGraph> {
    let fs = host.file_system();
    let canon = fs.canonicalizer();
    let project_dir = normalize_path(&request.project_dir);
    let mut sink = DiagnosticSink::new();
    let references = load_references(fs, canon, &project_dir, &request.project_references, &mut sink);
    let input = BuildInput {
        root_names: request.root_names.clone(),
        options: request.options.clone(),
        project_dir,
        lib_dir: normalize_path(&host.default_lib_location()),
        references,
        reference_diagnostics: sink.finish(),
    };

    let Some(old) = old else {
        return build_fresh(input, host, "no previous program".to_string());
    };
    let mut cache = old.cache.for_next_generation(fs, &input.options);
    let new = NewRequest {
        root_names: &input.root_names,
        options: &input.options,
        project_dir: &input.project_dir,
        lib_dir: &input.lib_dir,
        references: &input.references,
    };
    let decision = decide(old, &new, host, &mut cache, oracle)?;
    tracing::debug!(
        verdict = ?decision.verdict,
        reason = decision.reason.as_deref().unwrap_or("unchanged"),
        queued = decision.queued.len(),
        "reuse decision"
    );
    match decision.verdict {
        ReuseVerdict::Completely => Ok(reuse_completely(old, input, cache)),
        ReuseVerdict::SafeModules => reuse_safe_modules(old, input, host, cache, &decision),
        ReuseVerdict::Not => {
            let reason = decision.reason.unwrap_or_else(|| "previous program not reusable".to_string());
            build_fresh(input, host, reason)
        }
    }
}

fn build_fresh(input: BuildInput, host: &dyn CompilerHost, reason: String) -> KeelResult<ProgramGraph> {
    let cache = ResolutionCache::new(input.options.clone(), input.project_dir.clone(), host.file_system().canonicalizer());
    let graph = builder::build(input, host, cache, None, ReuseReport::rebuilt(reason))?;
    tracing::debug!(units = graph.unit_count(), missing = graph.missing.len(), "built program");
    Ok(graph)
}

/// Carries `old` over with the new options and cache.
fn reuse_completely(old: &ProgramGraph, input: BuildInput, cache: ResolutionCache) -> ProgramGraph {
    let mut graph = old.clone();
    if affects_semantic_diagnostics(&old.options, &input.options) {
        graph.store = DiagnosticsStore::new();
    }
    graph.options = input.options;
    graph.cache = cache;
    graph.project_references = input.references;
    graph.reuse = ReuseReport {
        verdict: ReuseVerdict::Completely,
        reason: None,
        signals: Vec::new(),
        reresolved: Vec::new(),
        changed_resolutions: Vec::new(),
        evicted_diagnostics: 0,
    };
    graph.option_diagnostics = builder::validate_options(&graph, input.reference_diagnostics);
    graph
}

/// Rebuilds in reuse mode and carries the diagnostics store, evicting
/// everything that depends on a change.
fn reuse_safe_modules(
    old: &ProgramGraph,
    input: BuildInput,
    host: &dyn CompilerHost,
    cache: ResolutionCache,
    decision: &Decision,
) -> KeelResult<ProgramGraph> {
    let semantic_change = affects_semantic_diagnostics(&old.options, &input.options);
    let context = ReuseContext::new(old, decision);
    let report = ReuseReport {
        verdict: ReuseVerdict::SafeModules,
        reason: decision.reason.clone(),
        signals: decision.signals.clone(),
        reresolved: Vec::new(),
        changed_resolutions: Vec::new(),
        evicted_diagnostics: 0,
    };
    let mut graph = builder::build(input, host, cache, Some(&context), report)?;
    if !semantic_change {
        let store = old.store.clone();
        let mut seeds: HashSet<CanonicalPath> = decision.modified.iter().cloned().collect();
        seeds.extend(graph.reuse.changed_resolutions.iter().cloned());
        seeds.extend(
            old.units()
                .map(UnitSlot::path)
                .filter(|path| graph.slot(path).is_none())
                .cloned(),
        );
        let evicted = store::evict_affected(&store, &old.dependency_graph(), &seeds)
            + store::evict_affected(&store, &graph.dependency_graph(), &seeds);
        graph.reuse.evicted_diagnostics = evicted;
        graph.store = store;
    }
    tracing::debug!(
        units = graph.unit_count(),
        reresolved = graph.reuse.reresolved.len(),
        changed = graph.reuse.changed_resolutions.len(),
        evicted = graph.reuse.evicted_diagnostics,
        "rebuilt program reusing modules"
    );
    Ok(graph)
}

/// The current program of a long-running session.
///
/// Each update derives the next generation from the current one and then
/// drops the current one. A failed update leaves the session unchanged.
#[derive(Debug, Default)]
pub struct ProgramSession {
    current: Option<ProgramGraph>,
}

impl ProgramSession {
    /// Creates a session with no program.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current program, if one was built.
    pub fn current(&self) -> Option<&ProgramGraph> {
        self.current.as_ref()
    }

    /// Builds the next generation for `request` and makes it current.
    pub fn update(
        &mut self,
        request: &ProgramRequest,
        host: &dyn CompilerHost,
        oracle: &dyn ChangeOracle,
    ) -> KeelResult<&ProgramGraph> {
        let next = create_program(request, host, self.current.as_ref(), oracle)?;
        Ok(self.current.insert(next))
    }

    /// Removes and returns the current program.
    pub fn take(&mut self) -> Option<ProgramGraph> {
        self.current.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_common::Canonicalizer;
    use keel_resolve::{MemoryFileSystem, Resolution};
    use std::sync::Arc;

    const LIB: &str = "/lib/lib.d.ts";

    fn host(files: &[(&str, &str)]) -> SourceHost<MemoryFileSystem> {
        let mut fs = MemoryFileSystem::new(true).with_file(LIB, "");
        for (path, text) in files {
            fs.write(path, text);
        }
        SourceHost::new(fs, "/lib")
    }

    fn request(roots: &[&str], options: CompilerOptions) -> ProgramRequest {
        ProgramRequest::new(roots.iter().map(|r| r.to_string()).collect(), options, "/p")
    }

    fn build(host: &SourceHost<MemoryFileSystem>, roots: &[&str]) -> ProgramGraph {
        create_program(&request(roots, CompilerOptions::default()), host, None, &NoChanges).unwrap()
    }

    fn p(path: &str) -> CanonicalPath {
        Canonicalizer::new(true).canonical(path)
    }

    fn names(graph: &ProgramGraph) -> Vec<&str> {
        graph.units().map(UnitSlot::file_name).collect()
    }

    fn codes(graph: &ProgramGraph) -> Vec<String> {
        graph
            .program_diagnostics()
            .iter()
            .map(|d| d.code.to_string())
            .collect()
    }

    #[test]
    fn units_in_dependency_order_after_libraries() {
        let host = host(&[
            ("/p/a.ts", "import './b';\nimport './c';\n"),
            ("/p/b.ts", "import './c';\n"),
            ("/p/c.ts", "export const c = 1;\n"),
        ]);
        let graph = build(&host, &["/p/a.ts"]);
        assert_eq!(names(&graph), [LIB, "/p/c.ts", "/p/b.ts", "/p/a.ts"]);
        assert_eq!(graph.library_count(), 1);
        assert!(graph.is_library(&p(LIB)));
        assert!(codes(&graph).is_empty());
        assert_eq!(
            graph.reasons().reasons(&p("/p/c.ts")),
            [
                IncludeReason::Import { from: p("/p/b.ts"), index: 0 },
                IncludeReason::Import { from: p("/p/a.ts"), index: 1 },
            ]
        );
        assert_eq!(graph.reuse_report().verdict, ReuseVerdict::Not);
    }

    #[test]
    fn missing_root_and_unresolved_import() {
        let host = host(&[("/p/a.ts", "import './nope';\n")]);
        let graph = build(&host, &["/p/a.ts", "/p/gone.ts"]);
        assert!(graph.is_missing(&p("/p/gone.ts")));
        assert_eq!(codes(&graph), ["F101", "R101"]);
        assert_eq!(
            graph.reasons().reasons(&p("/p/gone.ts")),
            [IncludeReason::RootFile { index: 1 }]
        );
    }

    #[test]
    fn extensionless_reference_probes_extensions() {
        let host = host(&[
            ("/p/a.ts", "/// <reference path=\"types\" />\n/// <reference path=\"other\" />\n"),
            ("/p/types.d.ts", ""),
        ]);
        let graph = build(&host, &["/p/a.ts"]);
        assert!(graph.get_unit(&p("/p/types.d.ts")).is_some());
        assert!(graph.is_missing(&p("/p/other.ts")));
        assert_eq!(codes(&graph), ["F101"]);
    }

    #[test]
    fn unsupported_extension_is_diagnosed() {
        let host = host(&[("/p/a.ts", "/// <reference path=\"notes.txt\" />\n")]);
        let graph = build(&host, &["/p/a.ts"]);
        assert_eq!(codes(&graph), ["F102"]);
    }

    #[test]
    fn no_default_lib_skips_the_library() {
        let host = host(&[("/p/a.ts", "/// <reference no-default-lib=\"true\" />\n")]);
        let graph = build(&host, &["/p/a.ts"]);
        assert_eq!(names(&graph), ["/p/a.ts"]);
        assert_eq!(graph.library_count(), 0);
    }

    #[test]
    fn lib_option_and_lib_directives() {
        let host = host(&[
            ("/p/a.ts", "/// <reference lib=\"es2015.promise\" />\n/// <reference lib=\"dom.iterables\" />\n"),
            ("/lib/lib.es5.d.ts", ""),
            ("/lib/lib.dom.d.ts", ""),
            ("/lib/lib.es2015.promise.d.ts", ""),
        ]);
        let options = CompilerOptions {
            lib: Some(vec!["es5".into(), "dom".into()]),
            ..CompilerOptions::default()
        };
        let graph = create_program(&request(&["/p/a.ts"], options), &host, None, &NoChanges).unwrap();
        assert_eq!(
            names(&graph),
            ["/lib/lib.es5.d.ts", "/lib/lib.dom.d.ts", "/lib/lib.es2015.promise.d.ts", "/p/a.ts"]
        );
        assert_eq!(graph.library_count(), 3);
        let diags = graph.program_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code.to_string(), "F104");
        assert_eq!(diags[0].help, ["did you mean `dom.iterable`?"]);
    }

    #[test]
    fn ambient_module_names_need_no_resolution() {
        let host = host(&[
            ("/p/a.ts", "import 'fs';\nimport './b';\n"),
            ("/p/b.d.ts", "declare module 'fs' { export const x: number; }\n"),
        ]);
        let graph = build(&host, &["/p/a.ts"]);
        let resolutions = graph.resolutions(&p("/p/a.ts")).unwrap();
        assert_eq!(resolutions.modules[0], None);
        assert!(resolutions.modules[1].as_ref().is_some_and(Resolution::is_resolved));
        assert!(codes(&graph).is_empty());
    }

    #[test]
    fn type_reference_directives() {
        let host = host(&[
            ("/p/a.ts", "/// <reference types=\"node\" />\n/// <reference types=\"nope\" />\n"),
            ("/p/node_modules/@types/node/index.d.ts", ""),
        ]);
        let graph = build(&host, &["/p/a.ts"]);
        let node = p("/p/node_modules/@types/node/index.d.ts");
        assert!(graph.get_unit(&node).is_some());
        assert_eq!(graph.automatic_type_directive_names(), ["node"]);
        assert_eq!(
            graph.reasons().reasons(&node),
            [
                IncludeReason::TypeReferenceDirective { from: p("/p/a.ts"), index: 0 },
                IncludeReason::AutomaticTypeDirective { name: "node".into() },
            ]
        );
        assert_eq!(codes(&graph), ["R104"]);
    }

    #[test]
    fn same_package_twice_becomes_a_redirect() {
        let manifest = r#"{"name":"x","version":"1.0.0"}"#;
        let host = host(&[
            ("/p/a.ts", "import 'x';\nimport 'y';\n"),
            ("/p/node_modules/x/package.json", manifest),
            ("/p/node_modules/x/index.d.ts", "export declare const x: number;\n"),
            ("/p/node_modules/y/index.d.ts", "import 'x';\n"),
            ("/p/node_modules/y/node_modules/x/package.json", manifest),
            ("/p/node_modules/y/node_modules/x/index.d.ts", "export declare const x: number;\n"),
        ]);
        let graph = build(&host, &["/p/a.ts"]);
        let target = p("/p/node_modules/x/index.d.ts");
        let nested = p("/p/node_modules/y/node_modules/x/index.d.ts");
        assert!(!graph.is_redirect(&target));
        assert!(graph.is_redirect(&nested));
        assert_eq!(graph.redirect_targets()[&target], [nested.clone()]);
        assert!(Arc::ptr_eq(graph.get_unit(&nested).unwrap(), graph.get_unit(&target).unwrap()));
        assert!(graph.dependency_graph().depends_on(&nested, &target));
    }

    #[test]
    fn casing_differences_are_reported() {
        let mut fs = MemoryFileSystem::new(false).with_file(LIB, "");
        fs.write("/p/a.ts", "import './b';\nimport './B';\n");
        fs.write("/p/b.ts", "");
        let host = SourceHost::new(fs, "/lib");
        let graph = create_program(&request(&["/p/a.ts"], CompilerOptions::default()), &host, None, &NoChanges)
            .unwrap();
        assert_eq!(graph.unit_count(), 3);
        assert_eq!(codes(&graph), ["F103"]);
    }

    #[test]
    fn no_resolve_skips_imports_and_references() {
        let host = host(&[
            ("/p/a.ts", "/// <reference path=\"r.ts\" />\nimport './b';\n"),
            ("/p/b.ts", ""),
            ("/p/r.ts", ""),
        ]);
        let options = CompilerOptions {
            no_resolve: true,
            ..CompilerOptions::default()
        };
        let graph = create_program(&request(&["/p/a.ts"], options), &host, None, &NoChanges).unwrap();
        assert_eq!(names(&graph), [LIB, "/p/a.ts"]);
        assert!(codes(&graph).is_empty());
    }

    #[test]
    fn explain_inclusion_lines() {
        let host = host(&[("/p/a.ts", "import './b';\n"), ("/p/b.ts", "")]);
        let graph = build(&host, &["/p/a.ts", "/p/b.ts"]);
        let lines = graph.explain_inclusion(&p("/p/b.ts"), None);
        assert_eq!(
            lines,
            [
                "Imported via \"./b\" from file '/p/a.ts'".to_string(),
                "Root file specified for compilation".to_string(),
            ]
        );
        let proximate = IncludeReason::RootFile { index: 1 };
        assert_eq!(graph.explain_inclusion(&p("/p/b.ts"), Some(&proximate)).len(), 1);
        assert_eq!(
            graph.explain_inclusion(&p(LIB), None),
            ["Default library for target 'es5'".to_string()]
        );
    }

    #[test]
    fn session_replaces_program_only_on_success() {
        let host = host(&[("/p/a.ts", "")]);
        let req = request(&["/p/a.ts"], CompilerOptions::default());
        let mut session = ProgramSession::new();
        assert!(session.current().is_none());
        session.update(&req, &host, &NoChanges).unwrap();
        assert_eq!(session.current().unwrap().unit_count(), 2);

        host.cancellation().cancel();
        let other = request(&["/p/a.ts", "/p/b.ts"], CompilerOptions::default());
        assert!(session.update(&other, &host, &NoChanges).is_err());
        assert_eq!(session.current().unwrap().root_names(), ["/p/a.ts"]);
        assert!(session.take().is_some());
        assert!(session.current().is_none());
    }

    #[test]
    fn request_from_config() {
        let config = keel_config::load_config_from_str(
            "[project]\nname = \"app\"\nfiles = [\"src/main.ts\"]\n\n[compiler]\nallow_js = true\n",
        )
        .unwrap();
        let req = ProgramRequest::from_config(&config, "/work/app/");
        assert_eq!(req.root_names, ["/work/app/src/main.ts"]);
        assert_eq!(req.project_dir, "/work/app");
        assert!(req.options.allow_js);
    }
}
