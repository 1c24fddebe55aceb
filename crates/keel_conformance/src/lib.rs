//! Conformance test helpers for keel program construction.
//!
//! A [`Scenario`] is an in-memory project: a [`MemoryFileSystem`] under
//! `/p` with a default library in `/lib`, a [`ProgramRequest`], and a
//! [`ProgramSession`] holding the current generation. Integration tests in
//! `tests/` edit files and options between builds and assert on the reuse
//! verdict, the unit order and the diagnostics of each generation.

#![warn(missing_docs)]

use std::cell::Cell;

use keel_common::{CanonicalPath, Canonicalizer, KeelResult};
use keel_config::{CompilerOptions, ProjectConfig};
use keel_diagnostics::{Category, Diagnostic, DiagnosticCode};
use keel_program::{
    create_program, ChangeOracle, Checker, DiagnosticKind, IncludeReason, NoChanges, ProgramGraph, ProgramRequest,
    ProgramSession, SourceHost,
};
use keel_resolve::MemoryFileSystem;
use keel_source::{CompilationUnit, UnitSlot};

/// Directory the scenario's relative root names are taken from.
pub const PROJECT_DIR: &str = "/p";
/// Directory holding the library files.
pub const LIB_DIR: &str = "/lib";
/// The default library for the default target.
pub const DEFAULT_LIB: &str = "/lib/lib.d.ts";

/// An in-memory project and its current program.
pub struct Scenario {
    host: SourceHost<MemoryFileSystem>,
    session: ProgramSession,
    request: ProgramRequest,
}

impl Scenario {
    /// A case-sensitive project holding `files` and the default library,
    /// with `/p/a.ts` as the only root.
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self::with_fs(MemoryFileSystem::new(true), files)
    }

    /// As [`new`](Self::new), on a case-insensitive filesystem.
    pub fn case_insensitive(files: &[(&str, &str)]) -> Self {
        Self::with_fs(MemoryFileSystem::new(false), files)
    }

    fn with_fs(mut fs: MemoryFileSystem, files: &[(&str, &str)]) -> Self {
        fs.write(DEFAULT_LIB, "interface Array<T> {}\n");
        for (path, text) in files {
            fs.write(path, text);
        }
        Self {
            host: SourceHost::new(fs.with_current_directory(PROJECT_DIR), LIB_DIR),
            session: ProgramSession::new(),
            request: ProgramRequest::new(vec!["/p/a.ts".to_string()], CompilerOptions::default(), PROJECT_DIR),
        }
    }

    /// Replaces the root list.
    pub fn with_roots(mut self, roots: &[&str]) -> Self {
        self.set_roots(roots);
        self
    }

    /// Replaces the compiler options.
    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.request.options = options;
        self
    }

    /// Replaces the root list for the next build.
    pub fn set_roots(&mut self, roots: &[&str]) {
        self.request.root_names = roots.iter().map(|root| root.to_string()).collect();
    }

    /// The options of the next build.
    pub fn options_mut(&mut self) -> &mut CompilerOptions {
        &mut self.request.options
    }

    /// The request of the next build.
    pub fn request_mut(&mut self) -> &mut ProgramRequest {
        &mut self.request
    }

    /// The host the scenario builds with.
    pub fn host(&self) -> &SourceHost<MemoryFileSystem> {
        &self.host
    }

    /// Creates or replaces a file.
    pub fn write(&mut self, path: &str, text: &str) {
        self.host.fs_mut().write(path, text);
    }

    /// Deletes a file.
    pub fn remove(&mut self, path: &str) {
        self.host.fs_mut().remove(path);
    }

    /// Makes reads of `path` fail with an I/O error.
    pub fn fail_reads(&mut self, path: &str) {
        self.host.fs_mut().fail_reads(path);
    }

    /// Builds the next generation with `oracle`.
    pub fn try_build_with(&mut self, oracle: &dyn ChangeOracle) -> KeelResult<&ProgramGraph> {
        self.session.update(&self.request, &self.host, oracle)
    }

    /// Builds the next generation with nothing invalidated.
    pub fn try_build(&mut self) -> KeelResult<&ProgramGraph> {
        self.try_build_with(&NoChanges)
    }

    /// Builds the next generation; panics if it was cancelled.
    pub fn build(&mut self) -> &ProgramGraph {
        self.try_build().expect("program construction was cancelled")
    }

    /// Builds the next generation with `oracle`; panics if it was cancelled.
    pub fn build_with(&mut self, oracle: &dyn ChangeOracle) -> &ProgramGraph {
        self.try_build_with(oracle).expect("program construction was cancelled")
    }

    /// Builds the current request from scratch without touching the session.
    pub fn build_fresh(&self) -> ProgramGraph {
        create_program(&self.request, &self.host, None, &NoChanges).expect("program construction was cancelled")
    }

    /// The current generation; panics before the first build.
    pub fn program(&self) -> &ProgramGraph {
        self.session.current().expect("no program has been built")
    }

    /// The current generation, if any.
    pub fn current(&self) -> Option<&ProgramGraph> {
        self.session.current()
    }
}

/// `name` canonicalized for a case-sensitive host.
pub fn path(name: &str) -> CanonicalPath {
    Canonicalizer::new(true).canonical(name)
}

/// File names of every slot, in program order.
pub fn unit_names(graph: &ProgramGraph) -> Vec<String> {
    graph.units().map(|slot| slot.file_name().to_string()).collect()
}

/// File names of every non-library slot, in program order.
pub fn source_names(graph: &ProgramGraph) -> Vec<String> {
    graph
        .units()
        .filter(|slot| !graph.is_library(slot.path()))
        .map(|slot| slot.file_name().to_string())
        .collect()
}

/// Codes of the program diagnostics, in report order.
pub fn codes(graph: &ProgramGraph) -> Vec<String> {
    graph
        .program_diagnostics()
        .iter()
        .map(|d| d.code.to_string())
        .collect()
}

/// Every slot's path with its reasons, in program order.
pub fn reasons_snapshot(graph: &ProgramGraph) -> Vec<(CanonicalPath, Vec<IncludeReason>)> {
    graph
        .units()
        .map(UnitSlot::path)
        .chain(graph.missing_paths())
        .map(|path| (path.clone(), graph.reasons().reasons(path).to_vec()))
        .collect()
}

/// Returns `true` if `a` and `b` hold the same units in the same order,
/// with the same reasons and diagnostics.
pub fn observably_equal(a: &ProgramGraph, b: &ProgramGraph) -> bool {
    unit_names(a) == unit_names(b)
        && a.library_count() == b.library_count()
        && reasons_snapshot(a) == reasons_snapshot(b)
        && a.program_diagnostics() == b.program_diagnostics()
        && a.missing_paths().eq(b.missing_paths())
}

/// A checker producing one diagnostic per unit and counting its calls.
#[derive(Default)]
pub struct CountingChecker {
    calls: Cell<usize>,
}

impl CountingChecker {
    /// Creates a checker with no calls recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the checker ran.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Checker for CountingChecker {
    fn check(&self, _program: &ProgramGraph, unit: &CompilationUnit, kind: DiagnosticKind) -> KeelResult<Vec<Diagnostic>> {
        self.calls.set(self.calls.get() + 1);
        Ok(vec![Diagnostic::warning(
            DiagnosticCode::new(Category::Check, 1),
            format!("{kind:?} check of {}", unit.file_name),
            None,
        )])
    }
}

/// Parses a `keel.toml` for a project named `name` listing `files`, with
/// `extra` appended verbatim.
pub fn make_config(name: &str, files: &[&str], extra: &str) -> ProjectConfig {
    let files: Vec<String> = files.iter().map(|f| format!("\"{f}\"")).collect();
    let toml_str = format!(
        "[project]\nname = \"{name}\"\nfiles = [{}]\n{extra}",
        files.join(", ")
    );
    toml::from_str(&toml_str).unwrap()
}
