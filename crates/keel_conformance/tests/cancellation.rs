//! Cancelled construction leaves the previous generation in place.

use std::cell::Cell;
use std::sync::Arc;

use keel_common::{Cancelled, KeelResult};
use keel_config::CompilerOptions;
use keel_conformance::{path, source_names, CountingChecker, Scenario, PROJECT_DIR};
use keel_diagnostics::Diagnostic;
use keel_program::{
    create_program, Checker, CompilerHost, DiagnosticKind, NoChanges, ProgramGraph, ProgramRequest, SourceHost,
    UnitRequest,
};
use keel_resolve::{FileSystem, HostError, MemoryFileSystem};
use keel_source::CompilationUnit;

/// Delegates to a [`SourceHost`] and cancels after a number of unit requests.
struct CancelAfter {
    inner: SourceHost<MemoryFileSystem>,
    remaining: Cell<usize>,
}

impl CompilerHost for CancelAfter {
    fn file_system(&self) -> &dyn FileSystem {
        self.inner.file_system()
    }

    fn get_unit(&self, request: &UnitRequest) -> Result<Option<Arc<CompilationUnit>>, HostError> {
        if self.remaining.get() == 0 {
            return Err(HostError::Cancelled(Cancelled));
        }
        self.remaining.set(self.remaining.get() - 1);
        self.inner.get_unit(request)
    }

    fn default_lib_location(&self) -> String {
        self.inner.default_lib_location()
    }

    fn check_cancelled(&self) -> KeelResult<()> {
        self.inner.check_cancelled()
    }
}

fn files() -> MemoryFileSystem {
    MemoryFileSystem::new(true)
        .with_file("/lib/lib.d.ts", "")
        .with_file("/p/a.ts", "import './b';\n")
        .with_file("/p/b.ts", "import './c';\n")
        .with_file("/p/c.ts", "export {};\n")
}

#[test]
fn cancelled_update_keeps_the_current_program() {
    let mut s = Scenario::new(&[("/p/a.ts", "import './b';\n"), ("/p/b.ts", "export {};\n")]);
    let before = source_names(s.build());

    s.write("/p/b.ts", "export const b = 1;\n");
    s.host().cancellation().cancel();
    assert_eq!(s.try_build().unwrap_err(), Cancelled);
    let current = s.current().unwrap();
    assert_eq!(source_names(current), before);
    assert_eq!(current.get_unit(&path("/p/b.ts")).unwrap().text, "export {};\n");
}

#[test]
fn cancellation_mid_discovery_publishes_nothing() {
    let request = ProgramRequest::new(vec!["/p/a.ts".to_string()], CompilerOptions::default(), PROJECT_DIR);
    for budget in 0..4 {
        let host = CancelAfter {
            inner: SourceHost::new(files(), "/lib"),
            remaining: Cell::new(budget),
        };
        let result = create_program(&request, &host, None, &NoChanges);
        assert_eq!(result.unwrap_err(), Cancelled, "budget {budget}");
    }

    let host = CancelAfter {
        inner: SourceHost::new(files(), "/lib"),
        remaining: Cell::new(usize::MAX),
    };
    let graph = create_program(&request, &host, None, &NoChanges).unwrap();
    assert_eq!(source_names(&graph), ["/p/c.ts", "/p/b.ts", "/p/a.ts"]);
}

#[test]
fn cancellation_during_reuse_is_reported() {
    let request = ProgramRequest::new(vec!["/p/a.ts".to_string()], CompilerOptions::default(), PROJECT_DIR);
    let host = SourceHost::new(files(), "/lib");
    let old = create_program(&request, &host, None, &NoChanges).unwrap();

    let cancelling = CancelAfter {
        inner: SourceHost::new(files(), "/lib"),
        remaining: Cell::new(2),
    };
    let result = create_program(&request, &cancelling, Some(&old), &NoChanges);
    assert_eq!(result.unwrap_err(), Cancelled);
    assert_eq!(source_names(&old), ["/p/c.ts", "/p/b.ts", "/p/a.ts"]);
}

struct CancellingChecker;

impl Checker for CancellingChecker {
    fn check(&self, _: &ProgramGraph, _: &CompilationUnit, _: DiagnosticKind) -> KeelResult<Vec<Diagnostic>> {
        Err(Cancelled)
    }
}

#[test]
fn cancelled_check_is_not_memoized() {
    let mut s = Scenario::new(&[("/p/a.ts", "export {};\n")]);
    let graph = s.build();
    let a = path("/p/a.ts");
    assert_eq!(
        graph.diagnostics(&a, DiagnosticKind::Semantic, &CancellingChecker).unwrap_err(),
        Cancelled
    );
    assert!(!graph.diagnostics_store().contains(&a));

    let checker = CountingChecker::new();
    assert_eq!(graph.diagnostics(&a, DiagnosticKind::Semantic, &checker).unwrap().len(), 1);
    assert_eq!(checker.calls(), 1);
}
