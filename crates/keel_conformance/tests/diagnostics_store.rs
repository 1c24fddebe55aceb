//! Cached checker diagnostics across program generations.

use keel_conformance::{path, CountingChecker, Scenario};
use keel_program::{DiagnosticKind, ReuseVerdict};

const FILES: [&str; 4] = ["/p/a.ts", "/p/b.ts", "/p/c.ts", "/p/d.ts"];

fn chain() -> Scenario {
    Scenario::new(&[
        ("/p/a.ts", "import './b';\n"),
        ("/p/b.ts", "import './c';\n"),
        ("/p/c.ts", "export const c = 1;\n"),
        ("/p/d.ts", "export const d = 1;\n"),
    ])
    .with_roots(&["/p/a.ts", "/p/d.ts"])
}

fn check_all(s: &Scenario, checker: &CountingChecker) {
    for file in FILES {
        let diagnostics = s
            .program()
            .diagnostics(&path(file), DiagnosticKind::Semantic, checker)
            .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, format!("Semantic check of {file}"));
    }
}

#[test]
fn diagnostics_are_computed_once() {
    let mut s = chain();
    s.build();
    let checker = CountingChecker::new();
    check_all(&s, &checker);
    check_all(&s, &checker);
    assert_eq!(checker.calls(), 4);

    s.program()
        .diagnostics(&path("/p/a.ts"), DiagnosticKind::Syntactic, &checker)
        .unwrap();
    assert_eq!(checker.calls(), 5);
}

#[test]
fn complete_reuse_keeps_the_store() {
    let mut s = chain();
    s.build();
    let checker = CountingChecker::new();
    check_all(&s, &checker);

    assert_eq!(s.build().reuse_report().verdict, ReuseVerdict::Completely);
    check_all(&s, &checker);
    assert_eq!(checker.calls(), 4);
}

#[test]
fn changed_unit_evicts_its_dependents_only() {
    let mut s = chain();
    s.build();
    let checker = CountingChecker::new();
    check_all(&s, &checker);

    s.write("/p/c.ts", "export const c = 2;\n");
    let graph = s.build();
    assert_eq!(graph.reuse_report().verdict, ReuseVerdict::SafeModules);
    assert_eq!(graph.reuse_report().evicted_diagnostics, 3);
    let store = graph.diagnostics_store();
    assert!(store.contains(&path("/p/d.ts")));
    for file in ["/p/a.ts", "/p/b.ts", "/p/c.ts"] {
        assert!(!store.contains(&path(file)), "{file} kept stale diagnostics");
    }

    check_all(&s, &checker);
    assert_eq!(checker.calls(), 7);
}

#[test]
fn leaf_edit_leaves_its_imports_cached() {
    let mut s = chain();
    s.build();
    let checker = CountingChecker::new();
    check_all(&s, &checker);

    s.write("/p/a.ts", "import './b';\nexport const a = 1;\n");
    let graph = s.build();
    assert_eq!(graph.reuse_report().evicted_diagnostics, 1);
    check_all(&s, &checker);
    assert_eq!(checker.calls(), 5);
}

#[test]
fn semantic_option_change_clears_the_store() {
    let mut s = chain();
    s.build();
    let checker = CountingChecker::new();
    check_all(&s, &checker);

    s.options_mut().strict = true;
    let graph = s.build();
    assert_eq!(graph.reuse_report().verdict, ReuseVerdict::Completely);
    assert!(graph.diagnostics_store().is_empty());
    check_all(&s, &checker);
    assert_eq!(checker.calls(), 8);
}

#[test]
fn rebuild_starts_with_an_empty_store() {
    let mut s = chain();
    s.build();
    let checker = CountingChecker::new();
    check_all(&s, &checker);

    s.set_roots(&["/p/d.ts", "/p/a.ts"]);
    let graph = s.build();
    assert_eq!(graph.reuse_report().verdict, ReuseVerdict::Not);
    assert!(graph.diagnostics_store().is_empty());
}

#[test]
fn unknown_paths_have_no_diagnostics() {
    let mut s = chain();
    s.build();
    let checker = CountingChecker::new();
    let diagnostics = s
        .program()
        .diagnostics(&path("/p/nowhere.ts"), DiagnosticKind::Semantic, &checker)
        .unwrap();
    assert!(diagnostics.is_empty());
    assert_eq!(checker.calls(), 0);
}
