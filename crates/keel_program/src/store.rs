//! Per-program memo of checker diagnostics.
//!
//! Diagnostics are computed by a [`Checker`] the first time they are asked
//! for and kept for the lifetime of the program. When a program is derived
//! from a previous one, the previous store is carried over and entries for
//! units affected by the change are evicted.

use crate::graph::ProgramGraph;
use keel_common::{CanonicalPath, KeelResult};
use keel_diagnostics::Diagnostic;
use keel_source::CompilationUnit;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// The diagnostic families the checker produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Parse errors.
    Syntactic,
    /// Type errors.
    Semantic,
    /// Problems that prevent declaration output.
    Declaration,
}

/// The checker collaborator.
///
/// Implementations read the program and must not mutate it.
pub trait Checker {
    /// Computes `kind` diagnostics for `unit`.
    fn check(
        &self,
        program: &ProgramGraph,
        unit: &CompilationUnit,
        kind: DiagnosticKind,
    ) -> KeelResult<Vec<Diagnostic>>;
}

/// Memoized diagnostics keyed by unit path and kind.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticsStore {
    entries: RefCell<HashMap<(CanonicalPath, DiagnosticKind), Arc<[Diagnostic]>>>,
}

impl DiagnosticsStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The memoized diagnostics, if computed.
    pub fn get(&self, path: &CanonicalPath, kind: DiagnosticKind) -> Option<Arc<[Diagnostic]>> {
        self.entries.borrow().get(&(path.clone(), kind)).cloned()
    }

    /// Returns the memoized diagnostics or computes and memoizes them.
    ///
    /// Nothing is memoized when `compute` fails.
    pub fn get_or_compute(
        &self,
        path: &CanonicalPath,
        kind: DiagnosticKind,
        compute: impl FnOnce() -> KeelResult<Vec<Diagnostic>>,
    ) -> KeelResult<Arc<[Diagnostic]>> {
        if let Some(hit) = self.get(path, kind) {
            return Ok(hit);
        }
        let computed: Arc<[Diagnostic]> = compute()?.into();
        self.entries
            .borrow_mut()
            .insert((path.clone(), kind), Arc::clone(&computed));
        Ok(computed)
    }

    /// Drops every entry for `path`.
    pub fn evict(&self, path: &CanonicalPath) {
        self.entries.borrow_mut().retain(|(p, _), _| p != path);
    }

    /// Returns `true` if any kind is memoized for `path`.
    pub fn contains(&self, path: &CanonicalPath) -> bool {
        self.entries.borrow().keys().any(|(p, _)| p == path)
    }

    /// Number of memoized entries.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns `true` if nothing is memoized.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// The unit dependency graph: an edge `a -> b` means `a` imports or
/// references `b`, or `a` is a redirect to `b`.
pub struct DependencyGraph {
    graph: DiGraph<CanonicalPath, ()>,
    nodes: HashMap<CanonicalPath, NodeIndex>,
}

impl DependencyGraph {
    pub(crate) fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            nodes: HashMap::new(),
        }
    }

    fn node(&mut self, path: &CanonicalPath) -> NodeIndex {
        if let Some(&index) = self.nodes.get(path) {
            return index;
        }
        let index = self.graph.add_node(path.clone());
        self.nodes.insert(path.clone(), index);
        index
    }

    pub(crate) fn add_edge(&mut self, from: &CanonicalPath, to: &CanonicalPath) {
        let a = self.node(from);
        let b = self.node(to);
        if self.graph.find_edge(a, b).is_none() {
            self.graph.add_edge(a, b, ());
        }
    }

    /// Number of units with at least one edge.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns `true` if `from` directly depends on `to`.
    pub fn depends_on(&self, from: &CanonicalPath, to: &CanonicalPath) -> bool {
        match (self.nodes.get(from), self.nodes.get(to)) {
            (Some(&a), Some(&b)) => self.graph.find_edge(a, b).is_some(),
            _ => false,
        }
    }

    /// Every unit that depends on a seed, directly or transitively, plus the
    /// seeds themselves.
    pub fn dependents_of<'a>(
        &self,
        seeds: impl IntoIterator<Item = &'a CanonicalPath>,
    ) -> HashSet<CanonicalPath> {
        let reversed = Reversed(&self.graph);
        let mut out = HashSet::new();
        for seed in seeds {
            out.insert(seed.clone());
            let Some(&start) = self.nodes.get(seed) else {
                continue;
            };
            let mut dfs = Dfs::new(reversed, start);
            while let Some(index) = dfs.next(reversed) {
                out.insert(self.graph[index].clone());
            }
        }
        out
    }
}

/// Evicts from `store` every seed and every unit of `graph` depending on
/// one. Returns the number of paths evicted.
pub(crate) fn evict_affected(
    store: &DiagnosticsStore,
    graph: &DependencyGraph,
    seeds: &HashSet<CanonicalPath>,
) -> usize {
    let affected = graph.dependents_of(seeds);
    let mut evicted = 0;
    for path in &affected {
        if store.contains(path) {
            store.evict(path);
            evicted += 1;
        }
    }
    tracing::debug!(seeds = seeds.len(), affected = affected.len(), evicted, "evicted cached diagnostics");
    evicted
}
