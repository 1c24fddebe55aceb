//! Why each unit is in the program.
//!
//! Every request for a path records an [`IncludeReason`]; a path may carry
//! several (a module imported from many places). Reasons refer to other
//! units by canonical path so they stay meaningful across generations.

use keel_common::CanonicalPath;
use serde::Serialize;
use std::collections::HashMap;

/// The recorded cause of a unit's presence in the program.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IncludeReason {
    /// Listed as the `index`-th root file.
    RootFile {
        /// Position in the root list.
        index: usize,
    },
    /// Target of the `index`-th import of `from`.
    Import {
        /// The importing unit.
        from: CanonicalPath,
        /// Position in the importer's import list.
        index: usize,
    },
    /// Target of the `index`-th `/// <reference path>` of `from`.
    ReferenceFile {
        /// The referencing unit.
        from: CanonicalPath,
        /// Position in the unit's file-reference list.
        index: usize,
    },
    /// Target of the `index`-th `/// <reference types>` of `from`.
    TypeReferenceDirective {
        /// The referencing unit.
        from: CanonicalPath,
        /// Position in the unit's type-reference list.
        index: usize,
    },
    /// Target of the `index`-th `/// <reference lib>` of `from`.
    LibReferenceDirective {
        /// The referencing unit.
        from: CanonicalPath,
        /// Position in the unit's library-reference list.
        index: usize,
    },
    /// A library file: the `index`-th entry of the `lib` option, or the
    /// target's default library when `index` is `None`.
    LibFile {
        /// Position in the `lib` option.
        index: Option<usize>,
    },
    /// Entry point of a type package included without being referenced.
    AutomaticTypeDirective {
        /// The type package name.
        name: String,
    },
    /// A source file of the `index`-th referenced project.
    ProjectReferenceSource {
        /// Position in the project reference list.
        index: usize,
    },
    /// A declaration output of the `index`-th referenced project.
    ProjectReferenceOutput {
        /// Position in the project reference list.
        index: usize,
    },
}

impl IncludeReason {
    /// The unit that caused the inclusion, for reasons that come from a
    /// directive or import in another unit.
    pub fn referencing_unit(&self) -> Option<&CanonicalPath> {
        match self {
            IncludeReason::Import { from, .. }
            | IncludeReason::ReferenceFile { from, .. }
            | IncludeReason::TypeReferenceDirective { from, .. }
            | IncludeReason::LibReferenceDirective { from, .. } => Some(from),
            _ => None,
        }
    }
}

/// Ordered, duplicate-free reasons per path.
///
/// Reasons are append-only for the lifetime of one program.
#[derive(Clone, Debug, Default)]
pub struct ReasonStore {
    reasons: HashMap<CanonicalPath, Vec<IncludeReason>>,
}

impl ReasonStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `reason` for `path`. Returns `false` if it was already
    /// recorded.
    pub fn record_reason(&mut self, path: &CanonicalPath, reason: IncludeReason) -> bool {
        let list = self.reasons.entry(path.clone()).or_default();
        if list.contains(&reason) {
            return false;
        }
        list.push(reason);
        true
    }

    /// The reasons for `path`, in recording order.
    pub fn reasons(&self, path: &CanonicalPath) -> &[IncludeReason] {
        self.reasons.get(path).map_or(&[], Vec::as_slice)
    }

    /// The reasons contributing to `path`'s inclusion, skipping `proximate`
    /// when it is the location a diagnostic already points at.
    pub fn explain(&self, path: &CanonicalPath, proximate: Option<&IncludeReason>) -> Vec<&IncludeReason> {
        self.reasons(path)
            .iter()
            .filter(|reason| Some(*reason) != proximate)
            .collect()
    }

    /// Number of paths with at least one reason.
    pub fn len(&self) -> usize {
        self.reasons.len()
    }

    /// Returns `true` if no reasons are recorded.
    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }

    /// Paths with recorded reasons.
    pub fn paths(&self) -> impl Iterator<Item = &CanonicalPath> {
        self.reasons.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_common::Canonicalizer;

    fn p(s: &str) -> CanonicalPath {
        Canonicalizer::new(true).canonical(s)
    }

    #[test]
    fn reasons_are_ordered_and_deduplicated() {
        let mut store = ReasonStore::new();
        let b = p("/b.ts");
        assert!(store.record_reason(&b, IncludeReason::Import { from: p("/a.ts"), index: 0 }));
        assert!(store.record_reason(&b, IncludeReason::RootFile { index: 1 }));
        assert!(!store.record_reason(&b, IncludeReason::Import { from: p("/a.ts"), index: 0 }));
        assert_eq!(store.reasons(&b).len(), 2);
        assert!(matches!(store.reasons(&b)[0], IncludeReason::Import { .. }));
        assert!(store.reasons(&p("/none.ts")).is_empty());
    }

    #[test]
    fn explain_skips_proximate() {
        let mut store = ReasonStore::new();
        let b = p("/b.ts");
        let import = IncludeReason::Import { from: p("/a.ts"), index: 0 };
        store.record_reason(&b, import.clone());
        store.record_reason(&b, IncludeReason::RootFile { index: 0 });
        let explained = store.explain(&b, Some(&import));
        assert_eq!(explained, vec![&IncludeReason::RootFile { index: 0 }]);
        assert_eq!(store.explain(&b, None).len(), 2);
    }

    #[test]
    fn referencing_unit() {
        let from = p("/a.ts");
        assert_eq!(
            IncludeReason::LibReferenceDirective { from: from.clone(), index: 0 }.referencing_unit(),
            Some(&from)
        );
        assert_eq!(IncludeReason::LibFile { index: None }.referencing_unit(), None);
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_string(&IncludeReason::RootFile { index: 2 }).unwrap();
        assert_eq!(json, r#"{"kind":"root_file","index":2}"#);
    }
}
