//! Package manifests and the nearest-manifest scope of a directory.

use crate::error::HostError;
use crate::fs::FileSystem;
use keel_common::path::{combine_paths, directory_of};
use keel_common::{CanonicalPath, Canonicalizer};
use keel_source::ModuleFormat;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// The fields of `package.json` that resolution looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PackageManifest {
    /// Package name.
    pub name: Option<String>,
    /// Package version.
    pub version: Option<String>,
    /// Declaration entry point.
    pub types: Option<String>,
    /// Legacy spelling of `types`.
    pub typings: Option<String>,
    /// Script entry point.
    pub main: Option<String>,
    /// `"module"` makes `.js` files in the scope ES modules.
    #[serde(rename = "type")]
    pub module_type: Option<String>,
}

impl PackageManifest {
    /// Parses manifest text.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The declaration entry point, `types` before `typings`.
    pub fn types_entry(&self) -> Option<&str> {
        self.types.as_deref().or(self.typings.as_deref())
    }

    /// The format of plain `.js`/`.ts` files in this package.
    pub fn module_format(&self) -> ModuleFormat {
        match self.module_type.as_deref() {
            Some("module") => ModuleFormat::EsModule,
            _ => ModuleFormat::CommonJs,
        }
    }
}

/// A directory owning a `package.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageScope {
    /// The directory holding the manifest, as spelled on disk.
    pub directory: String,
    /// The parsed manifest.
    pub manifest: Arc<PackageManifest>,
}

/// Memo of manifests and nearest scopes, keyed by canonical directory.
///
/// Negative results are memoized as well, so a second lookup anywhere below
/// an already-walked directory never touches the filesystem.
#[derive(Debug, Clone, Default)]
pub struct PackageScopes {
    manifests: HashMap<CanonicalPath, Option<Arc<PackageManifest>>>,
    scopes: HashMap<CanonicalPath, Option<Arc<PackageScope>>>,
    errors: Vec<HostError>,
}

impl PackageScopes {
    /// Creates an empty memo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads and memoizes `<dir>/package.json`.
    ///
    /// Unparseable manifests count as absent. Read failures count as absent
    /// and are kept for [`take_errors`](Self::take_errors).
    pub fn manifest(
        &mut self,
        fs: &dyn FileSystem,
        canon: Canonicalizer,
        dir: &str,
    ) -> Option<Arc<PackageManifest>> {
        let key = canon.canonical(dir);
        if let Some(memo) = self.manifests.get(&key) {
            return memo.clone();
        }
        let path = combine_paths(dir, "package.json");
        let manifest = match fs.read_file(&path) {
            Ok(Some(text)) => match PackageManifest::parse(&text) {
                Ok(manifest) => Some(Arc::new(manifest)),
                Err(e) => {
                    tracing::debug!(%path, error = %e, "ignoring malformed package manifest");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                self.errors.push(e);
                None
            }
        };
        self.manifests.insert(key, manifest.clone());
        manifest
    }

    /// Finds the nearest ancestor of `dir` (inclusive) with a manifest.
    ///
    /// Every directory visited on the way is memoized with the result.
    pub fn scope_for(
        &mut self,
        fs: &dyn FileSystem,
        canon: Canonicalizer,
        dir: &str,
    ) -> Option<Arc<PackageScope>> {
        let mut visited = Vec::new();
        let mut found = None;
        for current in ancestor_dirs(dir) {
            let key = canon.canonical(&current);
            if let Some(memo) = self.scopes.get(&key) {
                found = memo.clone();
                break;
            }
            visited.push(key);
            if let Some(manifest) = self.manifest(fs, canon, &current) {
                found = Some(Arc::new(PackageScope {
                    directory: current,
                    manifest,
                }));
                break;
            }
        }
        for key in visited {
            self.scopes.insert(key, found.clone());
        }
        found
    }

    /// I/O failures recorded so far and not yet drained.
    pub fn errors(&self) -> &[HostError] {
        &self.errors
    }

    /// Drains I/O failures seen while reading manifests.
    pub fn take_errors(&mut self) -> Vec<HostError> {
        std::mem::take(&mut self.errors)
    }

    /// Number of directories whose scope has been memoized.
    pub fn memoized_directories(&self) -> usize {
        self.scopes.len()
    }
}

/// `dir` followed by each of its ancestors, as spelled.
pub(crate) fn ancestor_dirs(dir: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = dir.to_string();
    loop {
        let parent = directory_of(&current).to_string();
        let at_root = parent.is_empty() || parent == current;
        out.push(current);
        if at_root {
            break;
        }
        current = parent;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;

    fn canon() -> Canonicalizer {
        Canonicalizer::new(true)
    }

    #[test]
    fn manifest_fields() {
        let m = PackageManifest::parse(
            r#"{"name":"x","version":"1.0.0","typings":"lib/x.d.ts","type":"module","extra":1}"#,
        )
        .unwrap();
        assert_eq!(m.types_entry(), Some("lib/x.d.ts"));
        assert_eq!(m.module_format(), ModuleFormat::EsModule);
        assert_eq!(PackageManifest::default().module_format(), ModuleFormat::CommonJs);
    }

    #[test]
    fn ancestors() {
        assert_eq!(ancestor_dirs("/a/b"), vec!["/a/b", "/a", "/"]);
        assert_eq!(ancestor_dirs("/"), vec!["/"]);
    }

    #[test]
    fn nearest_scope_is_memoized() {
        let fs = MemoryFileSystem::new(true)
            .with_file("/proj/package.json", r#"{"name":"app","type":"module"}"#)
            .with_file("/proj/src/deep/a.ts", "");
        let mut scopes = PackageScopes::new();
        let scope = scopes.scope_for(&fs, canon(), "/proj/src/deep").unwrap();
        assert_eq!(scope.directory, "/proj");
        assert_eq!(scopes.memoized_directories(), 3);

        // A sibling lookup stops at the memoized parent.
        let again = scopes.scope_for(&fs, canon(), "/proj/src").unwrap();
        assert!(Arc::ptr_eq(&scope, &again));
        assert_eq!(scopes.memoized_directories(), 3);
    }

    #[test]
    fn negative_results_are_memoized() {
        let fs = MemoryFileSystem::new(true).with_file("/x/y/a.ts", "");
        let mut scopes = PackageScopes::new();
        assert!(scopes.scope_for(&fs, canon(), "/x/y").is_none());
        assert_eq!(scopes.memoized_directories(), 3);
    }

    #[test]
    fn malformed_manifest_is_absent() {
        let fs = MemoryFileSystem::new(true).with_file("/p/package.json", "{ not json");
        let mut scopes = PackageScopes::new();
        assert!(scopes.manifest(&fs, canon(), "/p").is_none());
        assert!(scopes.take_errors().is_empty());
    }

    #[test]
    fn read_failures_are_collected() {
        let mut fs = MemoryFileSystem::new(true).with_file("/p/package.json", "{}");
        fs.fail_reads("/p/package.json");
        let mut scopes = PackageScopes::new();
        assert!(scopes.manifest(&fs, canon(), "/p").is_none());
        assert_eq!(scopes.take_errors().len(), 1);
    }
}
