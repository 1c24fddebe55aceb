//! The per-generation resolution cache.
//!
//! Module and type-reference resolutions are memoized by canonical
//! containing directory, specifier and resolution mode. A cache is owned by
//! one program generation; the next generation starts from
//! [`for_next_generation`](ResolutionCache::for_next_generation), which
//! clears everything when resolution-affecting options changed.

use crate::error::HostError;
use crate::fs::FileSystem;
use crate::package::{PackageScope, PackageScopes};
use crate::resolution::{Resolution, TypeReferenceResolution};
use crate::resolver::Resolver;
use keel_common::path::directory_of;
use keel_common::{CanonicalPath, Canonicalizer};
use keel_config::{affects::affects_module_resolution, CompilerOptions};
use keel_source::{Extension, ModuleFormat};
use std::collections::HashMap;
use std::sync::Arc;

type CacheKey = (CanonicalPath, String, Option<ModuleFormat>);

/// Hit and miss counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that ran the resolver.
    pub misses: u64,
    /// Requests folded into an earlier identical request of the same unit.
    pub deduplicated: u64,
}

/// Memoized resolutions for one program generation.
#[derive(Debug, Clone)]
pub struct ResolutionCache {
    options: CompilerOptions,
    project_dir: String,
    canon: Canonicalizer,
    modules: HashMap<CacheKey, Resolution>,
    type_refs: HashMap<CacheKey, TypeReferenceResolution>,
    scopes: PackageScopes,
    stats: CacheStats,
}

impl ResolutionCache {
    /// Creates an empty cache. `project_dir` anchors option paths and
    /// automatic type-reference lookups.
    pub fn new(options: CompilerOptions, project_dir: impl Into<String>, canon: Canonicalizer) -> Self {
        Self {
            options,
            project_dir: project_dir.into(),
            canon,
            modules: HashMap::new(),
            type_refs: HashMap::new(),
            scopes: PackageScopes::new(),
            stats: CacheStats::default(),
        }
    }

    /// The options resolutions are computed under.
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// The directory option paths are anchored at.
    pub fn project_dir(&self) -> &str {
        &self.project_dir
    }

    /// Counters since this generation started.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Number of memoized module resolutions.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if nothing is memoized.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty() && self.type_refs.is_empty()
    }

    /// Switches to `options`. Returns `true` if the cache was cleared
    /// because a resolution-affecting option differs.
    pub fn update_options(&mut self, options: &CompilerOptions) -> bool {
        let cleared = affects_module_resolution(&self.options, options);
        if cleared {
            tracing::debug!(
                modules = self.modules.len(),
                type_refs = self.type_refs.len(),
                "resolution options changed; clearing resolution cache"
            );
            self.modules.clear();
            self.type_refs.clear();
            self.scopes = PackageScopes::new();
        }
        self.options = options.clone();
        cleared
    }

    /// Derives the cache for the next generation.
    ///
    /// Negative results and results whose target file no longer exists are
    /// dropped, since either may now resolve differently. Package manifests
    /// are re-read. Counters restart at zero.
    pub fn for_next_generation(&self, fs: &dyn FileSystem, options: &CompilerOptions) -> Self {
        let mut next = self.clone();
        next.stats = CacheStats::default();
        next.scopes = PackageScopes::new();
        if !next.update_options(options) {
            next.modules.retain(|_, r| match r {
                Resolution::Resolved(m) => fs.file_exists(&m.file_name),
                Resolution::Unresolved(_) => false,
            });
            next.type_refs.retain(|_, r| match r {
                TypeReferenceResolution::Resolved(t) => fs.file_exists(&t.file_name),
                TypeReferenceResolution::Unresolved(_) => false,
            });
        }
        next
    }

    /// Resolves one module specifier written in `containing_file`.
    pub fn resolve_module(
        &mut self,
        fs: &dyn FileSystem,
        specifier: &str,
        containing_file: &str,
        mode: Option<ModuleFormat>,
    ) -> Resolution {
        let dir = directory_of(containing_file);
        let key = (self.canon.canonical(dir), specifier.to_string(), mode);
        if let Some(hit) = self.modules.get(&key) {
            self.stats.hits += 1;
            return hit.clone();
        }
        self.stats.misses += 1;
        let resolution =
            Resolver::new(fs, &self.options, &self.project_dir, &mut self.scopes).resolve_module(specifier, dir, mode);
        tracing::trace!(specifier, containing = dir, ?mode, resolved = ?resolution.resolved().map(|m| &m.resolved_path), "resolved module");
        self.modules.insert(key, resolution.clone());
        resolution
    }

    /// Resolves a batch of `(specifier, mode)` requests from one file,
    /// answering repeats within the batch from the first occurrence.
    pub fn resolve_module_names(
        &mut self,
        fs: &dyn FileSystem,
        containing_file: &str,
        requests: &[(&str, Option<ModuleFormat>)],
    ) -> Vec<Resolution> {
        let mut local: HashMap<(&str, Option<ModuleFormat>), Resolution> = HashMap::new();
        let mut out = Vec::with_capacity(requests.len());
        for &(specifier, mode) in requests {
            if let Some(seen) = local.get(&(specifier, mode)) {
                self.stats.deduplicated += 1;
                out.push(seen.clone());
                continue;
            }
            let resolution = self.resolve_module(fs, specifier, containing_file, mode);
            local.insert((specifier, mode), resolution.clone());
            out.push(resolution);
        }
        out
    }

    /// Resolves a type-reference directive name. With no containing file
    /// (automatic type directives) the lookup starts at the project
    /// directory.
    pub fn resolve_type_reference(
        &mut self,
        fs: &dyn FileSystem,
        name: &str,
        containing_file: Option<&str>,
        mode: Option<ModuleFormat>,
    ) -> TypeReferenceResolution {
        let dir = containing_file.map_or(self.project_dir.as_str(), directory_of).to_string();
        let key = (self.canon.canonical(&dir), name.to_string(), mode);
        if let Some(hit) = self.type_refs.get(&key) {
            self.stats.hits += 1;
            return hit.clone();
        }
        self.stats.misses += 1;
        let resolution = Resolver::new(fs, &self.options, &self.project_dir, &mut self.scopes)
            .resolve_type_reference(name, &dir, mode);
        tracing::trace!(name, containing = %dir, primary = ?resolution.resolved().map(|t| t.primary), "resolved type reference");
        self.type_refs.insert(key, resolution.clone());
        resolution
    }

    /// Batch form of [`resolve_type_reference`](Self::resolve_type_reference)
    /// with the same per-file deduplication as
    /// [`resolve_module_names`](Self::resolve_module_names).
    pub fn resolve_type_references(
        &mut self,
        fs: &dyn FileSystem,
        containing_file: Option<&str>,
        requests: &[(&str, Option<ModuleFormat>)],
    ) -> Vec<TypeReferenceResolution> {
        let mut local: HashMap<(&str, Option<ModuleFormat>), TypeReferenceResolution> = HashMap::new();
        let mut out = Vec::with_capacity(requests.len());
        for &(name, mode) in requests {
            if let Some(seen) = local.get(&(name, mode)) {
                self.stats.deduplicated += 1;
                out.push(seen.clone());
                continue;
            }
            let resolution = self.resolve_type_reference(fs, name, containing_file, mode);
            local.insert((name, mode), resolution.clone());
            out.push(resolution);
        }
        out
    }

    /// The nearest package scope of `dir`.
    pub fn package_scope(&mut self, fs: &dyn FileSystem, dir: &str) -> Option<Arc<PackageScope>> {
        self.scopes.scope_for(fs, self.canon, dir)
    }

    /// The module format a file is interpreted under, or `None` when the
    /// resolution strategy does not distinguish formats.
    ///
    /// `.mts`/`.mjs` and `.cts`/`.cjs` decide by extension; other files take
    /// the `"type"` of their nearest package scope.
    pub fn implied_format(&mut self, fs: &dyn FileSystem, file_name: &str) -> Option<ModuleFormat> {
        if !self.options.effective_module_resolution().is_format_aware() {
            return None;
        }
        let ext = Extension::of(file_name)?;
        if ext == Extension::Json {
            return None;
        }
        if let Some(format) = ext.implied_format() {
            return Some(format);
        }
        Some(
            self.package_scope(fs, directory_of(file_name))
                .map_or(ModuleFormat::CommonJs, |scope| scope.manifest.module_format()),
        )
    }

    /// The type roots for the current options.
    pub fn type_roots(&mut self, fs: &dyn FileSystem) -> Vec<String> {
        Resolver::new(fs, &self.options, &self.project_dir, &mut self.scopes).type_roots()
    }

    /// Drains I/O failures seen while reading package manifests.
    pub fn take_host_errors(&mut self) -> Vec<HostError> {
        self.scopes.take_errors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use crate::resolution::UnresolvedReason;
    use keel_config::ModuleResolution;

    fn cache(options: CompilerOptions) -> ResolutionCache {
        ResolutionCache::new(options, "/proj", Canonicalizer::new(true))
    }

    fn fs() -> MemoryFileSystem {
        MemoryFileSystem::new(true)
            .with_file("/proj/src/a.ts", "")
            .with_file("/proj/src/b.ts", "")
    }

    #[test]
    fn second_lookup_hits() {
        let fs = fs();
        let mut c = cache(CompilerOptions::default());
        let first = c.resolve_module(&fs, "./b", "/proj/src/a.ts", None);
        let second = c.resolve_module(&fs, "./b", "/proj/src/other.ts", None);
        assert_eq!(first, second);
        assert_eq!(c.stats().misses, 1);
        assert_eq!(c.stats().hits, 1);
    }

    #[test]
    fn mode_is_part_of_the_key() {
        let fs = fs();
        let mut c = cache(CompilerOptions::default());
        c.resolve_module(&fs, "./b", "/proj/src/a.ts", None);
        c.resolve_module(&fs, "./b", "/proj/src/a.ts", Some(ModuleFormat::CommonJs));
        assert_eq!(c.stats().misses, 2);
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn batch_dedupes_within_a_file() {
        let fs = fs();
        let mut c = cache(CompilerOptions::default());
        let out = c.resolve_module_names(&fs, "/proj/src/a.ts", &[("./b", None), ("./missing", None), ("./b", None)]);
        assert_eq!(out.len(), 3);
        assert!(out[0].is_resolved());
        assert_eq!(out[1], Resolution::Unresolved(UnresolvedReason::NotFound));
        assert_eq!(out[0], out[2]);
        assert_eq!(c.stats().deduplicated, 1);
        assert_eq!(c.stats().misses, 2);
    }

    #[test]
    fn resolution_option_change_clears() {
        let fs = fs();
        let mut c = cache(CompilerOptions::default());
        c.resolve_module(&fs, "./b", "/proj/src/a.ts", None);

        let mut strict = CompilerOptions::default();
        strict.strict = true;
        assert!(!c.update_options(&strict));
        assert_eq!(c.len(), 1);

        let mut classic = strict.clone();
        classic.module_resolution = Some(ModuleResolution::Classic);
        assert!(c.update_options(&classic));
        assert!(c.is_empty());
    }

    #[test]
    fn next_generation_drops_stale_entries() {
        let mut fs = fs();
        let mut c = cache(CompilerOptions::default());
        c.resolve_module(&fs, "./b", "/proj/src/a.ts", None);
        c.resolve_module(&fs, "./c", "/proj/src/a.ts", None);
        assert_eq!(c.len(), 2);

        fs.write("/proj/src/c.ts", "");
        let next = c.for_next_generation(&fs, &CompilerOptions::default());
        assert_eq!(next.len(), 1);
        assert_eq!(next.stats(), CacheStats::default());

        fs.remove("/proj/src/b.ts");
        let after_delete = next.for_next_generation(&fs, &CompilerOptions::default());
        assert!(after_delete.is_empty());
    }

    #[test]
    fn implied_format_under_node16() {
        let fs = MemoryFileSystem::new(true)
            .with_file("/proj/package.json", r#"{"type":"module"}"#)
            .with_file("/proj/src/a.ts", "")
            .with_file("/proj/src/b.cts", "");
        let mut plain = cache(CompilerOptions::default());
        assert_eq!(plain.implied_format(&fs, "/proj/src/a.ts"), None);

        let mut c = cache(CompilerOptions {
            module_resolution: Some(ModuleResolution::Node16),
            ..CompilerOptions::default()
        });
        assert_eq!(c.implied_format(&fs, "/proj/src/a.ts"), Some(ModuleFormat::EsModule));
        assert_eq!(c.implied_format(&fs, "/proj/src/b.cts"), Some(ModuleFormat::CommonJs));
    }

    #[test]
    fn type_reference_without_containing_file() {
        let fs = MemoryFileSystem::new(true).with_file("/proj/node_modules/@types/node/index.d.ts", "");
        let mut c = cache(CompilerOptions::default());
        let r = c.resolve_type_reference(&fs, "node", None, None);
        assert!(r.resolved().is_some_and(|t| t.primary));
        let again = c.resolve_type_references(&fs, None, &[("node", None), ("node", None)]);
        assert_eq!(again.len(), 2);
        assert_eq!(c.stats().hits, 1);
        assert_eq!(c.stats().deduplicated, 1);
        assert_eq!(c.type_roots(&fs), vec!["/proj/node_modules/@types"]);
    }
}
