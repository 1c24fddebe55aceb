//! Node-style and classic module resolution, and type-reference resolution.
//!
//! A [`Resolver`] borrows the filesystem, the options and the package-scope
//! memo for the duration of one lookup. It does no caching of its own; the
//! [`ResolutionCache`](crate::ResolutionCache) sits in front of it.

use crate::fs::FileSystem;
use crate::package::{ancestor_dirs, PackageScopes};
use crate::resolution::{
    PackageId, Resolution, ResolvedModule, ResolvedTypeReference, TypeReferenceResolution,
    UnresolvedReason,
};
use keel_common::path::{base_name, combine_paths, is_rooted};
use keel_common::Canonicalizer;
use keel_config::CompilerOptions;
use keel_source::{Extension, ModuleFormat};
use std::sync::Arc;

/// Which extensions a lookup may produce.
#[derive(Clone, Copy, Debug)]
struct Exts {
    list: &'static [Extension],
    declarations_only: bool,
}

impl Exts {
    const TYPED: Exts = Exts {
        list: &[Extension::Ts, Extension::Tsx, Extension::Dts],
        declarations_only: false,
    };
    const TYPED_AND_SCRIPTS: Exts = Exts {
        list: &[
            Extension::Ts,
            Extension::Tsx,
            Extension::Dts,
            Extension::Js,
            Extension::Jsx,
        ],
        declarations_only: false,
    };
    const SCRIPTS: Exts = Exts {
        list: &[Extension::Js, Extension::Jsx],
        declarations_only: false,
    };
    const DECLARATIONS: Exts = Exts {
        list: &[Extension::Dts],
        declarations_only: true,
    };

    fn accepts(self, ext: Extension) -> bool {
        if self.declarations_only {
            ext.is_declaration()
        } else if ext.is_javascript() {
            self.list.contains(&Extension::Js)
        } else if ext == Extension::Json {
            false
        } else {
            self.list.contains(&Extension::Ts)
        }
    }

    fn typed(self) -> bool {
        self.list.contains(&Extension::Ts) || self.declarations_only
    }
}

/// A file found on disk, before option checks.
#[derive(Debug)]
struct Found {
    file_name: String,
    extension: Extension,
    package_dir: Option<String>,
    external: bool,
}

/// Maps specifiers to files for one set of options.
pub struct Resolver<'a> {
    fs: &'a dyn FileSystem,
    options: &'a CompilerOptions,
    canon: Canonicalizer,
    project_dir: &'a str,
    scopes: &'a mut PackageScopes,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver. `project_dir` anchors `base_url`, `paths`,
    /// `type_roots` and automatic type-reference lookups.
    pub fn new(
        fs: &'a dyn FileSystem,
        options: &'a CompilerOptions,
        project_dir: &'a str,
        scopes: &'a mut PackageScopes,
    ) -> Self {
        Self {
            canon: fs.canonicalizer(),
            fs,
            options,
            project_dir,
            scopes,
        }
    }

    /// Resolves a module specifier written in a file in `containing_dir`.
    pub fn resolve_module(
        &mut self,
        specifier: &str,
        containing_dir: &str,
        mode: Option<ModuleFormat>,
    ) -> Resolution {
        if self.options.no_resolve {
            return Resolution::Unresolved(UnresolvedReason::ResolutionDisabled);
        }
        let errors_before = self.scopes.errors().len();
        match self.find_module(specifier, containing_dir, mode) {
            Some(found) => self.finish_module(found),
            None => Resolution::Unresolved(self.failure_reason(errors_before)),
        }
    }

    /// Resolves a type-reference directive name.
    ///
    /// Type roots are searched first (a *primary* result); failing that, the
    /// `node_modules` directories above `containing_dir` are searched.
    pub fn resolve_type_reference(
        &mut self,
        name: &str,
        containing_dir: &str,
        _mode: Option<ModuleFormat>,
    ) -> TypeReferenceResolution {
        let errors_before = self.scopes.errors().len();
        for root in self.type_roots() {
            let candidate = combine_paths(&root, name);
            let found = self
                .load_as_file(&candidate, Exts::DECLARATIONS, false)
                .or_else(|| self.load_as_directory(&candidate, Exts::DECLARATIONS, true));
            if let Some((file_name, _)) = found {
                return self.finish_type_reference(file_name, Some(candidate), true, true);
            }
        }
        if let Some(found) = self.package_lookup(name, containing_dir, Exts::DECLARATIONS) {
            return self.finish_type_reference(
                found.file_name,
                found.package_dir,
                false,
                found.external,
            );
        }
        TypeReferenceResolution::Unresolved(self.failure_reason(errors_before))
    }

    /// Directories searched for type packages: the configured `type_roots`,
    /// or every `node_modules/@types` above the project directory.
    pub fn type_roots(&self) -> Vec<String> {
        match &self.options.type_roots {
            Some(roots) => roots
                .iter()
                .map(|root| combine_paths(self.project_dir, root))
                .collect(),
            None => ancestor_dirs(self.project_dir)
                .into_iter()
                .map(|dir| combine_paths(&dir, "node_modules/@types"))
                .filter(|candidate| self.fs.directory_exists(candidate))
                .collect(),
        }
    }

    fn failure_reason(&self, errors_before: usize) -> UnresolvedReason {
        match self.scopes.errors().get(errors_before..).and_then(|new| new.last()) {
            Some(error) => UnresolvedReason::HostFailure(error.to_string()),
            None => UnresolvedReason::NotFound,
        }
    }

    fn find_module(
        &mut self,
        specifier: &str,
        containing_dir: &str,
        mode: Option<ModuleFormat>,
    ) -> Option<Found> {
        let strategy = self.options.effective_module_resolution();
        let esm_strict = strategy.is_format_aware() && mode == Some(ModuleFormat::EsModule);
        let exts = if self.options.allow_js {
            Exts::TYPED_AND_SCRIPTS
        } else {
            Exts::TYPED
        };

        if is_relative(specifier) || is_rooted(specifier) {
            let candidate = combine_paths(containing_dir, specifier);
            return self.load_file_or_directory(&candidate, exts, esm_strict, false);
        }

        if let Some(found) = self.try_paths(specifier, exts) {
            return Some(found);
        }
        if let Some(base_url) = &self.options.base_url {
            let base = combine_paths(self.project_dir, base_url);
            let candidate = combine_paths(&base, specifier);
            if let Some(found) = self.load_file_or_directory(&candidate, exts, false, false) {
                return Some(found);
            }
        }
        if strategy.searches_packages() {
            self.package_lookup(specifier, containing_dir, exts).or_else(|| {
                if self.options.allow_js {
                    None
                } else {
                    self.package_lookup(specifier, containing_dir, Exts::SCRIPTS)
                }
            })
        } else {
            self.classic_lookup(specifier, containing_dir, exts)
        }
    }

    fn finish_module(&mut self, found: Found) -> Resolution {
        let ext = found.extension;
        let allowed = if ext.is_javascript() {
            self.options.allow_js
        } else if ext == Extension::Json {
            self.options.resolve_json_module
        } else {
            true
        };
        if !allowed {
            return Resolution::Unresolved(UnresolvedReason::DisallowedExtension(ext));
        }
        let file_name = self.real_path(found.file_name);
        let package_id = found
            .package_dir
            .as_deref()
            .and_then(|dir| self.package_id(dir, &file_name));
        Resolution::Resolved(Arc::new(ResolvedModule {
            resolved_path: self.canon.canonical(&file_name),
            file_name,
            extension: ext,
            package_id,
            is_external_library_import: found.external,
        }))
    }

    fn finish_type_reference(
        &mut self,
        file_name: String,
        package_dir: Option<String>,
        primary: bool,
        external: bool,
    ) -> TypeReferenceResolution {
        let file_name = self.real_path(file_name);
        let package_id = package_dir
            .as_deref()
            .and_then(|dir| self.package_id(dir, &file_name));
        TypeReferenceResolution::Resolved(Arc::new(ResolvedTypeReference {
            resolved_path: self.canon.canonical(&file_name),
            file_name,
            primary,
            package_id,
            is_external_library_import: external,
        }))
    }

    fn real_path(&self, file_name: String) -> String {
        if self.options.preserve_symlinks {
            file_name
        } else {
            self.fs.real_path(&file_name)
        }
    }

    fn package_id(&mut self, package_dir: &str, file_name: &str) -> Option<PackageId> {
        let manifest = self.scopes.manifest(self.fs, self.canon, package_dir)?;
        let name = manifest.name.clone()?;
        let version = manifest.version.clone()?;
        let dir = self.canon.canonical(package_dir);
        let file = self.canon.canonical(file_name);
        let sub_module_name = file.relative_to(&dir)?.to_string();
        Some(PackageId {
            name,
            sub_module_name,
            version,
        })
    }

    /// Applies the longest-prefix `paths` pattern matching `specifier`.
    fn try_paths(&mut self, specifier: &str, exts: Exts) -> Option<Found> {
        let options = self.options;
        let (pattern, captured) = best_path_pattern(options.paths.keys(), specifier)?;
        let substitutions = options.paths.get(pattern)?;
        let base = combine_paths(self.project_dir, options.base_url.as_deref().unwrap_or("."));
        for substitution in substitutions {
            let candidate = combine_paths(&base, &substitution.replacen('*', captured, 1));
            if let Some(mut found) = self.load_file_or_directory(&candidate, exts, false, false) {
                found.external = found.file_name.contains("/node_modules/");
                return Some(found);
            }
        }
        None
    }

    fn classic_lookup(&mut self, specifier: &str, containing_dir: &str, exts: Exts) -> Option<Found> {
        for dir in ancestor_dirs(containing_dir) {
            let candidate = combine_paths(&dir, specifier);
            if let Some((file_name, extension)) = self.load_as_file(&candidate, exts, false) {
                return Some(Found {
                    file_name,
                    extension,
                    package_dir: None,
                    external: false,
                });
            }
        }
        for dir in ancestor_dirs(containing_dir) {
            let types = combine_paths(&dir, "node_modules/@types");
            if self.fs.directory_exists(&types) {
                if let Some(found) =
                    self.load_from_package(&types, &mangle_scoped_name(specifier), Exts::DECLARATIONS)
                {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Walks `node_modules` directories from `containing_dir` upward.
    fn package_lookup(&mut self, specifier: &str, containing_dir: &str, exts: Exts) -> Option<Found> {
        for dir in ancestor_dirs(containing_dir) {
            if base_name(&dir) == "node_modules" {
                continue;
            }
            let node_modules = combine_paths(&dir, "node_modules");
            if !self.fs.directory_exists(&node_modules) {
                continue;
            }
            if let Some(found) = self.load_from_package(&node_modules, specifier, exts) {
                return Some(found);
            }
            if exts.typed() {
                let types = combine_paths(&node_modules, "@types");
                if let Some(found) =
                    self.load_from_package(&types, &mangle_scoped_name(specifier), Exts::DECLARATIONS)
                {
                    return Some(found);
                }
            }
        }
        None
    }

    fn load_from_package(&mut self, node_modules: &str, specifier: &str, exts: Exts) -> Option<Found> {
        let (name, rest) = split_package_name(specifier);
        let package_dir = combine_paths(node_modules, name);
        let candidate = if rest.is_empty() {
            package_dir.clone()
        } else {
            combine_paths(&package_dir, rest)
        };
        let (file_name, extension) = self
            .load_as_file(&candidate, exts, false)
            .or_else(|| self.load_as_directory(&candidate, exts, true))?;
        Some(Found {
            file_name,
            extension,
            package_dir: Some(package_dir),
            external: true,
        })
    }

    fn load_file_or_directory(
        &mut self,
        candidate: &str,
        exts: Exts,
        esm_strict: bool,
        external: bool,
    ) -> Option<Found> {
        let (file_name, extension) = self.load_as_file(candidate, exts, esm_strict).or_else(|| {
            if esm_strict {
                None
            } else {
                self.load_as_directory(candidate, exts, true)
            }
        })?;
        Some(Found {
            file_name,
            extension,
            package_dir: None,
            external,
        })
    }

    /// Tries `candidate` as a file: with its written extension (script
    /// extensions are first swapped for their typed counterparts), or, if it
    /// has none, with each allowed extension appended.
    fn load_as_file(&self, candidate: &str, exts: Exts, esm_strict: bool) -> Option<(String, Extension)> {
        if let Some((stem, ext)) = Extension::split(candidate) {
            for typed in ext.typed_counterparts() {
                if exts.accepts(*typed) {
                    let path = format!("{stem}{typed}");
                    if self.fs.file_exists(&path) {
                        return Some((path, *typed));
                    }
                }
            }
            if (exts.accepts(ext) || ext == Extension::Json) && self.fs.file_exists(candidate) {
                return Some((candidate.to_string(), ext));
            }
            return None;
        }
        if esm_strict {
            return None;
        }
        exts.list.iter().find_map(|ext| {
            let path = format!("{candidate}{ext}");
            self.fs.file_exists(&path).then_some((path, *ext))
        })
    }

    /// Tries `dir` as a package or index directory.
    fn load_as_directory(&mut self, dir: &str, exts: Exts, allow_index: bool) -> Option<(String, Extension)> {
        if !self.fs.directory_exists(dir) {
            return None;
        }
        if let Some(manifest) = self.scopes.manifest(self.fs, self.canon, dir) {
            let entries = [
                manifest.types_entry().filter(|_| exts.typed()),
                manifest.main.as_deref().filter(|_| !exts.declarations_only),
            ];
            for entry in entries.into_iter().flatten() {
                let path = combine_paths(dir, entry);
                if let Some(found) = self.load_as_file(&path, exts, false) {
                    return Some(found);
                }
                if let Some(found) = self.index_file(&path, exts) {
                    return Some(found);
                }
            }
        }
        if allow_index {
            self.index_file(dir, exts)
        } else {
            None
        }
    }

    fn index_file(&self, dir: &str, exts: Exts) -> Option<(String, Extension)> {
        let index = combine_paths(dir, "index");
        exts.list.iter().find_map(|ext| {
            let path = format!("{index}{ext}");
            self.fs.file_exists(&path).then_some((path, *ext))
        })
    }
}

/// Returns `true` for `./x`, `../x`, `.` and `..`.
pub fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

/// Splits `@scope/name/rest` or `name/rest` into package name and subpath.
pub fn split_package_name(specifier: &str) -> (&str, &str) {
    let name_end = if specifier.starts_with('@') {
        specifier
            .match_indices('/')
            .nth(1)
            .map_or(specifier.len(), |(i, _)| i)
    } else {
        specifier.find('/').unwrap_or(specifier.len())
    };
    let rest = specifier.get(name_end + 1..).unwrap_or("");
    (&specifier[..name_end], rest)
}

/// Maps `@scope/name` to the `@types` directory name `scope__name`.
pub fn mangle_scoped_name(name: &str) -> String {
    match name.strip_prefix('@') {
        Some(scoped) => scoped.replacen('/', "__", 1),
        None => name.to_string(),
    }
}

/// Picks the `paths` pattern for `specifier`: an exact match wins, otherwise
/// the wildcard pattern with the longest prefix. Returns the pattern and the
/// text matched by `*`.
pub fn best_path_pattern<'p, 's>(
    patterns: impl IntoIterator<Item = &'p String>,
    specifier: &'s str,
) -> Option<(&'p str, &'s str)> {
    let mut best: Option<(&'p str, &'s str, usize)> = None;
    for pattern in patterns {
        match pattern.split_once('*') {
            None if pattern == specifier => return Some((pattern, "")),
            None => {}
            Some((prefix, suffix)) => {
                if suffix.contains('*') {
                    continue;
                }
                if specifier.len() >= prefix.len() + suffix.len()
                    && specifier.starts_with(prefix)
                    && specifier.ends_with(suffix)
                    && best.map_or(true, |(_, _, len)| prefix.len() > len)
                {
                    let captured = &specifier[prefix.len()..specifier.len() - suffix.len()];
                    best = Some((pattern, captured, prefix.len()));
                }
            }
        }
    }
    best.map(|(pattern, captured, _)| (pattern, captured))
}
