//! The finished program: units in order, their resolutions, and the
//! bookkeeping needed to explain and incrementally rebuild it.

use crate::reasons::{IncludeReason, ReasonStore};
use crate::references::ResolvedProjectReference;
use crate::reuse::ReuseReport;
use crate::store::{Checker, DependencyGraph, DiagnosticKind, DiagnosticsStore};
use keel_common::{CanonicalPath, Canonicalizer, KeelResult};
use keel_config::CompilerOptions;
use keel_diagnostics::{sort_and_dedup, Diagnostic, SourceLookup};
use keel_resolve::{Resolution, ResolutionCache, TypeReferenceResolution, UnresolvedReason};
use keel_source::{CompilationUnit, ModuleFormat, UnitArena, UnitId, UnitSlot};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// The resolutions made from one unit, indexed like its directive lists.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnitResolutions {
    /// One entry per import. `None` means the specifier names an ambient
    /// module declared in the program and needs no resolution.
    pub modules: Vec<Option<Resolution>>,
    /// One entry per type-reference directive.
    pub type_references: Vec<TypeReferenceResolution>,
}

impl UnitResolutions {
    /// Returns `true` if an unchanged, non-invalidated unit can keep these
    /// resolutions: no import failed for a reason that may have gone away,
    /// and every type reference resolved.
    ///
    /// Not-found slots qualify because the reuse decision looks them up
    /// again before queueing units; ambient (`None`) slots are checked
    /// against the new program's declarations once discovery ends.
    pub fn settled(&self) -> bool {
        self.modules.iter().all(|m| match m {
            None | Some(Resolution::Resolved(_)) => true,
            Some(Resolution::Unresolved(reason)) => {
                matches!(reason, UnresolvedReason::NotFound | UnresolvedReason::ResolutionDisabled)
            }
        }) && self.type_references.iter().all(|t| t.resolved().is_some())
    }

    /// Returns `true` if some import was left unresolved as an ambient module.
    pub fn has_ambient(&self) -> bool {
        self.modules.iter().any(Option::is_none)
    }
}

/// An immutable program snapshot.
#[derive(Clone)]
pub struct ProgramGraph {
    pub(crate) root_names: Vec<String>,
    pub(crate) options: CompilerOptions,
    pub(crate) project_dir: String,
    pub(crate) lib_dir: String,
    pub(crate) canon: Canonicalizer,
    pub(crate) arena: UnitArena,
    pub(crate) lib_count: usize,
    pub(crate) missing: BTreeSet<CanonicalPath>,
    pub(crate) reasons: ReasonStore,
    pub(crate) resolutions: HashMap<CanonicalPath, Arc<UnitResolutions>>,
    pub(crate) type_reference_directives: HashMap<(String, Option<ModuleFormat>), TypeReferenceResolution>,
    pub(crate) automatic_type_directive_names: Vec<String>,
    pub(crate) redirect_targets: HashMap<CanonicalPath, Vec<CanonicalPath>>,
    pub(crate) package_names: HashMap<CanonicalPath, String>,
    pub(crate) external_paths: HashSet<CanonicalPath>,
    pub(crate) project_references: Vec<Option<Arc<ResolvedProjectReference>>>,
    pub(crate) cache: ResolutionCache,
    pub(crate) file_diagnostics: Vec<Diagnostic>,
    pub(crate) option_diagnostics: Vec<Diagnostic>,
    pub(crate) store: DiagnosticsStore,
    pub(crate) reuse: ReuseReport,
}

impl ProgramGraph {
    /// Root file names as requested, in order.
    pub fn root_names(&self) -> &[String] {
        &self.root_names
    }

    /// The options the program was built with.
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// The directory relative root names and option paths are anchored at.
    pub fn project_dir(&self) -> &str {
        &self.project_dir
    }

    /// The directory library files were loaded from.
    pub fn lib_dir(&self) -> &str {
        &self.lib_dir
    }

    /// The path canonicalizer of the host the program was built on.
    pub fn canonicalizer(&self) -> Canonicalizer {
        self.canon
    }

    /// Slots in program order: library units by priority, then every other
    /// unit in discovery order. Redirects are included.
    pub fn units(&self) -> impl Iterator<Item = &UnitSlot> {
        self.arena.iter().map(|(_, slot)| slot)
    }

    /// The units with their own semantic data, in program order.
    pub fn source_units(&self) -> impl Iterator<Item = &Arc<CompilationUnit>> {
        self.units().filter_map(|slot| match slot {
            UnitSlot::Source(unit) => Some(unit),
            UnitSlot::Redirect(_) => None,
        })
    }

    /// Number of slots, redirects included.
    pub fn unit_count(&self) -> usize {
        self.arena.len()
    }

    /// Number of leading slots that are library units.
    pub fn library_count(&self) -> usize {
        self.lib_count
    }

    /// The slot registered at `path`.
    pub fn slot(&self, path: &CanonicalPath) -> Option<&UnitSlot> {
        self.arena.lookup(path).map(|id| self.arena.slot(id))
    }

    /// The unit answering for `path`, following a redirect.
    pub fn get_unit(&self, path: &CanonicalPath) -> Option<&Arc<CompilationUnit>> {
        self.arena.unit_at(path)
    }

    /// [`get_unit`](Self::get_unit) by file name.
    pub fn get_unit_by_name(&self, file_name: &str) -> Option<&Arc<CompilationUnit>> {
        self.get_unit(&self.canon.canonical(file_name))
    }

    /// Position of `path` in program order.
    pub fn position(&self, path: &CanonicalPath) -> Option<usize> {
        self.arena.lookup(path).map(UnitId::index)
    }

    /// Returns `true` if `path` is a library unit.
    pub fn is_library(&self, path: &CanonicalPath) -> bool {
        self.position(path).is_some_and(|index| index < self.lib_count)
    }

    /// Returns `true` if `path` is a redirect.
    pub fn is_redirect(&self, path: &CanonicalPath) -> bool {
        self.slot(path).is_some_and(UnitSlot::is_redirect)
    }

    /// Redirect paths per target path.
    pub fn redirect_targets(&self) -> &HashMap<CanonicalPath, Vec<CanonicalPath>> {
        &self.redirect_targets
    }

    /// The resolutions made from `path`.
    pub fn resolutions(&self, path: &CanonicalPath) -> Option<&Arc<UnitResolutions>> {
        self.resolutions.get(path)
    }

    /// The resolution of `specifier` as written in `path`.
    pub fn resolved_module(&self, path: &CanonicalPath, specifier: &str) -> Option<&Resolution> {
        let unit = self.get_unit(path)?;
        let index = unit.imports.iter().position(|import| import.text == specifier)?;
        self.resolutions.get(path)?.modules.get(index)?.as_ref()
    }

    /// Program-wide type-reference directive resolutions.
    pub fn type_reference_directives(
        &self,
    ) -> &HashMap<(String, Option<ModuleFormat>), TypeReferenceResolution> {
        &self.type_reference_directives
    }

    /// Type packages included without being referenced.
    pub fn automatic_type_directive_names(&self) -> &[String] {
        &self.automatic_type_directive_names
    }

    /// Paths requested but never found.
    pub fn missing_paths(&self) -> impl Iterator<Item = &CanonicalPath> {
        self.missing.iter()
    }

    /// Returns `true` if `path` was requested but not found.
    pub fn is_missing(&self, path: &CanonicalPath) -> bool {
        self.missing.contains(path)
    }

    /// Include reasons per path.
    pub fn reasons(&self) -> &ReasonStore {
        &self.reasons
    }

    /// The referenced projects, in reference order. `None` entries failed to
    /// load.
    pub fn project_references(&self) -> &[Option<Arc<ResolvedProjectReference>>] {
        &self.project_references
    }

    /// The resolution cache of this generation.
    pub fn resolution_cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// How this program was derived from its predecessor.
    pub fn reuse_report(&self) -> &ReuseReport {
        &self.reuse
    }

    /// The checker diagnostics memo.
    pub fn diagnostics_store(&self) -> &DiagnosticsStore {
        &self.store
    }

    /// Diagnostics raised while discovering files.
    pub fn file_processing_diagnostics(&self) -> &[Diagnostic] {
        &self.file_diagnostics
    }

    /// Diagnostics about the options and project references.
    pub fn option_diagnostics(&self) -> &[Diagnostic] {
        &self.option_diagnostics
    }

    /// File-processing and option diagnostics, deduplicated and sorted.
    pub fn program_diagnostics(&self) -> Vec<Diagnostic> {
        sort_and_dedup(
            self.file_diagnostics
                .iter()
                .chain(&self.option_diagnostics)
                .cloned()
                .collect(),
        )
    }

    /// `kind` diagnostics for `path`, computed by `checker` on first request.
    ///
    /// A redirect answers with its target's diagnostics. Unknown paths have
    /// none.
    pub fn diagnostics(
        &self,
        path: &CanonicalPath,
        kind: DiagnosticKind,
        checker: &dyn Checker,
    ) -> KeelResult<Arc<[Diagnostic]>> {
        let Some(unit) = self.get_unit(path) else {
            return Ok(Arc::from(Vec::new()));
        };
        self.store
            .get_or_compute(&unit.path, kind, || checker.check(self, unit, kind))
    }

    /// Human-readable inclusion chain for `path`, one line per reason,
    /// skipping `proximate`.
    pub fn explain_inclusion(&self, path: &CanonicalPath, proximate: Option<&IncludeReason>) -> Vec<String> {
        self.reasons
            .explain(path, proximate)
            .into_iter()
            .map(|reason| self.describe_reason(reason))
            .collect()
    }

    /// Renders one include reason.
    pub fn describe_reason(&self, reason: &IncludeReason) -> String {
        match reason {
            IncludeReason::RootFile { .. } => "Root file specified for compilation".to_string(),
            IncludeReason::Import { from, index } => {
                let specifier = self
                    .get_unit(from)
                    .and_then(|unit| unit.imports.get(*index))
                    .map_or("?", |import| import.text.as_str());
                let package = self
                    .resolutions
                    .get(from)
                    .and_then(|r| r.modules.get(*index))
                    .and_then(|m| m.as_ref())
                    .and_then(Resolution::resolved)
                    .and_then(|m| m.package_id.as_ref());
                match package {
                    Some(id) => format!(
                        "Imported via \"{specifier}\" from file '{}' with packageId '{id}'",
                        self.display_name(from)
                    ),
                    None => format!("Imported via \"{specifier}\" from file '{}'", self.display_name(from)),
                }
            }
            IncludeReason::ReferenceFile { from, index } => {
                let name = self
                    .get_unit(from)
                    .and_then(|unit| unit.referenced_files.get(*index))
                    .map_or("?", |r| r.file_name.as_str());
                format!("Referenced via '{name}' from file '{}'", self.display_name(from))
            }
            IncludeReason::TypeReferenceDirective { from, index } => {
                let name = self
                    .get_unit(from)
                    .and_then(|unit| unit.type_reference_directives.get(*index))
                    .map_or("?", |r| r.file_name.as_str());
                format!("Type library referenced via '{name}' from file '{}'", self.display_name(from))
            }
            IncludeReason::LibReferenceDirective { from, index } => {
                let name = self
                    .get_unit(from)
                    .and_then(|unit| unit.lib_reference_directives.get(*index))
                    .map_or("?", |r| r.file_name.as_str());
                format!("Library referenced via '{name}' from file '{}'", self.display_name(from))
            }
            IncludeReason::LibFile { index: Some(index) } => {
                let name = self
                    .options
                    .lib
                    .as_ref()
                    .and_then(|libs| libs.get(*index))
                    .map_or("?", String::as_str);
                format!("Library '{name}' specified in compilerOptions")
            }
            IncludeReason::LibFile { index: None } => {
                format!(
                    "Default library for target '{}'",
                    format!("{:?}", self.options.target).to_lowercase()
                )
            }
            IncludeReason::AutomaticTypeDirective { name } => {
                format!("Entry point for implicit type library '{name}'")
            }
            IncludeReason::ProjectReferenceSource { index } => {
                format!("Source from referenced project '{}'", self.reference_name(*index))
            }
            IncludeReason::ProjectReferenceOutput { index } => {
                format!("Output from referenced project '{}'", self.reference_name(*index))
            }
        }
    }

    fn display_name<'a>(&'a self, path: &'a CanonicalPath) -> &'a str {
        self.slot(path).map_or(path.as_str(), UnitSlot::file_name)
    }

    fn reference_name(&self, index: usize) -> &str {
        self.project_references
            .get(index)
            .and_then(Option::as_ref)
            .map_or("?", |reference| reference.config_file.as_str())
    }

    /// The unit dependency graph, derived from the include reasons and
    /// redirects.
    pub fn dependency_graph(&self) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for path in self.reasons.paths() {
            for reason in self.reasons.reasons(path) {
                if let Some(from) = reason.referencing_unit() {
                    graph.add_edge(from, path);
                }
            }
        }
        for (target, redirects) in &self.redirect_targets {
            for redirect in redirects {
                graph.add_edge(redirect, target);
            }
        }
        graph
    }
}

impl fmt::Debug for ProgramGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramGraph")
            .field("root_names", &self.root_names)
            .field("units", &self.arena.len())
            .field("libraries", &self.lib_count)
            .field("missing", &self.missing.len())
            .field("verdict", &self.reuse.verdict)
            .finish()
    }
}

impl SourceLookup for ProgramGraph {
    fn lookup(&self, path: &CanonicalPath) -> Option<&CompilationUnit> {
        self.get_unit(path).map(|unit| unit.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_resolve::ResolvedModule;
    use keel_source::Extension;

    fn module(path: &str) -> Option<Resolution> {
        Some(Resolution::Resolved(Arc::new(ResolvedModule {
            resolved_path: Canonicalizer::new(true).canonical(path),
            file_name: path.to_string(),
            extension: Extension::Ts,
            package_id: None,
            is_external_library_import: false,
        })))
    }

    #[test]
    fn settled_keeps_ambient_and_missing_imports() {
        let mut r = UnitResolutions {
            modules: vec![module("/a.ts"), None],
            type_references: vec![],
        };
        assert!(r.settled());
        assert!(r.has_ambient());
        r.modules
            .push(Some(Resolution::Unresolved(UnresolvedReason::NotFound)));
        assert!(r.settled());
        r.modules
            .push(Some(Resolution::Unresolved(UnresolvedReason::HostFailure("EIO".into()))));
        assert!(!r.settled());
        r.modules.pop();
        r.modules
            .push(Some(Resolution::Unresolved(UnresolvedReason::DisallowedExtension(Extension::Js))));
        assert!(!r.settled());
        assert!(UnitResolutions::default().settled());
    }
}
