//! File graph discovery.
//!
//! Discovery is a depth-first walk driven by an explicit task stack. A
//! `Visit` loads a unit and schedules its references; the matching `Finish`
//! runs once every reference below it is done and appends the unit to its
//! bucket, so units come out in dependency-first order. All state lives in
//! the [`Builder`] until [`Builder::finish`] assembles the graph, so a
//! cancelled build publishes nothing.

use crate::errors;
use crate::graph::{ProgramGraph, UnitResolutions};
use crate::host::{CompilerHost, UnitRequest};
use crate::libs::{closest_lib_name, default_lib_file_name, lib_file_name, lib_priority};
use crate::options_check::{check_options, CheckInput};
use crate::reasons::{IncludeReason, ReasonStore};
use crate::references::{for_each_reference, ResolvedProjectReference};
use crate::reresolve::{reresolve_modules, reresolve_type_references, PriorState};
use crate::reuse::{Decision, ReuseReport};
use crate::store::DiagnosticsStore;
use keel_common::path::{base_name, combine_paths, directory_of, normalize_path};
use keel_common::{CanonicalPath, Canonicalizer, KeelResult};
use keel_config::{CompilerOptions, ModuleKind};
use keel_diagnostics::Diagnostic;
use keel_resolve::{
    FileSystem, HostError, PackageId, Resolution, ResolutionCache, TypeReferenceResolution, UnresolvedReason,
};
use keel_source::{CompilationUnit, Extension, ModuleFormat, Redirect, Span, UnitArena, UnitId, UnitSlot};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// The request a build runs for. Everything here moves into the graph.
pub(crate) struct BuildInput {
    pub root_names: Vec<String>,
    pub options: CompilerOptions,
    pub project_dir: String,
    pub lib_dir: String,
    pub references: Vec<Option<Arc<ResolvedProjectReference>>>,
    pub reference_diagnostics: Vec<Diagnostic>,
}

/// What a reuse-mode build may take from the previous program.
pub(crate) struct ReuseContext<'a> {
    old: &'a ProgramGraph,
    decision: &'a Decision,
    ambient_in_unmodified: HashSet<&'a str>,
    trust_ambient: bool,
}

impl<'a> ReuseContext<'a> {
    pub(crate) fn new(old: &'a ProgramGraph, decision: &'a Decision) -> Self {
        let ambient_in_unmodified = old
            .source_units()
            .filter(|unit| !decision.modified.contains(&unit.path))
            .flat_map(|unit| unit.ambient_modules.iter().map(String::as_str))
            .collect();
        Self {
            old,
            decision,
            ambient_in_unmodified,
            trust_ambient: true,
        }
    }

    /// The same context with the previous generation's ambient declarations
    /// ignored: no imports are predicted from them and no ambient slot is
    /// carried over.
    fn without_ambient(&self) -> ReuseContext<'a> {
        ReuseContext {
            old: self.old,
            decision: self.decision,
            ambient_in_unmodified: HashSet::new(),
            trust_ambient: false,
        }
    }

    /// Returns `true` if `name`, imported from `path`, did not resolve to a
    /// file last time and is declared as an ambient module by an unmodified
    /// unit.
    fn was_ambient(&self, path: &CanonicalPath, name: &str) -> bool {
        let resolved_to_file = self
            .old
            .resolved_module(path, name)
            .and_then(Resolution::resolved)
            .is_some_and(|module| self.old.slot(&module.resolved_path).is_some());
        !resolved_to_file && self.ambient_in_unmodified.contains(name)
    }

    /// The previous generation's unit at `path`, as re-read by the decision.
    fn prefetched(&self, path: &CanonicalPath, file_name: &str) -> Option<Arc<CompilationUnit>> {
        self.decision
            .units
            .get(path)
            .filter(|unit| unit.file_name == file_name)
            .cloned()
    }
}

enum Task {
    Visit(Visit),
    TypeReference(TypeReferenceTask),
    Finish(CanonicalPath),
}

struct Visit {
    file_name: String,
    reason: IncludeReason,
    is_default_lib: bool,
    package_id: Option<PackageId>,
    depth: u32,
    span: Option<Span>,
}

struct TypeReferenceTask {
    name: String,
    mode: Option<ModuleFormat>,
    resolution: TypeReferenceResolution,
    reason: IncludeReason,
    depth: u32,
    span: Option<Span>,
}

/// A discovered path.
struct Entry {
    /// The unit as read, before any redirection.
    unit: Arc<CompilationUnit>,
    /// Target path when this entry is a redirect.
    redirect_to: Option<CanonicalPath>,
    is_default_lib: bool,
    found_in_packages: bool,
    elided_imports: bool,
}

/// A referenced project's source and the output that replaces it. `None`
/// output means the project bundles into `out_file` and the import is
/// dropped.
#[derive(Clone)]
struct OutputRedirect {
    source: String,
    output: Option<String>,
}

pub(crate) struct Builder<'a> {
    host: &'a dyn CompilerHost,
    fs: &'a dyn FileSystem,
    canon: Canonicalizer,
    input: BuildInput,
    cache: ResolutionCache,
    reuse: Option<&'a ReuseContext<'a>>,
    source_outputs: HashMap<CanonicalPath, OutputRedirect>,
    stack: Vec<Task>,
    entries: HashMap<CanonicalPath, Entry>,
    libs: Vec<CanonicalPath>,
    others: Vec<CanonicalPath>,
    missing: BTreeSet<CanonicalPath>,
    reasons: ReasonStore,
    resolutions: HashMap<CanonicalPath, Arc<UnitResolutions>>,
    type_directives: HashMap<(String, Option<ModuleFormat>), TypeReferenceResolution>,
    automatic_type_directive_names: Vec<String>,
    package_targets: HashMap<PackageId, CanonicalPath>,
    redirect_targets: HashMap<CanonicalPath, Vec<CanonicalPath>>,
    package_names: HashMap<CanonicalPath, String>,
    external_paths: HashSet<CanonicalPath>,
    folded_names: HashMap<String, String>,
    skip_default_lib: bool,
    diagnostics: Vec<Diagnostic>,
    reresolved: Vec<CanonicalPath>,
}

/// Runs discovery for `input` and assembles the graph.
pub(crate) fn build(
    input: BuildInput,
    host: &dyn CompilerHost,
    cache: ResolutionCache,
    reuse: Option<&ReuseContext<'_>>,
    report: ReuseReport,
) -> KeelResult<ProgramGraph> {
    let mut builder = Builder::new(input, host, cache, reuse);
    builder.run()?;
    let Some(context) = reuse.filter(|_| !builder.ambient_slots_declared()) else {
        return Ok(builder.finish(report));
    };
    // An ambient declaration the build relied on is gone from the program.
    tracing::debug!("ambient module declarations changed; resolving without them");
    let (input, cache) = builder.into_parts();
    let context = context.without_ambient();
    let mut builder = Builder::new(input, host, cache, Some(&context));
    builder.run()?;
    Ok(builder.finish(report))
}

impl<'a> Builder<'a> {
    fn new(
        input: BuildInput,
        host: &'a dyn CompilerHost,
        cache: ResolutionCache,
        reuse: Option<&'a ReuseContext<'a>>,
    ) -> Self {
        let fs = host.file_system();
        let canon = fs.canonicalizer();
        let mut source_outputs = HashMap::new();
        if !host.use_source_of_project_reference_redirect() {
            for_each_reference(&input.references, &mut |reference| {
                let bundled = reference.options.out_file.is_some();
                for (source, output) in reference.outputs() {
                    let Some(output) = output else { continue };
                    source_outputs.insert(
                        canon.canonical(source),
                        OutputRedirect {
                            source: source.to_string(),
                            output: (!bundled).then_some(output),
                        },
                    );
                }
            });
        }
        let skip_default_lib = input.options.no_lib;
        Self {
            host,
            fs,
            canon,
            input,
            cache,
            reuse,
            source_outputs,
            stack: Vec::new(),
            entries: HashMap::new(),
            libs: Vec::new(),
            others: Vec::new(),
            missing: BTreeSet::new(),
            reasons: ReasonStore::new(),
            resolutions: HashMap::new(),
            type_directives: HashMap::new(),
            automatic_type_directive_names: Vec::new(),
            package_targets: HashMap::new(),
            redirect_targets: HashMap::new(),
            package_names: HashMap::new(),
            external_paths: HashSet::new(),
            folded_names: HashMap::new(),
            skip_default_lib,
            diagnostics: Vec::new(),
            reresolved: Vec::new(),
        }
    }

    /// Returns `true` if every import left without a resolution names an
    /// ambient module declared by a unit of this build.
    fn ambient_slots_declared(&self) -> bool {
        let ambient = declared_ambient_modules(&self.entries);
        self.resolutions.iter().all(|(path, resolutions)| {
            let Some(entry) = self.entries.get(path) else {
                return true;
            };
            entry
                .unit
                .imports
                .iter()
                .zip(&resolutions.modules)
                .all(|(import, module)| module.is_some() || ambient.contains(import.text.as_str()))
        })
    }

    fn into_parts(self) -> (BuildInput, ResolutionCache) {
        (self.input, self.cache)
    }

    /// Runs every discovery stage in order.
    fn run(&mut self) -> KeelResult<()> {
        if !self.input.root_names.is_empty() {
            self.process_project_references()?;
        }
        let roots = self.input.root_names.clone();
        for (index, name) in roots.iter().enumerate() {
            let name = combine_paths(&self.input.project_dir, name);
            if let Some(task) = self.request_file(&name, IncludeReason::RootFile { index }, false, 0, None) {
                self.stack.push(task);
                self.drain()?;
            }
        }
        self.process_automatic_type_directives()?;
        self.process_default_libs()?;
        tracing::debug!(
            units = self.entries.len(),
            missing = self.missing.len(),
            libraries = self.libs.len(),
            "discovery finished"
        );
        Ok(())
    }

    fn process_project_references(&mut self) -> KeelResult<()> {
        let references = self.input.references.clone();
        let prefer_sources = self.host.use_source_of_project_reference_redirect();
        for (index, reference) in references.iter().enumerate() {
            let Some(reference) = reference else { continue };
            let bundled = reference.options.out_file.is_some();
            let unbundled_scripts = reference.options.effective_module() == ModuleKind::None;
            if prefer_sources {
                if !(bundled || unbundled_scripts) {
                    continue;
                }
                let mut tasks = Vec::new();
                for name in &reference.root_names {
                    let is_source = Extension::of(name).is_some_and(|ext| !ext.is_declaration() && ext != Extension::Json);
                    if is_source {
                        let reason = IncludeReason::ProjectReferenceSource { index };
                        tasks.extend(self.request_file(name, reason, false, 0, None));
                    }
                }
                self.schedule(tasks);
            } else if bundled {
                if let Some((source, Some(output))) = reference.outputs().find(|(_, output)| output.is_some()) {
                    self.request_output(&output, source, IncludeReason::ProjectReferenceOutput { index });
                }
            } else if unbundled_scripts {
                let outputs: Vec<(&str, String)> = reference
                    .outputs()
                    .filter_map(|(source, output)| output.map(|output| (source, output)))
                    .collect();
                // Pushed last-first so the stack visits them in root order.
                for (source, output) in outputs.iter().rev() {
                    self.request_output(output, source, IncludeReason::ProjectReferenceOutput { index });
                }
            }
            self.drain()?;
        }
        Ok(())
    }

    /// Schedules a referenced project's declaration output, or diagnoses it
    /// as not built.
    fn request_output(&mut self, output: &str, source: &str, reason: IncludeReason) {
        if self.fs.file_exists(output) {
            self.stack.push(Task::Visit(Visit {
                file_name: output.to_string(),
                reason,
                is_default_lib: false,
                package_id: None,
                depth: 0,
                span: None,
            }));
        } else {
            let path = self.canon.canonical(output);
            self.diagnostics.push(errors::error_output_not_built(output, source, None));
            self.missing.insert(path.clone());
            self.reasons.record_reason(&path, reason);
        }
    }

    fn process_automatic_type_directives(&mut self) -> KeelResult<()> {
        let names = match &self.input.options.types {
            Some(types) => types.clone(),
            None => {
                let mut names: Vec<String> = Vec::new();
                for root in self.cache.type_roots(self.fs) {
                    if !self.fs.directory_exists(&root) {
                        continue;
                    }
                    for child in self.fs.list_directory(&root) {
                        let name = base_name(&child).to_string();
                        if !name.starts_with('.') && !names.contains(&name) {
                            names.push(name);
                        }
                    }
                }
                names
            }
        };
        if names.is_empty() {
            return Ok(());
        }
        let requests: Vec<(&str, Option<ModuleFormat>)> = names.iter().map(|name| (name.as_str(), None)).collect();
        let resolutions = self.cache.resolve_type_references(self.fs, None, &requests);
        let tasks = names
            .iter()
            .zip(resolutions)
            .map(|(name, resolution)| {
                Task::TypeReference(TypeReferenceTask {
                    name: name.clone(),
                    mode: None,
                    resolution,
                    reason: IncludeReason::AutomaticTypeDirective { name: name.clone() },
                    depth: 0,
                    span: None,
                })
            })
            .collect();
        self.schedule(tasks);
        self.drain()?;
        self.automatic_type_directive_names = names;
        Ok(())
    }

    fn process_default_libs(&mut self) -> KeelResult<()> {
        if self.input.root_names.is_empty() || self.skip_default_lib {
            return Ok(());
        }
        let lib_dir = self.input.lib_dir.clone();
        match self.input.options.lib.clone() {
            None => {
                let file = combine_paths(&lib_dir, default_lib_file_name(self.input.options.target));
                if let Some(task) = self.request_file(&file, IncludeReason::LibFile { index: None }, true, 0, None) {
                    self.stack.push(task);
                    self.drain()?;
                }
            }
            Some(libs) => {
                for (index, name) in libs.iter().enumerate() {
                    // Unknown names are reported by the option checks.
                    let Some(file) = lib_file_name(name) else { continue };
                    let file = combine_paths(&lib_dir, file);
                    let reason = IncludeReason::LibFile { index: Some(index) };
                    if let Some(task) = self.request_file(&file, reason, true, 0, None) {
                        self.stack.push(task);
                        self.drain()?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Pushes `tasks` so they run in the given order.
    fn schedule(&mut self, tasks: Vec<Task>) {
        self.stack.extend(tasks.into_iter().rev());
    }

    fn drain(&mut self) -> KeelResult<()> {
        while let Some(task) = self.stack.pop() {
            match task {
                Task::Visit(visit) => {
                    self.host.check_cancelled()?;
                    self.visit(visit)?;
                }
                Task::TypeReference(task) => self.type_reference(task),
                Task::Finish(path) => {
                    if let Some(entry) = self.entries.get(&path) {
                        if entry.is_default_lib {
                            self.libs.push(path);
                        } else {
                            self.others.push(path);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn supported_extensions(&self) -> Vec<Extension> {
        let options = &self.input.options;
        let mut exts = vec![
            Extension::Ts,
            Extension::Tsx,
            Extension::Dts,
            Extension::Cts,
            Extension::Dcts,
            Extension::Mts,
            Extension::Dmts,
        ];
        if options.allow_js {
            exts.extend([Extension::Js, Extension::Jsx, Extension::Cjs, Extension::Mjs]);
        }
        if options.resolve_json_module {
            exts.push(Extension::Json);
        }
        exts
    }

    /// Turns a file name written in a root list or directive into a visit,
    /// probing extensions for names without one.
    fn request_file(
        &mut self,
        file_name: &str,
        reason: IncludeReason,
        is_default_lib: bool,
        depth: u32,
        span: Option<Span>,
    ) -> Option<Task> {
        let file_name = normalize_path(file_name);
        let supported = self.supported_extensions();
        let visit = |file_name: String, reason: IncludeReason, span: Option<Span>| {
            Task::Visit(Visit {
                file_name,
                reason,
                is_default_lib,
                package_id: None,
                depth,
                span,
            })
        };
        if base_name(&file_name).contains('.') {
            return match Extension::of(&file_name) {
                Some(ext) if supported.contains(&ext) => Some(visit(file_name, reason, span)),
                _ => {
                    let names: Vec<&str> = supported.iter().map(|ext| ext.as_str()).collect();
                    self.diagnostics
                        .push(errors::error_unsupported_extension(&file_name, &names, span));
                    None
                }
            };
        }
        let candidates: Vec<String> = supported
            .iter()
            .map(|ext| format!("{file_name}{}", ext.as_str()))
            .collect();
        let found = candidates.iter().find(|candidate| {
            let path = self.canon.canonical(candidate);
            self.entries.contains_key(&path) || self.fs.file_exists(candidate)
        });
        match found {
            Some(candidate) => Some(visit(candidate.clone(), reason, span)),
            None => {
                for candidate in &candidates {
                    self.missing.insert(self.canon.canonical(candidate));
                }
                let first = self.canon.canonical(&candidates[0]);
                self.reasons.record_reason(&first, reason);
                self.diagnostics.push(errors::error_file_not_found(&file_name, span));
                None
            }
        }
    }

    fn visit(&mut self, visit: Visit) -> KeelResult<()> {
        let Visit {
            mut file_name,
            reason,
            is_default_lib,
            package_id,
            depth,
            span,
        } = visit;
        let mut path = self.canon.canonical(&file_name);

        if reason.referencing_unit().is_some() {
            if let Some(redirect) = self.source_outputs.get(&path).cloned() {
                let Some(output) = redirect.output else {
                    return Ok(());
                };
                if !self.fs.file_exists(&output) {
                    let output_path = self.canon.canonical(&output);
                    self.diagnostics
                        .push(errors::error_output_not_built(&output, &redirect.source, span));
                    self.missing.insert(output_path.clone());
                    self.reasons.record_reason(&output_path, reason);
                    return Ok(());
                }
                file_name = output;
                path = self.canon.canonical(&file_name);
            }
        }

        if self.entries.contains_key(&path) {
            self.revisit(&path, &file_name, reason, depth, span);
            return Ok(());
        }
        if self.missing.contains(&path) {
            self.reasons.record_reason(&path, reason);
            self.diagnostics.push(errors::error_file_not_found(&file_name, span));
            return Ok(());
        }

        let prefetched = self.reuse.and_then(|ctx| ctx.prefetched(&path, &file_name));
        let unit = match prefetched {
            Some(unit) => unit,
            None => {
                let request = UnitRequest {
                    file_name: file_name.clone(),
                    path: path.clone(),
                    implied_format: self.cache.implied_format(self.fs, &file_name),
                };
                match self.host.get_unit(&request) {
                    Ok(Some(unit)) => unit,
                    Ok(None) => {
                        self.missing.insert(path.clone());
                        self.reasons.record_reason(&path, reason);
                        self.diagnostics.push(errors::error_file_not_found(&file_name, span));
                        return Ok(());
                    }
                    Err(HostError::Cancelled(cancelled)) => return Err(cancelled),
                    Err(HostError::Io { message, .. }) => {
                        self.missing.insert(path.clone());
                        self.reasons.record_reason(&path, reason);
                        self.diagnostics
                            .push(errors::error_read_failed(&file_name, &message, span));
                        return Ok(());
                    }
                }
            }
        };

        if let Some(id) = package_id {
            let package_name = package_name_of(&id);
            if let Some(target) = self.package_targets.get(&id).cloned() {
                tracing::trace!(unit = %path, target = %target, package = %id, "redirecting to package target");
                self.redirect_targets.entry(target.clone()).or_default().push(path.clone());
                self.package_names.insert(path.clone(), package_name);
                self.reasons.record_reason(&path, reason);
                self.entries.insert(
                    path.clone(),
                    Entry {
                        unit,
                        redirect_to: Some(target),
                        is_default_lib: false,
                        found_in_packages: false,
                        elided_imports: false,
                    },
                );
                self.others.push(path);
                return Ok(());
            }
            self.package_targets.insert(id, path.clone());
            self.package_names.insert(path.clone(), package_name);
        }

        if self.canon.is_case_sensitive() {
            let folded = path.as_str().to_lowercase();
            match self.folded_names.get(&folded) {
                Some(existing) => {
                    self.diagnostics
                        .push(errors::error_casing_differs(&file_name, existing, span.clone()));
                }
                None => {
                    self.folded_names.insert(folded, file_name.clone());
                }
            }
        }

        if depth > 0 {
            self.external_paths.insert(path.clone());
        }
        if !is_default_lib && unit.flags.has_no_default_lib {
            self.skip_default_lib = true;
        }
        self.reasons.record_reason(&path, reason);
        self.entries.insert(
            path.clone(),
            Entry {
                unit: Arc::clone(&unit),
                redirect_to: None,
                is_default_lib,
                found_in_packages: depth > 0,
                elided_imports: false,
            },
        );
        self.stack.push(Task::Finish(path));
        self.expand(&unit, depth, is_default_lib, true);
        Ok(())
    }

    /// A path reached again: record the reason, check the spelling, and
    /// expand again if it is now reachable at a shallower depth.
    fn revisit(&mut self, path: &CanonicalPath, file_name: &str, reason: IncludeReason, depth: u32, span: Option<Span>) {
        self.reasons.record_reason(path, reason);
        let max_depth = self.input.options.max_package_depth;
        let Some(entry) = self.entries.get_mut(path) else {
            return;
        };
        if self.input.options.force_consistent_casing && entry.unit.file_name != file_name {
            let existing = entry.unit.file_name.clone();
            self.diagnostics
                .push(errors::error_casing_differs(file_name, &existing, span));
        }
        if entry.redirect_to.is_some() {
            return;
        }
        let unit = Arc::clone(&entry.unit);
        if entry.found_in_packages && depth == 0 {
            entry.found_in_packages = false;
            entry.elided_imports = false;
            let is_default_lib = entry.is_default_lib;
            self.external_paths.remove(path);
            self.expand(&unit, 0, is_default_lib, true);
        } else if entry.elided_imports && depth < max_depth {
            entry.elided_imports = false;
            let is_default_lib = entry.is_default_lib;
            self.expand(&unit, depth, is_default_lib, false);
        }
    }

    /// Schedules `unit`'s references. With `full` unset only imports are
    /// processed.
    fn expand(&mut self, unit: &Arc<CompilationUnit>, depth: u32, is_default_lib: bool, full: bool) {
        let resolutions = self.resolutions_for(unit);
        let from = unit.path.clone();
        let span_of = |range| Some(Span::at(from.clone(), range));
        let mut tasks = Vec::new();

        if full {
            if !self.input.options.no_resolve {
                let dir = directory_of(&unit.file_name).to_string();
                for (index, reference) in unit.referenced_files.iter().enumerate() {
                    let file = combine_paths(&dir, &reference.file_name);
                    let reason = IncludeReason::ReferenceFile {
                        from: from.clone(),
                        index,
                    };
                    if let Some(task) = self.request_file(&file, reason, is_default_lib, depth, span_of(reference.range)) {
                        tasks.push(task);
                    }
                }
                for (index, directive) in unit.type_reference_directives.iter().enumerate() {
                    let Some(resolution) = resolutions.type_references.get(index) else {
                        continue;
                    };
                    tasks.push(Task::TypeReference(TypeReferenceTask {
                        name: directive.file_name.to_lowercase(),
                        mode: unit.mode_for_reference(directive),
                        resolution: resolution.clone(),
                        reason: IncludeReason::TypeReferenceDirective {
                            from: from.clone(),
                            index,
                        },
                        depth,
                        span: span_of(directive.range),
                    }));
                }
            }
            if !self.input.options.no_lib {
                for (index, directive) in unit.lib_reference_directives.iter().enumerate() {
                    let span = span_of(directive.range);
                    match lib_file_name(&directive.file_name) {
                        Some(file) => {
                            let file = combine_paths(&self.input.lib_dir, file);
                            let reason = IncludeReason::LibReferenceDirective {
                                from: from.clone(),
                                index,
                            };
                            if let Some(task) = self.request_file(&file, reason, true, depth, span) {
                                tasks.push(task);
                            }
                        }
                        None => self.diagnostics.push(errors::error_unknown_lib(
                            &directive.file_name,
                            closest_lib_name(&directive.file_name),
                            span,
                        )),
                    }
                }
            }
        }

        let max_depth = self.input.options.max_package_depth;
        let mut elided = false;
        for (index, import) in unit.imports.iter().enumerate() {
            let Some(Some(Resolution::Resolved(module))) = resolutions.modules.get(index) else {
                continue;
            };
            let external = module.is_external_library_import;
            let child_depth = depth + u32::from(external);
            if external && module.extension.is_javascript() && child_depth > max_depth {
                elided = true;
                continue;
            }
            tasks.push(Task::Visit(Visit {
                file_name: module.file_name.clone(),
                reason: IncludeReason::Import {
                    from: from.clone(),
                    index,
                },
                is_default_lib: false,
                package_id: module.package_id.clone(),
                depth: child_depth,
                span: span_of(import.range),
            }));
        }
        if elided {
            if let Some(entry) = self.entries.get_mut(&from) {
                entry.elided_imports = true;
            }
        }
        self.schedule(tasks);
    }

    /// `unit`'s resolutions, computed once per build.
    ///
    /// In reuse mode an unchanged, non-invalidated unit whose previous
    /// resolutions are settled keeps them by pointer; any other unit goes
    /// through two-phase re-resolution.
    fn resolutions_for(&mut self, unit: &Arc<CompilationUnit>) -> Arc<UnitResolutions> {
        if let Some(known) = self.resolutions.get(&unit.path) {
            return Arc::clone(known);
        }
        let fs = self.fs;
        let no_resolve = self.input.options.no_resolve;
        let reuse = self.reuse;
        let path = &unit.path;

        let reusable = reuse.and_then(|ctx| {
            let unchanged = ctx.old.get_unit(path).is_some_and(|old| Arc::ptr_eq(old, unit))
                && !ctx.decision.queued.contains(path);
            ctx.old.resolutions(path).filter(|_| unchanged)
        });
        let trust_ambient = reuse.is_some_and(|ctx| ctx.trust_ambient);
        if let Some(previous) =
            reusable.filter(|previous| previous.settled() && (trust_ambient || !previous.has_ambient()))
        {
            let previous = Arc::clone(previous);
            self.resolutions.insert(path.clone(), Arc::clone(&previous));
            return previous;
        }
        if reuse.is_some() {
            self.reresolved.push(path.clone());
        }

        let was_ambient = |name: &str| reuse.is_some_and(|ctx| ctx.was_ambient(path, name));
        let prior = PriorState {
            reusable_modules: reusable.map(|previous| previous.modules.as_slice()),
            reusable_type_references: reusable.map(|previous| previous.type_references.as_slice()),
            ambient_in_unmodified_file: &was_ambient,
        };
        let cache = &mut self.cache;
        let modules = reresolve_modules(unit, &prior, |batch| {
            cache.resolve_module_names(fs, &unit.file_name, batch)
        });
        let type_references = if no_resolve {
            vec![
                TypeReferenceResolution::Unresolved(UnresolvedReason::ResolutionDisabled);
                unit.type_reference_directives.len()
            ]
        } else {
            reresolve_type_references(unit, &prior, |batch| {
                cache.resolve_type_references(fs, Some(&unit.file_name), batch)
            })
        };
        let computed = Arc::new(UnitResolutions {
            modules,
            type_references,
        });
        self.resolutions.insert(path.clone(), Arc::clone(&computed));
        computed
    }

    fn type_reference(&mut self, task: TypeReferenceTask) {
        let TypeReferenceTask {
            name,
            mode,
            resolution,
            reason,
            depth,
            span,
        } = task;
        let key = (name, mode);
        let previous = self.type_directives.get(&key).cloned();
        if previous
            .as_ref()
            .and_then(TypeReferenceResolution::resolved)
            .is_some_and(|previous| previous.primary)
        {
            return;
        }
        let mut save = true;
        match resolution.resolved() {
            Some(resolved) => {
                let visit = Task::Visit(Visit {
                    file_name: resolved.file_name.clone(),
                    reason,
                    is_default_lib: false,
                    package_id: resolved.package_id.clone(),
                    depth: depth + u32::from(resolved.is_external_library_import),
                    span: span.clone(),
                });
                let previous = previous.as_ref().and_then(TypeReferenceResolution::resolved);
                match previous {
                    Some(previous) if !resolved.primary => {
                        if previous.resolved_path != resolved.resolved_path {
                            let existing = self.entries.get(&previous.resolved_path).map(|e| e.unit.text.as_str());
                            let other = self.fs.read_file(&resolved.file_name).ok().flatten();
                            if other.as_deref() != existing {
                                self.diagnostics.push(errors::error_conflicting_type_definitions(
                                    &key.0,
                                    &previous.file_name,
                                    &resolved.file_name,
                                    span,
                                ));
                            }
                        }
                        save = false;
                    }
                    _ => self.stack.push(visit),
                }
            }
            None => {
                self.diagnostics
                    .push(errors::error_cannot_find_type_definition(&key.0, span));
            }
        }
        if save {
            self.type_directives.insert(key, resolution);
        }
    }

    /// Orders the units, normalizes and compares resolutions, and produces
    /// the graph with its file-processing and option diagnostics.
    fn finish(mut self, mut report: ReuseReport) -> ProgramGraph {
        let lib_names = requested_lib_names(&self.input.options);
        let lib_dir = self.input.lib_dir.clone();
        let entries = &self.entries;
        self.libs.sort_by_key(|path| {
            let file_name = entries.get(path).map_or(path.as_str(), |entry| entry.unit.file_name.as_str());
            lib_priority(file_name, &lib_dir, &lib_names)
        });
        let lib_count = self.libs.len();

        let mut seen = HashSet::new();
        let mut order = Vec::with_capacity(self.libs.len() + self.others.len());
        for path in self.libs.iter().chain(&self.others) {
            if seen.insert(path.clone()) {
                order.push(path.clone());
            } else {
                self.diagnostics.push(errors::error_duplicate_path(path.as_str(), None, None));
            }
        }
        let positions: HashMap<&CanonicalPath, u32> = order
            .iter()
            .enumerate()
            .map(|(index, path)| (path, index as u32))
            .collect();
        let mut arena = UnitArena::new();
        for path in &order {
            let Some(entry) = self.entries.get(path) else { continue };
            let slot = match &entry.redirect_to {
                None => UnitSlot::Source(Arc::clone(&entry.unit)),
                Some(target) => match positions.get(target) {
                    Some(&index) => UnitSlot::Redirect(Redirect {
                        file_name: entry.unit.file_name.clone(),
                        path: path.clone(),
                        target: UnitId::from_raw(index),
                        unredirected: Arc::clone(&entry.unit),
                    }),
                    None => UnitSlot::Source(Arc::clone(&entry.unit)),
                },
            };
            if let Err(duplicate) = arena.insert(slot) {
                self.diagnostics
                    .push(errors::error_duplicate_path(duplicate.path.as_str(), None, None));
            }
        }

        let ambient = declared_ambient_modules(&self.entries);
        for (path, resolutions) in self.resolutions.iter_mut() {
            let Some(entry) = self.entries.get(path) else { continue };
            let imports = &entry.unit.imports;
            let declared_ambient = |index: usize, module: &Option<Resolution>| {
                matches!(module, Some(Resolution::Unresolved(UnresolvedReason::NotFound)))
                    && imports.get(index).is_some_and(|import| ambient.contains(import.text.as_str()))
            };
            if resolutions.modules.iter().enumerate().any(|(i, m)| declared_ambient(i, m)) {
                let mut normalized = (**resolutions).clone();
                for (index, module) in normalized.modules.iter_mut().enumerate() {
                    if declared_ambient(index, &*module) {
                        *module = None;
                    }
                }
                *resolutions = Arc::new(normalized);
            }
        }

        if let Some(ctx) = self.reuse {
            for (path, resolutions) in self.resolutions.iter_mut() {
                let Some(previous) = ctx.old.resolutions(path) else { continue };
                if Arc::ptr_eq(previous, resolutions) {
                    continue;
                }
                if **previous == **resolutions {
                    *resolutions = Arc::clone(previous);
                } else {
                    report.changed_resolutions.push(path.clone());
                }
            }
        }
        report.changed_resolutions.sort();
        self.reresolved.sort();
        report.reresolved = std::mem::take(&mut self.reresolved);

        for (_, slot) in arena.iter() {
            let UnitSlot::Source(unit) = slot else { continue };
            let Some(resolutions) = self.resolutions.get(&unit.path) else { continue };
            for (import, module) in unit.imports.iter().zip(&resolutions.modules) {
                let Some(Resolution::Unresolved(reason)) = module else { continue };
                let span = Span::at(unit.path.clone(), import.range);
                match reason {
                    UnresolvedReason::NotFound => {
                        self.diagnostics.push(errors::error_cannot_find_module(&import.text, span));
                    }
                    UnresolvedReason::DisallowedExtension(ext) => self
                        .diagnostics
                        .push(errors::error_disallowed_extension(&import.text, ext.as_str(), span)),
                    UnresolvedReason::HostFailure(message) => self.diagnostics.push(
                        errors::error_resolution_host_failure(&import.text, message, span),
                    ),
                    UnresolvedReason::ResolutionDisabled => {}
                }
            }
        }
        for error in self.cache.take_host_errors() {
            if let HostError::Io { path, message } = error {
                self.diagnostics.push(errors::error_read_failed(&path, &message, None));
            }
        }

        let BuildInput {
            root_names,
            options,
            project_dir,
            lib_dir,
            references,
            reference_diagnostics,
        } = self.input;
        let mut graph = ProgramGraph {
            root_names,
            options,
            project_dir,
            lib_dir,
            canon: self.canon,
            arena,
            lib_count,
            missing: self.missing,
            reasons: self.reasons,
            resolutions: self.resolutions,
            type_reference_directives: self.type_directives,
            automatic_type_directive_names: self.automatic_type_directive_names,
            redirect_targets: self.redirect_targets,
            package_names: self.package_names,
            external_paths: self.external_paths,
            project_references: references,
            cache: self.cache,
            file_diagnostics: self.diagnostics,
            option_diagnostics: Vec::new(),
            store: DiagnosticsStore::new(),
            reuse: report,
        };
        graph.option_diagnostics = validate_options(&graph, reference_diagnostics);
        graph
    }
}

/// Option diagnostics for `graph`, after any diagnostics raised while
/// loading project references.
pub(crate) fn validate_options(graph: &ProgramGraph, mut reference_diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
    let root_paths: HashSet<CanonicalPath> = graph
        .root_names
        .iter()
        .map(|name| graph.canon.canonical(&combine_paths(&graph.project_dir, name)))
        .collect();
    let units = graph
        .arena
        .iter()
        .skip(graph.lib_count)
        .filter_map(|(_, slot)| match slot {
            UnitSlot::Source(unit) => Some(unit),
            UnitSlot::Redirect(_) => None,
        })
        .collect();
    reference_diagnostics.extend(check_options(&CheckInput {
        options: &graph.options,
        project_dir: &graph.project_dir,
        canon: graph.canon,
        root_paths: &root_paths,
        units,
        external_paths: &graph.external_paths,
        references: &graph.project_references,
    }));
    reference_diagnostics
}

/// `lib` option entries as the names their files carry, for ordering.
fn requested_lib_names(options: &CompilerOptions) -> Vec<String> {
    options
        .lib
        .iter()
        .flatten()
        .filter_map(|name| lib_file_name(name))
        .map(|file| {
            file.strip_prefix("lib.")
                .and_then(|rest| rest.strip_suffix(".d.ts"))
                .unwrap_or(file)
                .to_string()
        })
        .collect()
}

/// The name a package is known by across generations.
fn package_name_of(id: &PackageId) -> String {
    if id.sub_module_name.is_empty() {
        id.name.clone()
    } else {
        format!("{}/{}", id.name, id.sub_module_name)
    }
}

/// Module names declared ambient by the discovered, non-redirect units.
fn declared_ambient_modules(entries: &HashMap<CanonicalPath, Entry>) -> HashSet<&str> {
    entries
        .values()
        .filter(|entry| entry.redirect_to.is_none())
        .flat_map(|entry| entry.unit.ambient_modules.iter().map(String::as_str))
        .collect()
}
