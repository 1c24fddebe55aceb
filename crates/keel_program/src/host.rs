//! Collaborators consulted while a program is built: the compiler host
//! (parse and filesystem access) and the change oracle of a watch layer.

use keel_common::{CanonicalPath, CancellationToken, Cancelled, KeelResult};
use keel_resolve::{FileSystem, HostError};
use keel_source::{CompilationUnit, ModuleFormat};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A request for one compilation unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitRequest {
    /// The name the unit is requested by.
    pub file_name: String,
    /// Its canonical path.
    pub path: CanonicalPath,
    /// The module format the unit is interpreted under.
    pub implied_format: Option<ModuleFormat>,
}

/// The parse and filesystem collaborator.
///
/// [`get_unit`](Self::get_unit) must be deterministic, and must return the
/// same `Arc` for unchanged content so reuse can compare by pointer.
pub trait CompilerHost {
    /// The filesystem resolutions run against.
    fn file_system(&self) -> &dyn FileSystem;

    /// Produces the unit for `request`, or `Ok(None)` if the file does not
    /// exist.
    fn get_unit(&self, request: &UnitRequest) -> Result<Option<Arc<CompilationUnit>>, HostError>;

    /// Directory holding the library declaration files.
    fn default_lib_location(&self) -> String;

    /// Fails once the caller has asked to stop.
    fn check_cancelled(&self) -> KeelResult<()> {
        Ok(())
    }

    /// Include referenced projects' sources instead of their declaration
    /// outputs.
    fn use_source_of_project_reference_redirect(&self) -> bool {
        false
    }
}

/// Watch-layer knowledge the host has that file contents do not show.
pub trait ChangeOracle {
    /// Returns `true` if resolutions made from `path` may be stale even if
    /// its content did not change.
    fn has_invalidated_resolutions(&self, path: &CanonicalPath) -> bool;

    /// Returns `true` if the set of automatically included type packages
    /// may have changed.
    fn has_changed_automatic_type_directive_names(&self) -> bool {
        false
    }
}

/// An oracle reporting nothing invalidated.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoChanges;

impl ChangeOracle for NoChanges {
    fn has_invalidated_resolutions(&self, _path: &CanonicalPath) -> bool {
        false
    }
}

/// An oracle backed by explicit sets.
#[derive(Clone, Debug, Default)]
pub struct InvalidatedPaths {
    paths: HashSet<CanonicalPath>,
    type_directives_changed: bool,
}

impl InvalidatedPaths {
    /// Creates an empty oracle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `path`'s resolutions as stale.
    pub fn invalidate(&mut self, path: CanonicalPath) {
        self.paths.insert(path);
    }

    /// Marks the automatic type packages as changed.
    pub fn invalidate_type_directives(&mut self) {
        self.type_directives_changed = true;
    }
}

impl ChangeOracle for InvalidatedPaths {
    fn has_invalidated_resolutions(&self, path: &CanonicalPath) -> bool {
        self.paths.contains(path)
    }

    fn has_changed_automatic_type_directive_names(&self) -> bool {
        self.type_directives_changed
    }
}

/// A host that reads files through a [`FileSystem`] and builds units with
/// the directive scanner.
///
/// Units are cached by path: a request whose text, name and format match
/// the cached unit gets the cached `Arc` back.
pub struct SourceHost<F> {
    fs: F,
    lib_dir: String,
    units: RefCell<HashMap<CanonicalPath, Arc<CompilationUnit>>>,
    cancellation: CancellationToken,
    prefer_project_sources: bool,
}

impl<F: FileSystem> SourceHost<F> {
    /// Creates a host over `fs` with library files in `lib_dir`.
    pub fn new(fs: F, lib_dir: impl Into<String>) -> Self {
        Self {
            fs,
            lib_dir: lib_dir.into(),
            units: RefCell::new(HashMap::new()),
            cancellation: CancellationToken::new(),
            prefer_project_sources: false,
        }
    }

    /// Uses `token` to observe cancellation.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Includes referenced projects' sources instead of their outputs.
    pub fn prefer_project_sources(mut self, prefer: bool) -> Self {
        self.prefer_project_sources = prefer;
        self
    }

    /// The underlying filesystem.
    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Mutable access to the underlying filesystem, for editors and tests.
    pub fn fs_mut(&mut self) -> &mut F {
        &mut self.fs
    }

    /// The cancellation token this host observes.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Number of units held in the unit cache.
    pub fn cached_units(&self) -> usize {
        self.units.borrow().len()
    }
}

impl<F: FileSystem> CompilerHost for SourceHost<F> {
    fn file_system(&self) -> &dyn FileSystem {
        &self.fs
    }

    fn get_unit(&self, request: &UnitRequest) -> Result<Option<Arc<CompilationUnit>>, HostError> {
        if self.cancellation.is_cancelled() {
            return Err(HostError::Cancelled(Cancelled));
        }
        let Some(text) = self.fs.read_file(&request.file_name)? else {
            self.units.borrow_mut().remove(&request.path);
            return Ok(None);
        };
        let version = keel_common::ContentHash::of_text(&text);
        if let Some(cached) = self.units.borrow().get(&request.path) {
            if cached.version == version
                && cached.file_name == request.file_name
                && cached.implied_format == request.implied_format
            {
                return Ok(Some(Arc::clone(cached)));
            }
        }
        let real = self.fs.real_path(&request.file_name);
        let unit = CompilationUnit::new(
            request.file_name.clone(),
            request.path.clone(),
            text,
            request.implied_format,
        )
        .with_resolved_path(self.fs.canonicalizer().canonical(&real));
        let unit = Arc::new(unit);
        self.units
            .borrow_mut()
            .insert(request.path.clone(), Arc::clone(&unit));
        Ok(Some(unit))
    }

    fn default_lib_location(&self) -> String {
        self.lib_dir.clone()
    }

    fn check_cancelled(&self) -> KeelResult<()> {
        self.cancellation.check()
    }

    fn use_source_of_project_reference_redirect(&self) -> bool {
        self.prefer_project_sources
    }
}
