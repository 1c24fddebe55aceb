//! The filesystem collaborator: synchronous existence checks, reads and
//! directory listings over normalized `/`-separated paths.

use crate::error::HostError;
use keel_common::path::normalize_path;
use keel_common::Canonicalizer;
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;

/// Synchronous access to source files.
///
/// Paths are absolute and normalized with `/` separators. A missing file is
/// `Ok(None)` from [`read_file`](Self::read_file); only genuine faults are
/// errors.
pub trait FileSystem {
    /// Returns `true` if `path` names an existing file.
    fn file_exists(&self, path: &str) -> bool;

    /// Returns `true` if `path` names an existing directory.
    fn directory_exists(&self, path: &str) -> bool;

    /// Reads a file's text, or `Ok(None)` if it does not exist.
    fn read_file(&self, path: &str) -> Result<Option<String>, HostError>;

    /// Returns the names of the immediate subdirectories of `path`, sorted.
    fn list_directory(&self, path: &str) -> Vec<String>;

    /// Returns the path with symlinks resolved.
    fn real_path(&self, path: &str) -> String {
        path.to_string()
    }

    /// Returns `true` if names differing only in case are distinct files.
    fn use_case_sensitive_file_names(&self) -> bool;

    /// The directory relative names are resolved against.
    fn current_directory(&self) -> String;

    /// A canonicalizer matching this filesystem's case sensitivity.
    fn canonicalizer(&self) -> Canonicalizer {
        Canonicalizer::new(self.use_case_sensitive_file_names())
    }
}

/// The real filesystem.
#[derive(Debug, Clone)]
pub struct OsFileSystem {
    case_sensitive: bool,
    current_directory: String,
}

impl OsFileSystem {
    /// Creates a filesystem rooted at the process working directory.
    pub fn new() -> Self {
        let cwd = std::env::current_dir()
            .map(|p| normalize_path(&p.to_string_lossy()))
            .unwrap_or_else(|_| "/".to_string());
        Self::with_current_directory(cwd)
    }

    /// Creates a filesystem resolving relative names against `cwd`.
    pub fn with_current_directory(cwd: impl Into<String>) -> Self {
        Self {
            case_sensitive: !cfg!(any(target_os = "windows", target_os = "macos")),
            current_directory: normalize_path(&cwd.into()),
        }
    }
}

impl Default for OsFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for OsFileSystem {
    fn file_exists(&self, path: &str) -> bool {
        std::path::Path::new(path).is_file()
    }

    fn directory_exists(&self, path: &str) -> bool {
        std::path::Path::new(path).is_dir()
    }

    fn read_file(&self, path: &str) -> Result<Option<String>, HostError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HostError::io(path, e.to_string())),
        }
    }

    fn list_directory(&self, path: &str) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(path) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn real_path(&self, path: &str) -> String {
        std::fs::canonicalize(path)
            .map(|p| normalize_path(&p.to_string_lossy()))
            .unwrap_or_else(|_| path.to_string())
    }

    fn use_case_sensitive_file_names(&self) -> bool {
        self.case_sensitive
    }

    fn current_directory(&self) -> String {
        self.current_directory.clone()
    }
}

/// An in-memory filesystem for tests and editor hosts.
///
/// Directories exist implicitly as ancestors of files.
#[derive(Debug, Clone)]
pub struct MemoryFileSystem {
    canon: Canonicalizer,
    current_directory: String,
    files: BTreeMap<String, String>,
    failing: BTreeSet<String>,
}

impl MemoryFileSystem {
    /// Creates an empty filesystem with `/` as the working directory.
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            canon: Canonicalizer::new(case_sensitive),
            current_directory: "/".to_string(),
            files: BTreeMap::new(),
            failing: BTreeSet::new(),
        }
    }

    /// Adds a file, builder style.
    pub fn with_file(mut self, path: &str, text: &str) -> Self {
        self.write(path, text);
        self
    }

    /// Sets the working directory, builder style.
    pub fn with_current_directory(mut self, cwd: &str) -> Self {
        self.current_directory = normalize_path(cwd);
        self
    }

    /// Creates or replaces a file.
    pub fn write(&mut self, path: &str, text: &str) {
        self.files.insert(self.key(path), text.to_string());
    }

    /// Deletes a file. Returns `true` if it existed.
    pub fn remove(&mut self, path: &str) -> bool {
        self.files.remove(&self.key(path)).is_some()
    }

    /// Makes reads of `path` fail with an I/O error.
    pub fn fail_reads(&mut self, path: &str) {
        self.failing.insert(self.key(path));
    }

    fn key(&self, path: &str) -> String {
        self.canon.canonical(path).as_str().to_string()
    }
}

impl FileSystem for MemoryFileSystem {
    fn file_exists(&self, path: &str) -> bool {
        self.files.contains_key(&self.key(path))
    }

    fn directory_exists(&self, path: &str) -> bool {
        let dir = self.key(path);
        let prefix = if dir.ends_with('/') { dir } else { format!("{dir}/") };
        self.files
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(k, _)| k.starts_with(&prefix))
    }

    fn read_file(&self, path: &str) -> Result<Option<String>, HostError> {
        let key = self.key(path);
        if self.failing.contains(&key) {
            return Err(HostError::io(path, "simulated read failure"));
        }
        Ok(self.files.get(&key).cloned())
    }

    fn list_directory(&self, path: &str) -> Vec<String> {
        let dir = self.key(path);
        let prefix = if dir.ends_with('/') { dir } else { format!("{dir}/") };
        let mut names = BTreeSet::new();
        for key in self.files.keys().filter(|k| k.starts_with(&prefix)) {
            let rest = &key[prefix.len()..];
            if let Some((child, _)) = rest.split_once('/') {
                names.insert(child.to_string());
            }
        }
        names.into_iter().collect()
    }

    fn use_case_sensitive_file_names(&self) -> bool {
        self.canon.is_case_sensitive()
    }

    fn current_directory(&self) -> String {
        self.current_directory.clone()
    }
}
