//! Canonical paths used as identity keys for compilation units and caches.
//!
//! Every lookup table in the engine is keyed by [`CanonicalPath`]: a
//! `/`-separated absolute path with `.` and `..` collapsed and, on
//! case-insensitive hosts, folded to lower case. The original spelling a user
//! wrote is kept separately by callers that need it for messages.

use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// A normalized path used as an identity key.
///
/// Cloning is cheap: the text is shared.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalPath(Arc<str>);

impl CanonicalPath {
    /// Returns the path text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the final path component (`"b.ts"` for `/a/b.ts`).
    pub fn file_name(&self) -> &str {
        base_name(&self.0)
    }

    /// Returns the containing directory, or `None` for a filesystem root.
    pub fn parent(&self) -> Option<CanonicalPath> {
        let dir = directory_of(&self.0);
        if dir.is_empty() || dir == &*self.0 {
            None
        } else {
            Some(CanonicalPath(Arc::from(dir)))
        }
    }

    /// Iterates over this path and each of its ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = CanonicalPath> {
        std::iter::successors(Some(self.clone()), |p| p.parent())
    }

    /// Returns `true` if `self` equals `dir` or lies beneath it.
    pub fn is_under(&self, dir: &CanonicalPath) -> bool {
        self.relative_to(dir).is_some()
    }

    /// Returns the part of `self` below `dir`, or `None` if `self` is not
    /// inside `dir`. Returns an empty string when the paths are equal.
    pub fn relative_to(&self, dir: &CanonicalPath) -> Option<&str> {
        let rest = self.0.strip_prefix(&*dir.0)?;
        if rest.is_empty() {
            Some(rest)
        } else if dir.0.ends_with('/') {
            Some(rest)
        } else {
            rest.strip_prefix('/')
        }
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl AsRef<str> for CanonicalPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for CanonicalPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Produces [`CanonicalPath`]s according to the host's case sensitivity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Canonicalizer {
    case_sensitive: bool,
}

impl Canonicalizer {
    /// Creates a canonicalizer for a host with the given case sensitivity.
    pub fn new(case_sensitive: bool) -> Self {
        Self { case_sensitive }
    }

    /// Returns `true` if paths that differ only in case are distinct files.
    pub fn is_case_sensitive(self) -> bool {
        self.case_sensitive
    }

    /// Normalizes `path` and folds case when the host is case-insensitive.
    pub fn canonical(self, path: &str) -> CanonicalPath {
        let normalized = normalize_path(path);
        if self.case_sensitive {
            CanonicalPath(Arc::from(normalized))
        } else {
            CanonicalPath(Arc::from(normalized.to_lowercase()))
        }
    }

    /// Joins `relative` onto `base` and canonicalizes the result.
    pub fn join(self, base: &CanonicalPath, relative: &str) -> CanonicalPath {
        self.canonical(&combine_paths(base.as_str(), relative))
    }
}

/// Returns `true` for paths starting at a filesystem root (`/x` or `c:/x`).
pub fn is_rooted(path: &str) -> bool {
    path.starts_with('/') || path.starts_with('\\') || drive_prefix_len(path) > 0
}

/// Normalizes separators and collapses `.` and `..` components.
///
/// `..` never climbs above a root; in relative paths leading `..` components
/// are preserved.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let (root, rest) = if let Some(rest) = path.strip_prefix('/') {
        ("/".to_string(), rest)
    } else if drive_prefix_len(&path) > 0 {
        let (drive, rest) = path.split_at(2);
        (format!("{drive}/"), rest.trim_start_matches('/'))
    } else {
        (String::new(), path.as_str())
    };

    let mut parts: Vec<&str> = Vec::new();
    for component in rest.split('/') {
        match component {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if root.is_empty() => parts.push(".."),
                _ => {}
            },
            other => parts.push(other),
        }
    }
    format!("{root}{}", parts.join("/"))
}

/// Joins `relative` onto `base`; rooted `relative` paths replace `base`.
pub fn combine_paths(base: &str, relative: &str) -> String {
    if base.is_empty() || is_rooted(relative) {
        normalize_path(relative)
    } else {
        normalize_path(&format!("{base}/{relative}"))
    }
}

/// Returns the directory part of a normalized path.
pub fn directory_of(path: &str) -> &str {
    match path.rfind('/') {
        None => "",
        Some(0) => "/",
        Some(idx) if idx == 2 && drive_prefix_len(path) > 0 => &path[..3],
        Some(idx) => &path[..idx],
    }
}

/// Returns the last component of a normalized path.
pub fn base_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

fn drive_prefix_len(path: &str) -> usize {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        2
    } else {
        0
    }
}
