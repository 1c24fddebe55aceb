//! Outcomes of module and type-reference resolution.

use keel_common::CanonicalPath;
use keel_source::Extension;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Identity of a published package version.
///
/// Two files with equal `PackageId`s are the same module even when they live
/// at different paths (a package installed twice), which is what redirects
/// are built on.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize)]
pub struct PackageId {
    /// The package name from its manifest.
    pub name: String,
    /// The resolved file's path inside the package.
    pub sub_module_name: String,
    /// The package version from its manifest.
    pub version: String,
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.name, self.sub_module_name, self.version)
    }
}

/// A module specifier mapped to a file.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct ResolvedModule {
    /// Canonical path of the target file.
    pub resolved_path: CanonicalPath,
    /// The target's file name as found on disk.
    pub file_name: String,
    /// The target's extension.
    pub extension: Extension,
    /// The package the target belongs to, when its manifest names one.
    pub package_id: Option<PackageId>,
    /// The target was found by searching package directories.
    pub is_external_library_import: bool,
}

/// Why a specifier has no target.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize)]
pub enum UnresolvedReason {
    /// No candidate file exists.
    NotFound,
    /// A file was found but its kind is not enabled by the options.
    DisallowedExtension(Extension),
    /// Resolution is turned off.
    ResolutionDisabled,
    /// Looking for the target failed with an I/O error.
    HostFailure(String),
}

/// The outcome of resolving one module specifier.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize)]
pub enum Resolution {
    /// The specifier maps to a file.
    Resolved(Arc<ResolvedModule>),
    /// The specifier has no usable target.
    Unresolved(UnresolvedReason),
}

impl Resolution {
    /// Returns the target, if resolved.
    pub fn resolved(&self) -> Option<&Arc<ResolvedModule>> {
        match self {
            Resolution::Resolved(module) => Some(module),
            Resolution::Unresolved(_) => None,
        }
    }

    /// Returns `true` if the specifier resolved.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

/// A type-reference directive mapped to a declaration file.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct ResolvedTypeReference {
    /// Canonical path of the declaration file.
    pub resolved_path: CanonicalPath,
    /// The declaration file's name as found on disk.
    pub file_name: String,
    /// Found in a type root rather than by a `node_modules` search.
    pub primary: bool,
    /// The package the file belongs to, when its manifest names one.
    pub package_id: Option<PackageId>,
    /// Found by searching package directories.
    pub is_external_library_import: bool,
}

/// The outcome of resolving one type-reference directive.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize)]
pub enum TypeReferenceResolution {
    /// The name maps to a declaration file.
    Resolved(Arc<ResolvedTypeReference>),
    /// The name has no usable target.
    Unresolved(UnresolvedReason),
}

impl TypeReferenceResolution {
    /// Returns the target, if resolved.
    pub fn resolved(&self) -> Option<&Arc<ResolvedTypeReference>> {
        match self {
            TypeReferenceResolution::Resolved(r) => Some(r),
            TypeReferenceResolution::Unresolved(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_common::Canonicalizer;

    fn module(path: &str) -> Arc<ResolvedModule> {
        Arc::new(ResolvedModule {
            resolved_path: Canonicalizer::new(true).canonical(path),
            file_name: path.to_string(),
            extension: Extension::Ts,
            package_id: None,
            is_external_library_import: false,
        })
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(
            Resolution::Resolved(module("/a.ts")),
            Resolution::Resolved(module("/a.ts"))
        );
        assert_ne!(
            Resolution::Resolved(module("/a.ts")),
            Resolution::Unresolved(UnresolvedReason::NotFound)
        );
    }

    #[test]
    fn package_id_display() {
        let id = PackageId {
            name: "lodash".into(),
            sub_module_name: "index.d.ts".into(),
            version: "4.17.21".into(),
        };
        assert_eq!(id.to_string(), "lodash/index.d.ts@4.17.21");
    }

    #[test]
    fn accessors() {
        let r = Resolution::Resolved(module("/a.ts"));
        assert!(r.is_resolved());
        assert_eq!(r.resolved().unwrap().file_name, "/a.ts");
        assert!(Resolution::Unresolved(UnresolvedReason::ResolutionDisabled)
            .resolved()
            .is_none());
    }
}
