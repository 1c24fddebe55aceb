//! Module and type-reference resolution with a per-generation cache.
//!
//! This crate provides the [`FileSystem`] collaborator contract with real and
//! in-memory implementations, the node-style [`Resolver`], package-manifest
//! scopes, and the [`ResolutionCache`] that memoizes resolutions by
//! containing directory, specifier and resolution mode.

#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod fs;
pub mod package;
pub mod resolution;
pub mod resolver;

pub use cache::{CacheStats, ResolutionCache};
pub use error::HostError;
pub use fs::{FileSystem, MemoryFileSystem, OsFileSystem};
pub use package::{PackageManifest, PackageScope, PackageScopes};
pub use resolution::{
    PackageId, Resolution, ResolvedModule, ResolvedTypeReference, TypeReferenceResolution,
    UnresolvedReason,
};
pub use resolver::Resolver;
