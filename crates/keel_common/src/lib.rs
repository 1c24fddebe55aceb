//! Shared foundational types used across the keel program-construction engine.
//!
//! This crate provides content hashing for compilation-unit version tokens,
//! canonical path handling, and the cancellation signal that is the only
//! error allowed to unwind out of program construction.

#![warn(missing_docs)]

pub mod cancel;
pub mod hash;
pub mod path;

pub use cancel::{CancellationToken, Cancelled, KeelResult};
pub use hash::ContentHash;
pub use path::{CanonicalPath, Canonicalizer};
