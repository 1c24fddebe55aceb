//! Compiler options and `keel.toml` project configuration.
//!
//! This crate reads the project configuration file into a strongly-typed
//! [`ProjectConfig`] and classifies option differences between two program
//! generations by what they invalidate (see [`affects`]).

#![warn(missing_docs)]

pub mod affects;
pub mod error;
pub mod loader;
pub mod types;

pub use affects::{diff_options, OptionChange, OptionEffect};
pub use error::{ConfigError, ReferenceProblem};
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
