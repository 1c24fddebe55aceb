//! Error types for configuration loading and validation.

/// Errors that can occur when loading or validating a `keel.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A required field is missing from the configuration.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A `[[references]]` entry cannot name a referenced project.
    #[error("invalid project reference `{path}` (references[{index}]): {problem}")]
    InvalidReference {
        /// Position in the `[[references]]` list.
        index: usize,
        /// The path as written.
        path: String,
        /// What is wrong with it.
        problem: ReferenceProblem,
    },
}

/// Why a `[[references]]` path was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceProblem {
    /// The path is empty.
    #[error("path is empty")]
    Empty,
    /// The path names the referencing project's own directory or file.
    #[error("a project cannot reference itself")]
    SelfReference,
}
