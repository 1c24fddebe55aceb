//! Configuration file loading and validation.

use crate::error::{ConfigError, ReferenceProblem};
use crate::types::ProjectConfig;
use std::path::Path;

/// The configuration file looked up in a project directory.
pub const CONFIG_FILE_NAME: &str = "keel.toml";

/// Loads and validates a `keel.toml` configuration from a project directory.
///
/// Reads `<project_dir>/keel.toml`, parses it, and validates required fields.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE_NAME);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `keel.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies, and for hosts that
/// read referenced project configurations through their own filesystem.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that required fields are present.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.project.files.is_empty() && config.references.is_empty() {
        return Err(ConfigError::MissingField("project.files".to_string()));
    }
    for (index, reference) in config.references.iter().enumerate() {
        if let Some(problem) = reference_problem(&reference.path) {
            return Err(ConfigError::InvalidReference {
                index,
                path: reference.path.clone(),
                problem,
            });
        }
    }
    Ok(())
}

/// Checks a `[[references]]` path, which names a project directory or its
/// configuration file.
fn reference_problem(path: &str) -> Option<ReferenceProblem> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Some(ReferenceProblem::Empty);
    }
    let parts = trimmed
        .split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>();
    match parts.as_slice() {
        [] | [CONFIG_FILE_NAME] => Some(ReferenceProblem::SelfReference),
        _ => None,
    }
}
