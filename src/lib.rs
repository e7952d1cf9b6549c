//! Composable command-line interfaces with dependency-based plugin discovery
//!
//! A [`FlexCli`] owns a tree of commands. Host applications register commands
//! through [`CommandFactory`] values, and packages declared as dependencies of
//! the project contribute more: every dependency whose name matches the
//! configured `include` patterns (and not `exclude`) is located on disk, and the
//! command files in its `cli` directory are loaded. Matched dependencies of
//! matched dependencies are scanned the same way.

use std::path::Path;

use log::debug;

pub mod command;
pub mod config_file;
pub mod discovery;
pub mod events;
pub mod help;
pub mod loader;
pub mod logger;
pub mod manifest;
pub mod patterns;
pub mod prompt;
pub mod registry;
pub mod resolver;
pub mod theme;

pub use command::{ActionError, Command, CommandFactory, FactoryOutput, Invocation};
pub use config_file::{CliConfig, ConfigError, RuntimeContext};
pub use events::RegistrationEvent;
pub use help::{HelpPosition, Indent};
pub use patterns::{Pattern, PatternSet};
pub use registry::{FlexCli, FlexCliBuilder, RunError};

/// Load configuration from a file (or the nearest one above the working directory).
///
/// # Errors
///
/// Returns `ConfigError` if an explicit file does not exist, or if the file
/// found cannot be parsed.
pub fn load_config(
    config_file: Option<&Path>,
    context: &RuntimeContext,
) -> Result<CliConfig, ConfigError> {
    match config_file {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
            }
            debug!("Loading config from {}", path.display());
            CliConfig::from_file(path)
        }
        None => CliConfig::discover(&context.cwd),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RuntimeContext::new(dir.path(), vec![]);
        let missing = dir.path().join("nope.yaml");
        match load_config(Some(&missing), &ctx) {
            Err(ConfigError::ConfigNotFound(path)) => assert_eq!(path, missing),
            other => panic!("Expected ConfigNotFound, got: {other:?}"),
        }
    }

    #[test]
    fn test_defaults_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RuntimeContext::new(dir.path(), vec![]);
        let config = load_config(None, &ctx).unwrap();
        assert_eq!(config.name, "flexcli");
        assert!(config.include.is_empty());
    }
}
