//! Configuration file handling for flexcli

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, info};
use regex_cache::LazyRegex;
use serde::Deserialize;
use thiserror::Error;

use crate::help::HelpPosition;
use crate::patterns::PatternSet;

/// Package name that is never treated as a plugin of itself.
pub const DEFAULT_SELF_PACKAGE: &str = "@voerka/cli";

/// Id and long name of the global flag that disables every interactive prompt.
pub const NO_PROMPTS: &str = "no-prompts";
const NO_PROMPTS_FLAG: &str = "--no-prompts";

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No config file found in current directory or its parents: {0}")]
    ConfigNotFound(PathBuf),
    #[error("Unknown working directory: {0}")]
    UnknownWorkingDirectory(String),
    #[error("Unable to parse YAML config file {path}: {source}")]
    Yaml {
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("Unable to parse JSON config file {path}: {source}")]
    Json {
        source: serde_json::Error,
        path: PathBuf,
    },
    #[error("Invalid regex pattern `{pattern}`: {source}")]
    Regex {
        source: regex::Error,
        pattern: String,
    },
    #[error("Invalid config: {0}")]
    Validation(String),
}

/// Parse a list of regex pattern strings into compiled regexes.
///
/// # Errors
///
/// Returns `ConfigError::Regex` if any pattern fails to compile.
pub fn parse_regexes(regex: Vec<String>) -> Result<Vec<LazyRegex>, ConfigError> {
    regex
        .into_iter()
        .map(|r| {
            LazyRegex::new(&r).map_err(|e| ConfigError::Regex {
                source: e,
                pattern: r,
            })
        })
        .collect()
}

/// Logo text and where it is shown in help output.
///
/// Written either as plain text (shown before everything) or as a
/// `[position, text]` pair.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Logo {
    Text(String),
    Placed(HelpPosition, String),
}

impl Logo {
    #[must_use]
    pub fn position(&self) -> HelpPosition {
        match self {
            Logo::Text(_) => HelpPosition::BeforeAll,
            Logo::Placed(pos, _) => *pos,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Logo::Text(text) | Logo::Placed(_, text) => text,
        }
    }
}

/// Configuration of the root command and of plugin discovery
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CliConfig {
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub logo: Option<Logo>,
    /// Dependencies whose names match are scanned for commands. Empty disables discovery.
    pub include: PatternSet,
    pub exclude: PatternSet,
    /// Directory, relative to a package root, holding command files.
    pub cli_dir: String,
    pub self_package: String,
    pub context: HashMap<String, serde_json::Value>,
}

impl Default for CliConfig {
    fn default() -> Self {
        CliConfig {
            name: "flexcli".to_string(),
            title: None,
            description: None,
            version: None,
            logo: None,
            include: PatternSet::new(),
            exclude: PatternSet::new(),
            cli_dir: "cli".to_string(),
            self_package: DEFAULT_SELF_PACKAGE.to_string(),
            context: HashMap::new(),
        }
    }
}

impl CliConfig {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        CliConfig {
            name: name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_include(mut self, include: impl Into<PatternSet>) -> Self {
        self.include = include.into();
        self
    }

    #[must_use]
    pub fn with_exclude(mut self, exclude: impl Into<PatternSet>) -> Self {
        self.exclude = exclude.into();
        self
    }

    #[must_use]
    pub fn with_cli_dir(mut self, cli_dir: impl Into<String>) -> Self {
        self.cli_dir = cli_dir.into();
        self
    }

    /// Loads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if the file cannot be read, or
    /// `ConfigError::Yaml`/`ConfigError::Json` if parsing fails.
    pub fn from_file(file: &Path) -> Result<CliConfig, ConfigError> {
        let contents = std::fs::read_to_string(file)
            .map_err(|_| ConfigError::ConfigNotFound(file.to_path_buf()))?;
        let config: CliConfig = if file.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&contents).map_err(|e| ConfigError::Json {
                source: e,
                path: file.to_path_buf(),
            })?
        } else {
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::Yaml {
                source: e,
                path: file.to_path_buf(),
            })?
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation("name must not be empty".into()));
        }
        let cli_dir = Path::new(&self.cli_dir);
        if self.cli_dir.trim().is_empty() || cli_dir.is_absolute() {
            return Err(ConfigError::Validation(format!(
                "cliDir must be a relative directory, got '{}'",
                self.cli_dir
            )));
        }
        Ok(())
    }

    /// Searches for a configuration file in `start` and its parents.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if no config file is found.
    pub fn find_config(start: &Path) -> Result<PathBuf, ConfigError> {
        let mut path = start.to_path_buf();
        debug!("Searching for config file in {}", start.display());
        loop {
            for file in &FILENAMES {
                let config_path = path.join(file);
                if config_path.exists() {
                    info!("Found config file: {}", config_path.display());
                    return Ok(config_path);
                }
            }
            if !path.pop() {
                return Err(ConfigError::ConfigNotFound(start.to_path_buf()));
            }
        }
    }

    /// Load the nearest config file above `start`, or defaults if there is none.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a config file exists but cannot be parsed.
    pub fn discover(start: &Path) -> Result<CliConfig, ConfigError> {
        match Self::find_config(start) {
            Ok(path) => Self::from_file(&path),
            Err(ConfigError::ConfigNotFound(_)) => {
                debug!("No config file found, using defaults");
                Ok(CliConfig::default())
            }
            Err(e) => Err(e),
        }
    }
}

/// List of supported configuration file names
const FILENAMES: [&str; 3] = [".flexcli.json", ".flexcli.yaml", ".flexcli.yml"];

/// Process state the registry depends on, resolved once at startup.
#[derive(Debug, Clone, Default)]
pub struct RuntimeContext {
    /// Project directory discovery starts from.
    pub cwd: PathBuf,
    /// Raw invocation arguments, program name first.
    pub args: Vec<String>,
}

impl RuntimeContext {
    #[must_use]
    pub fn new(cwd: impl Into<PathBuf>, args: Vec<String>) -> Self {
        RuntimeContext {
            cwd: cwd.into(),
            args,
        }
    }

    /// Capture the current directory and process arguments.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownWorkingDirectory` if the cwd cannot be determined.
    pub fn from_env() -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir()
            .map_err(|e| ConfigError::UnknownWorkingDirectory(e.to_string()))?;
        Ok(RuntimeContext {
            cwd,
            args: std::env::args().collect(),
        })
    }

    #[must_use]
    pub fn prompts_disabled(&self) -> bool {
        self.args.iter().any(|a| a == NO_PROMPTS_FLAG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_file_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".flexcli.json");
        std::fs::write(
            &path,
            r#"{
                "name": "voerka",
                "version": "1.2.3",
                "include": "^@voerka/",
                "cliDir": "commands"
            }"#,
        )
        .unwrap();
        let config = CliConfig::from_file(&path).unwrap();
        assert_eq!(config.name, "voerka");
        assert_eq!(config.version.as_deref(), Some("1.2.3"));
        assert_eq!(config.cli_dir, "commands");
        assert!(config.include.matches("@voerka/dev"));
        assert!(config.exclude.is_empty());
    }

    #[test]
    fn test_from_file_yaml_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".flexcli.yaml");
        std::fs::write(
            &path,
            "name: app\ninclude:\n  - '^plugin-'\n  - '^ext-'\nexclude: '-legacy$'\nlogo: [after, 'ASCII']\n",
        )
        .unwrap();
        let config = CliConfig::from_file(&path).unwrap();
        assert_eq!(config.cli_dir, "cli");
        assert_eq!(config.self_package, DEFAULT_SELF_PACKAGE);
        assert_eq!(config.include.len(), 2);
        assert!(config.exclude.matches("plugin-legacy"));
        let logo = config.logo.unwrap();
        assert_eq!(logo.position(), HelpPosition::After);
        assert_eq!(logo.text(), "ASCII");
    }

    #[test]
    fn test_plain_logo_goes_before_all() {
        let config: CliConfig = serde_yaml::from_str("logo: hello").unwrap();
        assert_eq!(config.logo, Some(Logo::Text("hello".into())));
        assert_eq!(config.logo.unwrap().position(), HelpPosition::BeforeAll);
    }

    #[test]
    fn test_invalid_include_regex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".flexcli.yaml");
        std::fs::write(&path, "include: '[invalid'\n").unwrap();
        match CliConfig::from_file(&path) {
            Err(ConfigError::Yaml { source, .. }) => {
                assert!(source.to_string().contains("[invalid"));
            }
            other => panic!("Expected ConfigError::Yaml, got: {other:?}"),
        }
    }

    #[test]
    fn test_absolute_cli_dir_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".flexcli.yaml");
        std::fs::write(&path, "cliDir: /etc\n").unwrap();
        assert!(matches!(
            CliConfig::from_file(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_find_config_in_parent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".flexcli.yml"), "name: up\n").unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        let found = CliConfig::find_config(&nested).unwrap();
        assert_eq!(found, dir.path().join(".flexcli.yml"));
        assert_eq!(CliConfig::discover(&nested).unwrap().name, "up");
    }

    #[test]
    fn test_regex_error_preserves_pattern() {
        let result = parse_regexes(vec!["[invalid".to_string()]);
        match result {
            Err(ConfigError::Regex { pattern, .. }) => {
                assert_eq!(pattern, "[invalid");
            }
            other => panic!("Expected ConfigError::Regex, got: {other:?}"),
        }
    }

    #[test]
    fn test_prompts_disabled_from_args() {
        let ctx = RuntimeContext::new("/tmp", vec!["app".into(), "--no-prompts".into()]);
        assert!(ctx.prompts_disabled());
        let ctx = RuntimeContext::new("/tmp", vec!["app".into(), "dev".into()]);
        assert!(!ctx.prompts_disabled());
    }
}
