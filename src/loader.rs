//! Loading command factories from command directories
//!
//! How a file becomes a [`CommandFactory`] is up to a [`CommandLoader`]. The
//! built-in [`DefinitionLoader`] reads declarative YAML definitions:
//!
//! ```yaml
//! name: greet
//! about: Print a greeting
//! args:
//!   - name: who
//!     long: who
//!     default: world
//! run: echo "hello $FLEXCLI_ARG_WHO"
//! ```
//!
//! A file may instead hold a `commands:` list of such definitions.

use std::path::{Path, PathBuf};

use clap::{Arg, ArgAction};
use log::{debug, error, info};
use serde::Deserialize;
use thiserror::Error;

use crate::command::{ActionError, Command, CommandFactory, FactoryOutput, Invocation};
use crate::registry::FlexCli;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Unable to read command file {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("Unable to parse command file {path}: {source}")]
    Yaml {
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("{0} does not define any command")]
    NotAFactory(PathBuf),
    #[error("Invalid command definition in {path}: {reason}")]
    InvalidDefinition { path: PathBuf, reason: String },
    #[error("Invalid command file pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// Turns a command file into a factory.
pub trait CommandLoader {
    /// File extension, without the dot, of the files this loader understands.
    fn extension(&self) -> &str;

    /// # Errors
    ///
    /// Returns `LoadError` if the file cannot be read or does not describe commands.
    fn load(&self, path: &Path) -> Result<Box<dyn CommandFactory>, LoadError>;
}

/// A factory together with the file it came from.
pub struct LoadedFactory {
    pub path: PathBuf,
    pub factory: Box<dyn CommandFactory>,
}

impl std::fmt::Debug for LoadedFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedFactory")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Command files directly inside `dir`, sorted by name.
///
/// # Errors
///
/// Returns `LoadError::Pattern` if the directory cannot be turned into a glob pattern.
pub fn command_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, LoadError> {
    let pattern = format!(
        "{}/*.{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        glob::Pattern::escape(extension)
    );
    let mut files: Vec<PathBuf> = glob::glob(&pattern)?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                debug!("Skipping unreadable entry in {}: {e}", dir.display());
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Load every command file in `dirs`. Failures are logged per file and skipped.
#[must_use]
pub fn load_command_factories(dirs: &[PathBuf], loader: &dyn CommandLoader) -> Vec<LoadedFactory> {
    let mut loaded = Vec::new();
    for dir in dirs {
        let files = match command_files(dir, loader.extension()) {
            Ok(files) => files,
            Err(e) => {
                error!("Unable to list commands in {}: {e}", dir.display());
                continue;
            }
        };
        for path in files {
            match loader.load(&path) {
                Ok(factory) => {
                    debug!("Loaded command factory {}", path.display());
                    loaded.push(LoadedFactory { path, factory });
                }
                Err(e) => error!("Failed to load command factory: {e}"),
            }
        }
    }
    loaded
}

/// One argument of a declarative command.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArgDefinition {
    pub name: String,
    pub help: Option<String>,
    /// Long option name; without `long` or `short` the argument is positional.
    pub long: Option<String>,
    pub short: Option<char>,
    #[serde(default)]
    pub required: bool,
    pub default: Option<String>,
    /// A boolean switch taking no value.
    #[serde(default)]
    pub flag: bool,
}

impl ArgDefinition {
    fn to_arg(&self) -> Arg {
        let mut arg = Arg::new(self.name.clone()).required(self.required);
        if let Some(help) = &self.help {
            arg = arg.help(help.clone());
        }
        if let Some(long) = &self.long {
            arg = arg.long(long.clone());
        }
        if let Some(short) = self.short {
            arg = arg.short(short);
        }
        if self.flag {
            arg = arg.action(ArgAction::SetTrue);
        } else if let Some(default) = &self.default {
            arg = arg.default_value(default.clone());
        }
        arg
    }

    fn env_name(&self) -> String {
        let name: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("FLEXCLI_ARG_{name}")
    }

    fn env_value(&self, matches: &clap::ArgMatches) -> Option<String> {
        if self.flag {
            Some(matches.get_flag(&self.name).to_string())
        } else {
            matches.get_one::<String>(&self.name).cloned()
        }
    }
}

/// A declarative command.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandDefinition {
    pub name: String,
    pub about: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub parent: Option<String>,
    #[serde(default)]
    pub args: Vec<ArgDefinition>,
    /// Shell command run when this command is selected.
    pub run: Option<String>,
    /// Question asked before `run`; answering no skips it.
    pub confirm: Option<String>,
    #[serde(default)]
    pub subcommands: Vec<CommandDefinition>,
}

impl CommandDefinition {
    fn to_command(&self, package_dir: &Path) -> Command {
        let mut cmd = Command::new(self.name.clone());
        if let Some(about) = &self.about {
            cmd = cmd.about(about.clone());
        }
        for alias in &self.aliases {
            cmd = cmd.alias(alias.clone());
        }
        if let Some(parent) = &self.parent {
            cmd = cmd.parent(parent.clone());
        }
        for arg in &self.args {
            cmd = cmd.arg(arg.to_arg());
        }
        for child in &self.subcommands {
            cmd = cmd.subcommand(child.to_command(package_dir));
        }
        if let Some(script) = &self.run {
            let script = script.clone();
            let confirm = self.confirm.clone();
            let args = self.args.clone();
            let package_dir = package_dir.to_path_buf();
            cmd = cmd.action(move |inv| {
                run_script(
                    script.clone(),
                    confirm.clone(),
                    args.clone(),
                    package_dir.clone(),
                    inv,
                )
            });
        }
        cmd
    }
}

async fn run_script(
    script: String,
    confirm: Option<String>,
    args: Vec<ArgDefinition>,
    package_dir: PathBuf,
    inv: Invocation,
) -> Result<(), ActionError> {
    if let Some(question) = confirm
        && !inv.confirm(&question, false)
    {
        info!("Skipped {}", inv.command);
        return Ok(());
    }
    let mut process = tokio::process::Command::new("sh");
    process
        .arg("-c")
        .arg(&script)
        .env("FLEXCLI_COMMAND", &inv.command)
        .env("FLEXCLI_PACKAGE_DIR", &package_dir);
    for arg in &args {
        if let Some(value) = arg.env_value(&inv.matches) {
            process.env(arg.env_name(), value);
        }
    }
    debug!("Running `{script}` for {}", inv.command);
    let status = process.status().await?;
    if status.success() {
        Ok(())
    } else {
        Err(ActionError::ExitStatus {
            command: inv.command,
            code: status.code(),
        })
    }
}

#[derive(Deserialize)]
struct DefinitionList {
    commands: Vec<CommandDefinition>,
}

/// Factory built from one definition file.
#[derive(Debug, Clone)]
pub struct DefinitionFactory {
    pub definitions: Vec<CommandDefinition>,
    /// Root of the package that shipped the file.
    pub package_dir: PathBuf,
}

impl DefinitionFactory {
    /// # Errors
    ///
    /// Returns `LoadError::Yaml` for malformed documents,
    /// `LoadError::NotAFactory` for documents that define no command and
    /// `LoadError::InvalidDefinition` for commands that cannot be built, such as
    /// options reusing `-h` or a positional switch.
    pub fn parse(contents: &str, path: &Path) -> Result<Self, LoadError> {
        let yaml_err = |e: serde_yaml::Error| LoadError::Yaml {
            source: e,
            path: path.to_path_buf(),
        };
        let value: serde_yaml::Value = serde_yaml::from_str(contents).map_err(yaml_err)?;
        let definitions = match value.as_mapping() {
            Some(map) if map.contains_key("commands") => {
                serde_yaml::from_value::<DefinitionList>(value)
                    .map_err(yaml_err)?
                    .commands
            }
            Some(map) if map.contains_key("name") => {
                vec![serde_yaml::from_value::<CommandDefinition>(value).map_err(yaml_err)?]
            }
            _ => return Err(LoadError::NotAFactory(path.to_path_buf())),
        };
        if definitions.is_empty() {
            return Err(LoadError::NotAFactory(path.to_path_buf()));
        }
        let package_dir = path
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let factory = DefinitionFactory {
            definitions,
            package_dir,
        };
        factory.validate().map_err(|reason| LoadError::InvalidDefinition {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(factory)
    }

    fn validate(&self) -> Result<(), String> {
        let commands: Vec<Command> = self
            .definitions
            .iter()
            .map(|d| d.to_command(&self.package_dir))
            .collect();
        for (i, cmd) in commands.iter().enumerate() {
            cmd.validate()?;
            if cmd.parent_path().is_some() {
                continue;
            }
            if let Some(taken) = commands[..i]
                .iter()
                .filter(|earlier| earlier.parent_path().is_none())
                .find_map(|earlier| earlier.collides_with(cmd))
            {
                return Err(format!("command name '{taken}' is defined twice"));
            }
        }
        Ok(())
    }
}

impl CommandFactory for DefinitionFactory {
    fn build(&self, _cli: &FlexCli) -> FactoryOutput {
        self.definitions
            .iter()
            .map(|d| d.to_command(&self.package_dir))
            .collect::<Vec<_>>()
            .into()
    }
}

/// Loader for `*.yaml` command definitions.
#[derive(Debug, Clone, Default)]
pub struct DefinitionLoader;

impl CommandLoader for DefinitionLoader {
    fn extension(&self) -> &str {
        "yaml"
    }

    fn load(&self, path: &Path) -> Result<Box<dyn CommandFactory>, LoadError> {
        let contents = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
            source: e,
            path: path.to_path_buf(),
        })?;
        Ok(Box::new(DefinitionFactory::parse(&contents, path)?))
    }
}
