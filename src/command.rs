//! Command tree nodes and the factory capability that produces them

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use clap::ArgMatches;
use futures::FutureExt;
use futures::future::BoxFuture;
use thiserror::Error;

use crate::config_file::NO_PROMPTS;
use crate::help::HelpTexts;
use crate::prompt;
use crate::registry::FlexCli;

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("{0}")]
    Failed(String),
    #[error("`{command}` exited with code {code:?}")]
    ExitStatus { command: String, code: Option<i32> },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What an action receives when its command is selected.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Full dotted name of the selected command.
    pub command: String,
    pub matches: ArgMatches,
    pub prompts_disabled: bool,
}

impl Invocation {
    /// Ask a yes/no question, answering `default` when prompts are disabled.
    #[must_use]
    pub fn confirm(&self, message: &str, default: bool) -> bool {
        prompt::confirm(message, default, self.prompts_disabled)
    }
}

const HELP: &str = "help";

/// Argument ids, short and long names every generated command already carries.
const RESERVED_IDS: [&str; 2] = [HELP, NO_PROMPTS];
const RESERVED_SHORT: char = 'h';

/// Reject argument lists that would trip `clap`'s build-time assertions.
fn check_args(args: &[clap::Arg]) -> Result<(), String> {
    let mut ids = HashSet::new();
    let mut shorts = HashSet::new();
    let mut longs = HashSet::new();
    let mut optional_positional = None;
    for arg in args {
        let id = arg.get_id().as_str();
        if RESERVED_IDS.contains(&id) || !ids.insert(id) {
            return Err(format!("argument '{id}' is reserved or defined twice"));
        }
        if let Some(short) = arg.get_short()
            && (short == RESERVED_SHORT || !shorts.insert(short))
        {
            return Err(format!("short option '-{short}' of '{id}' is already in use"));
        }
        if let Some(long) = arg.get_long()
            && (RESERVED_IDS.contains(&long) || !longs.insert(long))
        {
            return Err(format!("long option '--{long}' of '{id}' is already in use"));
        }
        if arg.is_required_set() && !arg.get_default_values().is_empty() {
            return Err(format!("argument '{id}' is required and has a default"));
        }
        if arg.is_positional() {
            if !arg.get_action().takes_values() {
                return Err(format!("positional argument '{id}' must take a value"));
            }
            if arg.is_required_set() {
                if let Some(optional) = optional_positional {
                    return Err(format!(
                        "required positional '{id}' follows optional positional '{optional}'"
                    ));
                }
            } else {
                optional_positional.get_or_insert(id);
            }
        }
    }
    Ok(())
}

pub type ActionFuture = BoxFuture<'static, Result<(), ActionError>>;
pub type Action = Arc<dyn Fn(Invocation) -> ActionFuture + Send + Sync>;

/// A node of the command tree.
#[derive(Clone, Default)]
pub struct Command {
    name: String,
    full_name: String,
    about: Option<String>,
    aliases: Vec<String>,
    args: Vec<clap::Arg>,
    children: Vec<Command>,
    action: Option<Action>,
    parent: Option<String>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("full_name", &self.full_name)
            .field("about", &self.about)
            .field("aliases", &self.aliases)
            .field("children", &self.children)
            .field("has_action", &self.action.is_some())
            .finish_non_exhaustive()
    }
}

impl Command {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Command {
            full_name: name.clone(),
            name,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    #[must_use]
    pub fn arg(mut self, arg: clap::Arg) -> Self {
        self.args.push(arg);
        self
    }

    #[must_use]
    pub fn subcommand(mut self, child: Command) -> Self {
        self.children.push(child);
        self
    }

    /// Attach under the command with this dotted name instead of the root.
    #[must_use]
    pub fn parent(mut self, dotted: impl Into<String>) -> Self {
        self.parent = Some(dotted.into());
        self
    }

    #[must_use]
    pub fn action<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        self.action = Some(Arc::new(move |inv: Invocation| -> ActionFuture {
            f(inv).boxed()
        }));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted path from the root, e.g. `dev.microservice`.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.about.as_deref()
    }

    #[must_use]
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    #[must_use]
    pub fn parent_path(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    #[must_use]
    pub fn children(&self) -> &[Command] {
        &self.children
    }

    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Command> {
        self.children.iter().find(|c| c.name == name)
    }

    pub(crate) fn child_mut(&mut self, name: &str) -> Option<&mut Command> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    pub(crate) fn push_child(&mut self, child: Command) {
        self.children.push(child);
    }

    #[must_use]
    pub fn action_handler(&self) -> Option<&Action> {
        self.action.as_ref()
    }

    /// Recompute full names of this subtree below `prefix`.
    pub(crate) fn rebase(&mut self, prefix: Option<&str>) {
        self.full_name = match prefix {
            Some(p) if !p.is_empty() => format!("{p}.{}", self.name),
            _ => self.name.clone(),
        };
        let own = self.full_name.clone();
        for child in &mut self.children {
            child.rebase(Some(&own));
        }
    }

    /// This command and all its descendants, parents first.
    #[must_use]
    pub fn walk(&self) -> Vec<&Command> {
        let mut nodes = vec![self];
        for child in &self.children {
            nodes.extend(child.walk());
        }
        nodes
    }

    /// The name followed by every alias.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// The first name or alias `other` shares with this command.
    #[must_use]
    pub fn collides_with(&self, other: &Command) -> Option<String> {
        other
            .names()
            .find(|n| self.names().any(|own| own == *n))
            .map(str::to_string)
    }

    /// Check this subtree for anything `clap` would refuse to build.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for name in self.names() {
            if !seen.insert(name) {
                return Err(format!("name '{name}' is given twice"));
            }
            if name.is_empty() || name.contains('.') {
                return Err(format!("invalid command name '{name}'"));
            }
            if name == HELP {
                return Err(format!("'{HELP}' is reserved"));
            }
        }
        check_args(&self.args).map_err(|e| format!("{}: {e}", self.name))?;
        for (i, child) in self.children.iter().enumerate() {
            child.validate()?;
            if let Some(taken) = self.children[..i]
                .iter()
                .find_map(|earlier| earlier.collides_with(child))
            {
                return Err(format!("{}: subcommand name '{taken}' is used twice", self.name));
            }
        }
        Ok(())
    }

    pub(crate) fn to_clap(&self, help: &HelpTexts) -> clap::Command {
        let mut cmd = clap::Command::new(self.name.clone())
            .visible_aliases(self.aliases.clone())
            .args(self.args.clone());
        if let Some(about) = &self.about {
            cmd = cmd.about(about.clone());
        }
        if let Some(before) = help.for_subcommand(true) {
            cmd = cmd.before_help(before);
        }
        if let Some(after) = help.for_subcommand(false) {
            cmd = cmd.after_help(after);
        }
        for child in &self.children {
            cmd = cmd.subcommand(child.to_clap(help));
        }
        cmd
    }
}

/// Commands produced by one factory call: none, one or many.
#[derive(Debug, Default)]
pub struct FactoryOutput(pub Vec<Command>);

impl FactoryOutput {
    #[must_use]
    pub fn into_commands(self) -> Vec<Command> {
        self.0
    }
}

impl From<()> for FactoryOutput {
    fn from((): ()) -> Self {
        FactoryOutput(Vec::new())
    }
}

impl From<Command> for FactoryOutput {
    fn from(cmd: Command) -> Self {
        FactoryOutput(vec![cmd])
    }
}

impl From<Vec<Command>> for FactoryOutput {
    fn from(cmds: Vec<Command>) -> Self {
        FactoryOutput(cmds)
    }
}

impl<T: Into<FactoryOutput>> From<Option<T>> for FactoryOutput {
    fn from(cmds: Option<T>) -> Self {
        cmds.map(Into::into).unwrap_or_default()
    }
}

/// A loadable unit that contributes commands.
///
/// Any `Fn(&FlexCli) -> R` where `R` converts into [`FactoryOutput`] is a factory.
pub trait CommandFactory {
    fn build(&self, cli: &FlexCli) -> FactoryOutput;
}

impl<F, R> CommandFactory for F
where
    F: Fn(&FlexCli) -> R,
    R: Into<FactoryOutput>,
{
    fn build(&self, cli: &FlexCli) -> FactoryOutput {
        self(cli).into()
    }
}
