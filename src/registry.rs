//! The command registry applications configure, extend and run

use std::future::Future;
use std::time::Duration;

use clap::{Arg, ArgAction, ArgMatches};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::command::{ActionError, Command, CommandFactory, Invocation};
use crate::config_file::{CliConfig, NO_PROMPTS, RuntimeContext};
use crate::discovery::discover_command_dirs;
use crate::events::{Delivery, EventBus, ListenerId, RegistrationEvent};
use crate::help::{HelpPosition, HelpTexts, Indent, fix_indent};
use crate::loader::{CommandLoader, DefinitionLoader, LoadedFactory, load_command_factories};
use crate::{prompt, theme};

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Args(#[from] clap::Error),
    #[error("Command failed: {0}")]
    Action(#[from] ActionError),
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

type Hook = Box<dyn Fn(&Invocation) + Send + Sync>;

/// Builder for [`FlexCli`].
pub struct FlexCliBuilder {
    config: CliConfig,
    context: Option<RuntimeContext>,
    loader: Box<dyn CommandLoader>,
    before: Option<Hook>,
    after: Option<Hook>,
}

impl FlexCliBuilder {
    /// Use this working directory and argument list instead of the process's.
    #[must_use]
    pub fn context(mut self, context: RuntimeContext) -> Self {
        self.context = Some(context);
        self
    }

    #[must_use]
    pub fn loader(mut self, loader: impl CommandLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    /// Run `hook` before any command action.
    #[must_use]
    pub fn before(mut self, hook: impl Fn(&Invocation) + Send + Sync + 'static) -> Self {
        self.before = Some(Box::new(hook));
        self
    }

    /// Run `hook` after any command action that succeeded.
    #[must_use]
    pub fn after(mut self, hook: impl Fn(&Invocation) + Send + Sync + 'static) -> Self {
        self.after = Some(Box::new(hook));
        self
    }

    /// Create the registry, then discover, load and register plugin commands.
    #[must_use]
    pub fn build(self) -> FlexCli {
        let context = self.context.unwrap_or_else(|| {
            RuntimeContext::from_env().unwrap_or_else(|e| {
                warn!("{e}, discovery starts from an empty path");
                RuntimeContext::default()
            })
        });
        let mut cli = FlexCli {
            root: Command::new(self.config.name.clone()),
            help: HelpTexts::default(),
            events: Mutex::new(EventBus::default()),
            before: self.before,
            after: self.after,
            config: self.config,
            context,
        };
        if let Some(logo) = cli.config.logo.clone() {
            cli.add_help(logo.text(), logo.position(), Indent::Align);
        }
        cli.install_plugin_commands(self.loader.as_ref());
        cli
    }
}

/// Root of the command tree.
pub struct FlexCli {
    config: CliConfig,
    context: RuntimeContext,
    root: Command,
    help: HelpTexts,
    events: Mutex<EventBus>,
    before: Option<Hook>,
    after: Option<Hook>,
}

impl std::fmt::Debug for FlexCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlexCli")
            .field("name", &self.config.name)
            .field("commands", &self.root.children())
            .finish_non_exhaustive()
    }
}

impl FlexCli {
    #[must_use]
    pub fn builder(config: CliConfig) -> FlexCliBuilder {
        FlexCliBuilder {
            config,
            context: None,
            loader: Box::new(DefinitionLoader),
            before: None,
            after: None,
        }
    }

    #[must_use]
    pub fn new(config: CliConfig, context: RuntimeContext) -> Self {
        Self::builder(config).context(context).build()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    #[must_use]
    pub fn config(&self) -> &CliConfig {
        &self.config
    }

    #[must_use]
    pub fn runtime(&self) -> &RuntimeContext {
        &self.context
    }

    /// A value from the configured command context.
    #[must_use]
    pub fn context_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.config.context.get(key)
    }

    /// Top-level commands in registration order.
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        self.root.children()
    }

    #[must_use]
    pub fn prompts_disabled(&self) -> bool {
        self.context.prompts_disabled()
    }

    /// Ask a yes/no question unless prompts are disabled.
    #[must_use]
    pub fn confirm(&self, message: &str, default: bool) -> bool {
        prompt::confirm(message, default, self.prompts_disabled())
    }

    fn install_plugin_commands(&mut self, loader: &dyn CommandLoader) {
        let cwd = self.context.cwd.clone();
        let dirs = discover_command_dirs(&self.config, &self.context, None, Some(&cwd));
        let factories = load_command_factories(&dirs, loader);
        let registered: usize = factories.iter().map(|f| self.register_loaded(f)).sum();
        if !factories.is_empty() {
            info!(
                "Registered {registered} commands from {} command files",
                factories.len()
            );
        }
    }

    /// Add a block of text to the help output.
    pub fn add_help(&mut self, text: &str, position: HelpPosition, indent: impl Into<Indent>) {
        self.help.add(position, fix_indent(text, indent.into()));
    }

    /// Invoke `factory` and attach every command it produces.
    ///
    /// Returns how many commands were attached. A command whose parent does not
    /// exist, whose name or an alias is taken by a sibling, or whose subtree
    /// `clap` could not build, is logged and skipped.
    pub fn register<F: CommandFactory + ?Sized>(&mut self, factory: &F) -> usize {
        let commands = factory.build(self).into_commands();
        commands
            .into_iter()
            .map(|cmd| usize::from(self.attach(cmd)))
            .sum()
    }

    /// Register a factory read by a [`CommandLoader`].
    pub fn register_loaded(&mut self, loaded: &LoadedFactory) -> usize {
        debug!("Registering commands from {}", loaded.path.display());
        self.register(loaded.factory.as_ref())
    }

    fn attach(&mut self, mut cmd: Command) -> bool {
        if let Err(e) = cmd.validate() {
            error!("Cannot register '{}': {e}", cmd.name());
            return false;
        }
        let parent_path = cmd.parent_path().map(str::to_string);
        let parent = match &parent_path {
            Some(path) => match self.get_mut(path) {
                Some(parent) => parent,
                None => {
                    error!(
                        "Cannot register '{}': parent command '{path}' does not exist",
                        cmd.name()
                    );
                    return false;
                }
            },
            None => &mut self.root,
        };
        if let Some(taken) = parent
            .children()
            .iter()
            .find_map(|sibling| sibling.collides_with(&cmd))
        {
            error!(
                "Cannot register '{}': a command named '{taken}' already exists",
                cmd.name()
            );
            return false;
        }

        cmd.rebase(parent_path.as_deref());
        let events: Vec<RegistrationEvent> = cmd
            .walk()
            .into_iter()
            .map(RegistrationEvent::new)
            .collect();
        parent.push_child(cmd);

        let mut bus = self.events.lock();
        for event in &events {
            debug!("Registered command {}", event.name);
            bus.emit(event);
        }
        true
    }

    /// Look up a command by dotted name, e.g. `dev.microservice`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Command> {
        name.split('.')
            .try_fold(&self.root, |current, segment| current.child(segment))
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Command> {
        name.split('.')
            .try_fold(&mut self.root, |current, segment| current.child_mut(segment))
    }

    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Wait until a command with this dotted name is registered.
    ///
    /// Resolves at once if it already exists. The returned future does not
    /// borrow the registry; dropping it cancels the wait.
    pub fn find(&self, name: &str) -> impl Future<Output = Option<Command>> + Send + use<> {
        let (tx, rx) = oneshot::channel();
        if let Some(cmd) = self.get(name) {
            let _ = tx.send(cmd.clone());
        } else {
            let wanted = name.to_string();
            let mut tx = Some(tx);
            self.events.lock().subscribe(move |event| {
                if tx.as_ref().is_none_or(oneshot::Sender::is_closed) {
                    return Delivery::Remove;
                }
                if event.name != wanted {
                    return Delivery::Keep;
                }
                if let Some(sender) = tx.take() {
                    let _ = sender.send(event.command.clone());
                }
                Delivery::Remove
            });
        }
        async move { rx.await.ok() }
    }

    /// [`find`](Self::find), giving up after `timeout`.
    pub fn find_timeout(
        &self,
        name: &str,
        timeout: Duration,
    ) -> impl Future<Output = Option<Command>> + Send + use<> {
        let pending = self.find(name);
        async move { tokio::time::timeout(timeout, pending).await.ok().flatten() }
    }

    /// Call `callback` for every registration from now on.
    pub fn on_register<F>(&self, mut callback: F) -> ListenerId
    where
        F: FnMut(&RegistrationEvent) + Send + 'static,
    {
        self.events.lock().subscribe(move |event| {
            callback(event);
            Delivery::Keep
        })
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.events.lock().unsubscribe(id)
    }

    fn version(&self) -> String {
        self.config
            .version
            .clone()
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string())
    }

    /// The `clap` command tree for the current registrations.
    #[must_use]
    pub fn to_clap(&self) -> clap::Command {
        let mut cmd = clap::Command::new(self.config.name.clone())
            .version(self.version())
            .styles(theme::styles())
            .disable_version_flag(true)
            .arg(
                Arg::new("version")
                    .short('v')
                    .long("version")
                    .action(ArgAction::Version)
                    .help("Print version"),
            )
            .arg(
                Arg::new(NO_PROMPTS)
                    .long(NO_PROMPTS)
                    .global(true)
                    .action(ArgAction::SetTrue)
                    .help("Disable all interactive prompts"),
            );
        if let Some(description) = &self.config.description {
            cmd = cmd.about(description.clone());
        }
        if let Some(before) = self.help.for_root(true) {
            cmd = cmd.before_help(before);
        }
        if let Some(after) = self.help.for_root(false) {
            cmd = cmd.after_help(after);
        }
        for child in self.root.children() {
            cmd = cmd.subcommand(child.to_clap(&self.help));
        }
        cmd
    }

    /// Parse the arguments captured at construction and run the selected command.
    ///
    /// # Errors
    ///
    /// See [`run_with`](Self::run_with).
    pub async fn run(&self) -> Result<(), RunError> {
        self.run_with(self.context.args.clone()).await
    }

    /// Parse `args` (program name first) and run the selected command.
    ///
    /// # Errors
    ///
    /// Returns `RunError::Args` when parsing fails or help/version was requested
    /// (print it with [`clap::Error::print`]), and `RunError::Action` when the
    /// command's action fails.
    pub async fn run_with<I, T>(&self, args: I) -> Result<(), RunError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = self.to_clap().try_get_matches_from(args)?;
        let (path, selected) = selected_path(&matches);
        let prompts_disabled = self.prompts_disabled() || selected.get_flag(NO_PROMPTS);
        if path.is_empty() {
            return self.print_overview();
        }
        let dotted = path.join(".");
        let command = self
            .get(&dotted)
            .ok_or_else(|| RunError::UnknownCommand(dotted.clone()))?;
        let Some(action) = command.action_handler() else {
            return self.print_help_for(&path);
        };

        let invocation = Invocation {
            command: dotted,
            matches: selected.clone(),
            prompts_disabled,
        };
        if let Some(before) = &self.before {
            before(&invocation);
        }
        action(invocation.clone()).await?;
        if let Some(after) = &self.after {
            after(&invocation);
        }
        Ok(())
    }

    fn print_overview(&self) -> Result<(), RunError> {
        if let Some(title) = &self.config.title {
            println!("{}", theme::title(title));
        }
        println!("Version: {}", self.version());
        self.to_clap().print_help()?;
        Ok(())
    }

    fn print_help_for(&self, path: &[String]) -> Result<(), RunError> {
        let mut root = self.to_clap();
        root.build();
        let mut current = &mut root;
        for segment in path {
            current = current
                .find_subcommand_mut(segment)
                .ok_or_else(|| RunError::UnknownCommand(path.join(".")))?;
        }
        current.print_help()?;
        Ok(())
    }
}

/// Names of the nested subcommands chosen on the command line, and their matches.
fn selected_path(matches: &ArgMatches) -> (Vec<String>, &ArgMatches) {
    let mut path = Vec::new();
    let mut current = matches;
    while let Some((name, sub)) = current.subcommand() {
        path.push(name.to_string());
        current = sub;
    }
    (path, current)
}
