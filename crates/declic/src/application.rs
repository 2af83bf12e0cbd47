//! The application: global flags, top-level commands and the run loop.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::command::{Command, Node};
use crate::complete::{self, COMPLETE_TOKEN};
use crate::config::{self, ConfigStore};
use crate::context::Context;
use crate::error::{Error, StructuralError};
use crate::flags::{Flags, FlagsRef, GlobalFlags, Scope, Shared, shared};
use crate::help;
use crate::merge;
use crate::output::{Output, Verbosity};
use crate::resolve::{self, Walk};

pub struct Application {
    name: String,
    version: String,
    root: Command,
    config_command: Command,
    commands: Vec<Command>,
    global_flags: Shared<GlobalFlags>,
    extra_flags: Vec<FlagsRef>,
    config: Shared<ConfigStore>,
    output: Output,
    env: Vec<(String, String)>,
    executed: Option<Vec<String>>,
}

impl Application {
    /// `version` must be a semantic version prefixed with `v`, e.g. `v1.2.3`.
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, Error> {
        let (name, title, version) = (name.into(), title.into(), version.into());
        if name.trim().is_empty() || declic_argparse::names::contains_whitespace(&name) {
            return Err(StructuralError::InvalidApplicationName(name).into());
        }
        if title.trim().is_empty() {
            return Err(StructuralError::MissingApplicationTitle(name).into());
        }
        check_version(&version)?;

        let config = shared(ConfigStore::default());
        Ok(Self {
            root: Command::new(name.clone(), title),
            config_command: config::command(&config),
            name,
            version,
            commands: Vec::new(),
            global_flags: shared(GlobalFlags::default()),
            extra_flags: Vec::new(),
            config,
            output: Output::stdout(),
            env: std::env::vars().collect(),
            executed: None,
        })
    }

    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    /// Replace the environment read for `<APP>_*` variables.
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    pub fn global_flags(&self) -> Shared<GlobalFlags> {
        self.global_flags.clone()
    }

    pub fn config_store(&self) -> Shared<ConfigStore> {
        self.config.clone()
    }

    /// Register a top-level command. The command tree is checked right away;
    /// on error the command is not kept.
    pub fn add_command(&mut self, command: Command) -> Result<(), Error> {
        self.commands.push(command);
        if let Err(err) = self.check() {
            self.commands.pop();
            return Err(err.into());
        }
        Ok(())
    }

    pub fn add_commands(&mut self, commands: impl IntoIterator<Item = Command>) -> Result<(), Error> {
        for command in commands {
            self.add_command(command)?;
        }
        Ok(())
    }

    /// Register flags visible on every command, next to [`GlobalFlags`].
    pub fn add_global_flags<F: Flags>(&mut self, flags: &Shared<F>) -> Result<(), Error> {
        let flags: FlagsRef = flags.clone();
        self.extra_flags.push(flags);
        if let Err(err) = self.global_scope() {
            self.extra_flags.pop();
            return Err(err.into());
        }
        Ok(())
    }

    /// Path of the command resolved by the last run, application name first.
    /// Stops at the last known command when resolution failed.
    pub fn executed_command(&self) -> Option<&[String]> {
        self.executed.as_deref()
    }

    fn global_scope(&self) -> Result<Scope, StructuralError> {
        let mut scope = Scope::default();
        let global: FlagsRef = self.global_flags.clone();
        scope.register(&global)?;
        for flags in &self.extra_flags {
            scope.register(flags)?;
        }
        Ok(scope)
    }

    fn tree(&self) -> Result<Node<'_>, StructuralError> {
        let children = std::iter::once(&self.config_command).chain(self.commands.iter());
        Node::root(&self.root, children, self.global_scope()?)
    }

    fn check(&self) -> Result<(), StructuralError> {
        self.tree().map(drop)
    }

    /// Run with `args`, the process arguments without the program name.
    ///
    /// A deprecated command whose replacement is to be executed restarts
    /// resolution with the replacement tokens.
    pub fn run<I, S>(&mut self, ctx: &Context, args: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv: Vec<String> = args.into_iter().map(Into::into).collect();
        let mut redirected: HashSet<String> = HashSet::new();

        loop {
            let (executed, result) = self.execute(ctx, &argv);
            self.executed = executed;

            let mut signal = match result {
                Err(Error::Deprecated(signal)) => signal,
                other => return other,
            };

            if signal.execute_replacement && !signal.replacement.is_empty() {
                let from = self.executed.as_ref().map(|p| p.join(" ")).unwrap_or_default();
                if !redirected.insert(from.clone()) {
                    return Err(StructuralError::DeprecationCycle(from).into());
                }
                debug!(%from, to = ?signal.replacement, "running replacement for deprecated command");
                argv = signal.replacement;
                continue;
            }

            if !signal.replacement.is_empty() {
                signal.replacement.insert(0, self.name.clone());
            }
            return Err(Error::Deprecated(signal));
        }
    }

    fn execute(&self, ctx: &Context, argv: &[String]) -> (Option<Vec<String>>, Result<(), Error>) {
        if self.commands.is_empty() {
            return (None, Err(StructuralError::NoCommands.into()));
        }
        let tree = match self.tree() {
            Ok(tree) => tree,
            Err(err) => return (None, Err(err.into())),
        };

        if argv.first().map(String::as_str) == Some(COMPLETE_TOKEN) {
            return (None, self.complete(ctx, &tree, &argv[1..]));
        }

        let (walk, resolved) = resolve::resolve(&tree, argv);
        let executed = Some(walk.deepest().path.clone());
        debug!(path = %walk.deepest().path_string(), "resolved command");
        let result = resolved.and_then(|()| self.dispatch(ctx, walk));
        (executed, result)
    }

    fn dispatch(&self, ctx: &Context, mut walk: Walk<'_, '_>) -> Result<(), Error> {
        if walk.help {
            self.output.print(help::render(&walk.chain));
            return Ok(());
        }
        if walk.version {
            self.output.println(format_args!("{} version {}", self.name, self.version));
            return Ok(());
        }

        self.configure(&mut walk)?;

        let node = walk.deepest();
        if node.is_branch() {
            self.output.print(help::render(&walk.chain));
            return Err(Error::MissingCommand {
                path: node.path_string(),
                available: node.visible_children().map(|c| c.command.name.clone()).collect(),
            });
        }
        node.dispatch(ctx, &walk.positionals, &self.output)
    }

    /// Resolve the configuration file and layer it, and the environment,
    /// under the flags given on the command line.
    fn configure(&self, walk: &mut Walk<'_, '_>) -> Result<(), Error> {
        let path = self.config_file(walk)?;
        self.output.set_verbosity(self.global_flags.borrow().verbose.verbosity());
        self.output
            .debug(format_args!("Initializing configuration using file {}", path.display()));
        self.load_configuration(walk, &path)
    }

    fn config_file(&self, walk: &mut Walk<'_, '_>) -> Result<PathBuf, Error> {
        let global: FlagsRef = self.global_flags.clone();
        let from_flag = walk.changed.contains(&global, "config");
        let raw = if from_flag {
            self.global_flags.borrow().config.clone()
        } else {
            match merge::lookup_env(&self.env, &merge::env_key(&self.name, "config")) {
                Some(path) => path.to_string(),
                None => config::default_path(&self.name)?.display().to_string(),
            }
        };
        let path = config::expand_home(&raw);
        self.global_flags.borrow_mut().config = path.display().to_string();
        walk.changed.mark(&global, "config");
        Ok(path)
    }

    fn load_configuration(&self, walk: &mut Walk<'_, '_>, path: &Path) -> Result<(), Error> {
        self.config.borrow_mut().set_path(path.to_path_buf());
        let settings = self.config.borrow().load()?;
        debug!(path = %path.display(), keys = settings.len(), "loaded configuration");

        merge::reconcile(&self.name, &walk.scopes(), &settings, path, &self.env, &walk.changed)?;
        self.output.set_verbosity(self.global_flags.borrow().verbose.verbosity());
        Ok(())
    }

    fn complete(&self, ctx: &Context, tree: &Node<'_>, words: &[String]) -> Result<(), Error> {
        // Completers for config keys need the file path, which may come from
        // the words typed so far.
        let (typed, _) = words.split_at(words.len().saturating_sub(1));
        let mut walk = resolve::resolve_lenient(tree, typed);
        let loaded = self
            .config_file(&mut walk)
            .and_then(|path| self.load_configuration(&mut walk, &path));
        if let Err(err) = loaded {
            debug!(error = %err, "configuration unavailable during completion");
        }
        // -v/-vv on the line must not add output lines for the shell.
        self.output.set_verbosity(Verbosity::Normal);

        let (completion, directive) = complete::complete(tree, ctx, words);
        self.output.print(complete::render(&completion, directive));
        Ok(())
    }
}

fn check_version(version: &str) -> Result<(), StructuralError> {
    let invalid = |reason: String| StructuralError::InvalidVersion {
        version: version.to_string(),
        reason,
    };
    let Some(bare) = version.strip_prefix('v') else {
        return Err(invalid("missing \"v\" prefix".to_string()));
    };
    semver::Version::parse(bare).map_err(|err| invalid(err.to_string()))?;
    Ok(())
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("commands", &self.commands.len())
            .field("executed", &self.executed)
            .finish_non_exhaustive()
    }
}
