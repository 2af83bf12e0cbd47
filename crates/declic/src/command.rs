use declic_argparse::names;

use crate::arguments::{Argument, Arguments};
use crate::complete::Completion;
use crate::context::Context;
use crate::deprecated::Deprecation;
use crate::error::{Error, StructuralError};
use crate::flags::{Flags, FlagsRef, Scope, Shared};
use crate::output::Output;
use crate::validate::{self, ValidateFn};

pub type RunFn = Box<dyn Fn(&Context, &Arguments, &Output) -> anyhow::Result<()>>;

/// Completes positional arguments: `(context, bound arguments, partial word)`.
pub type AutoCompleteFn = Box<dyn Fn(&Context, &Arguments, &str) -> Completion>;

/// A usage example shown in help.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub description: String,
    /// Everything after the command path, e.g. `alice --loud`.
    pub command: String,
}

/// A node in the command tree: either a leaf with a body or a branch with
/// sub commands.
pub struct Command {
    pub(crate) name: String,
    pub(crate) aliases: Vec<String>,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) args: Vec<Argument>,
    pub(crate) flags: Option<FlagsRef>,
    pub(crate) sticky_flags: Option<FlagsRef>,
    pub(crate) validate: Option<ValidateFn>,
    pub(crate) run: Option<RunFn>,
    pub(crate) sub_commands: Vec<Command>,
    pub(crate) group: Option<String>,
    pub(crate) examples: Vec<Example>,
    pub(crate) deprecation: Option<Deprecation>,
    pub(crate) auto_complete: Option<AutoCompleteFn>,
    pub(crate) auto_complete_extensions: Vec<String>,
    pub(crate) hidden: bool,
}

impl Command {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            title: title.into(),
            description: String::new(),
            args: Vec::new(),
            flags: None,
            sticky_flags: None,
            validate: None,
            run: None,
            sub_commands: Vec::new(),
            group: None,
            examples: Vec::new(),
            deprecation: None,
            auto_complete: None,
            auto_complete_extensions: Vec::new(),
            hidden: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn arg(mut self, arg: Argument) -> Self {
        self.args.push(arg);
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = Argument>) -> Self {
        self.args.extend(args);
        self
    }

    /// Flags visible on this command only.
    pub fn flags<F: Flags>(mut self, flags: &Shared<F>) -> Self {
        let flags: FlagsRef = flags.clone();
        self.flags = Some(flags);
        self
    }

    /// Flags visible on this command and every descendant.
    pub fn sticky_flags<F: Flags>(mut self, flags: &Shared<F>) -> Self {
        let flags: FlagsRef = flags.clone();
        self.sticky_flags = Some(flags);
        self
    }

    pub fn validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&Context, &Arguments) -> anyhow::Result<()> + 'static,
    {
        self.validate = Some(Box::new(validate));
        self
    }

    pub fn run<F>(mut self, run: F) -> Self
    where
        F: Fn(&Context, &Arguments, &Output) -> anyhow::Result<()> + 'static,
    {
        self.run = Some(Box::new(run));
        self
    }

    pub fn sub_command(mut self, command: Command) -> Self {
        self.sub_commands.push(command);
        self
    }

    pub fn sub_commands(mut self, commands: impl IntoIterator<Item = Command>) -> Self {
        self.sub_commands.extend(commands);
        self
    }

    /// Heading this command is listed under in its parent's help.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn example(mut self, description: impl Into<String>, command: impl Into<String>) -> Self {
        self.examples.push(Example {
            description: description.into(),
            command: command.into(),
        });
        self
    }

    /// Mark the command deprecated. Its body, if any, is never run.
    pub fn deprecated(mut self, deprecation: Deprecation) -> Self {
        self.deprecation = Some(deprecation);
        self
    }

    pub fn auto_complete<F>(mut self, complete: F) -> Self
    where
        F: Fn(&Context, &Arguments, &str) -> Completion + 'static,
    {
        self.auto_complete = Some(Box::new(complete));
        self
    }

    /// Complete arguments with files of these extensions. Takes precedence
    /// over [`Command::auto_complete`].
    pub fn auto_complete_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.auto_complete_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Leave the command out of help and completion. It still runs.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    fn check(&self) -> Result<(), StructuralError> {
        if self.name.trim().is_empty() {
            return Err(StructuralError::EmptyCommandName);
        }
        if names::contains_whitespace(&self.name) {
            return Err(StructuralError::CommandNameContainsSpaces(self.name.clone()));
        }

        let title = self.title.trim();
        if title.is_empty() {
            return Err(StructuralError::MissingTitle(self.name.clone()));
        }
        if title.contains('\n') {
            return Err(StructuralError::MultilineTitle(self.name.clone()));
        }

        // A deprecation marker stands in for the body.
        let has_body = self.run.is_some() || self.deprecation.is_some();
        if has_body == !self.sub_commands.is_empty() {
            return Err(StructuralError::RunOrSubCommands(self.name.clone()));
        }

        for (i, arg) in self.args.iter().enumerate() {
            if arg.name.trim().is_empty() {
                return Err(StructuralError::EmptyArgumentName(self.name.clone()));
            }
            if arg.repeatable && i != self.args.len() - 1 {
                return Err(StructuralError::MisplacedRepeatable {
                    command: self.name.clone(),
                    argument: arg.name.clone(),
                });
            }
        }

        if self.examples.iter().any(|ex| ex.description.trim().is_empty()) {
            return Err(StructuralError::ExampleMissingDescription(self.name.clone()));
        }
        Ok(())
    }

    /// `Title.` as shown in command listings.
    pub(crate) fn short_text(&self) -> String {
        let title = self.title.trim();
        if title.ends_with('.') {
            title.to_string()
        } else {
            format!("{title}.")
        }
    }

    /// Title followed by the description, or the short text when there is no
    /// description.
    pub(crate) fn long_text(&self) -> String {
        let short = self.short_text();
        let description = self.description.trim();
        if description.is_empty() {
            short
        } else {
            format!("{}\n\n{description}", short.trim_end_matches('.'))
        }
    }

    /// `name ARG [REST...]`
    pub(crate) fn usage_signature(&self) -> String {
        let mut out = self.name.clone();
        for arg in &self.args {
            out.push(' ');
            out.push_str(&arg.signature());
        }
        out
    }
}

/// The parser-side shape of a [`Command`] for one run.
pub(crate) struct Node<'c> {
    pub command: &'c Command,
    /// Application name first.
    pub path: Vec<String>,
    pub own: Scope,
    pub sticky: Scope,
    pub children: Vec<Node<'c>>,
}

impl<'c> Node<'c> {
    /// Build the subtree rooted at `command`, children first.
    pub fn build(command: &'c Command, parent: &[String]) -> Result<Self, StructuralError> {
        command.check()?;

        let mut path = parent.to_vec();
        path.push(command.name.clone());

        let mut own = Scope::default();
        if let Some(flags) = &command.flags {
            own.register(flags)?;
        }
        let mut sticky = Scope::default();
        if let Some(flags) = &command.sticky_flags {
            sticky.register(flags)?;
        }

        let children = Self::build_children(command.sub_commands.iter(), &path)?;
        if let Some(name) = duplicate_name(&children) {
            return Err(StructuralError::DuplicateCommands {
                path: path.join(" "),
                name: name.to_string(),
            });
        }

        Ok(Self {
            command,
            path,
            own,
            sticky,
            children,
        })
    }

    /// The application root. Its flags are the global flag groups.
    pub fn root(
        command: &'c Command,
        children: impl Iterator<Item = &'c Command>,
        global: Scope,
    ) -> Result<Self, StructuralError> {
        let path = vec![command.name.clone()];
        let children = Self::build_children(children, &path)?;
        if let Some(name) = duplicate_name(&children) {
            return Err(StructuralError::DuplicateApplicationCommands(name.to_string()));
        }
        Ok(Self {
            command,
            path,
            own: Scope::default(),
            sticky: global,
            children,
        })
    }

    fn build_children(
        commands: impl Iterator<Item = &'c Command>,
        path: &[String],
    ) -> Result<Vec<Self>, StructuralError> {
        commands.map(|c| Self::build(c, path)).collect()
    }

    pub fn path_string(&self) -> String {
        self.path.join(" ")
    }

    pub fn is_branch(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn find_child(&self, token: &str) -> Option<&Node<'c>> {
        self.children
            .iter()
            .find(|c| c.command.name == token)
            .or_else(|| {
                self.children
                    .iter()
                    .find(|c| c.command.aliases.iter().any(|a| a == token))
            })
    }

    pub fn visible_children(&self) -> impl Iterator<Item = &Node<'c>> {
        self.children.iter().filter(|c| !c.command.hidden)
    }

    /// Validate, intercept deprecation, then run the body.
    pub fn dispatch(&self, ctx: &Context, tokens: &[String], out: &Output) -> Result<(), Error> {
        let command = self.command;
        let args = validate::run(ctx, &command.args, tokens, command.validate.as_ref())?;

        if let Some(deprecation) = &command.deprecation {
            let app = self.path.first().map(String::as_str).unwrap_or_default();
            return Err(deprecation.signal(ctx, &args, out, app)?.into());
        }

        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match &command.run {
            Some(run) => run(ctx, &args, out).map_err(Error::Execution),
            None => Ok(()),
        }
    }
}

fn duplicate_name<'a>(children: &'a [Node<'_>]) -> Option<&'a str> {
    names::first_duplicate(children.iter().flat_map(|c| {
        std::iter::once(c.command.name.as_str()).chain(c.command.aliases.iter().map(String::as_str))
    }))
}
