use thiserror::Error;

use crate::config::ConfigError;
use crate::deprecated::DeprecatedCommand;
use crate::output::OutputError;

/// A mistake in how the command tree was declared.
///
/// These are raised while the tree is built and are never reformatted for end
/// users.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("application name {0:?} must be non-empty and must not contain whitespace")]
    InvalidApplicationName(String),
    #[error("application {0:?} is missing a title")]
    MissingApplicationTitle(String),
    #[error("application version {version:?} is not a valid semantic version prefixed with \"v\": {reason}")]
    InvalidVersion { version: String, reason: String },
    #[error("the application must have at least one command")]
    NoCommands,
    #[error("the application contains duplicate commands and/or aliases: {0:?}")]
    DuplicateApplicationCommands(String),

    #[error("command name cannot be empty")]
    EmptyCommandName,
    #[error("command name {0:?} contain spaces")]
    CommandNameContainsSpaces(String),
    #[error("command {0:?} is missing a title")]
    MissingTitle(String),
    #[error("title for command {0:?} contains newline")]
    MultilineTitle(String),
    #[error("exactly one of a run function or sub commands must be set for command: {0}")]
    RunOrSubCommands(String),
    #[error("argument name cannot be empty for command {0:?}")]
    EmptyArgumentName(String),
    #[error("a repeatable argument ({argument:?}) must be the last argument for command {command:?}")]
    MisplacedRepeatable { command: String, argument: String },
    #[error("example for command {0:?} is missing description")]
    ExampleMissingDescription(String),
    #[error("command {path:?} contains duplicate commands and/or aliases: {name:?}")]
    DuplicateCommands { path: String, name: String },

    #[error("flag name cannot be empty")]
    EmptyFlagName,
    #[error("failed to setup flag {name:?}: short flag must be a single character, got {short:?}")]
    InvalidShortFlag { name: String, short: String },
    #[error("duplicate flag name: {0:?}")]
    DuplicateFlag(String),
    #[error("duplicate short flag -{short} for flags {first:?} and {second:?}")]
    DuplicateShortFlag {
        short: char,
        first: String,
        second: String,
    },

    #[error("deprecated command {0:?} redirects back into itself")]
    DeprecationCycle(String),
}

/// An error meant to be shown to the end user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct UserError {
    message: String,
}

impl UserError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Everything [`Application::run`](crate::Application::run) can fail with.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    /// Wrong number of arguments or a failed validation function.
    #[error(transparent)]
    Validation(UserError),

    /// Problems with flag tokens: unknown flags, missing or malformed values.
    #[error("{0}")]
    Usage(String),

    #[error("{}", unknown_command_message(.token, .path, .available))]
    UnknownCommand {
        token: String,
        path: String,
        available: Vec<String>,
    },

    #[error("{path:?} requires a subcommand")]
    MissingCommand { path: String, available: Vec<String> },

    #[error(transparent)]
    Deprecated(#[from] DeprecatedCommand),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("the execution was cancelled")]
    Cancelled,

    /// Returned by a command body; never rewritten.
    #[error(transparent)]
    Execution(anyhow::Error),
}

impl Error {
    /// Whether the error comes from the way the tree was declared rather
    /// than from user input.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structural(_))
    }
}

fn unknown_command_message(token: &str, path: &str, available: &[String]) -> String {
    let mut msg = format!(
        "unknown command \"{token}\" for \"{path}\"\n\nUsage:\n  {path} <command> [flags]\n"
    );
    if !available.is_empty() {
        msg.push_str("\nAvailable commands:\n");
        for name in available {
            msg.push_str(&format!("  {name}\n"));
        }
    }
    msg.push_str(&format!("\nUse \"{path} -h\" for more information."));
    msg
}
