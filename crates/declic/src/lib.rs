//! Declarative command trees for command-line applications.
//!
//! An [`Application`] owns a tree of [`Command`] nodes. Running it walks argv
//! down the tree, merges flag values from the config file and environment,
//! binds positional [`Arguments`], validates them and finally calls the body of
//! the matched leaf.
//!
//! ```ignore
//! use declic::{Application, Argument, Command, Context};
//!
//! let mut app = Application::new("app", "Example application", "v1.0.0")?;
//! app.add_command(
//!     Command::new("greet", "Greet a user")
//!         .arg(Argument::new("user_name"))
//!         .run(|_ctx, args, out| {
//!             out.println(format_args!("Hello, {}!", args.get("user_name").to_uppercase()));
//!             Ok(())
//!         }),
//! )?;
//! app.run(&Context::new(), std::env::args().skip(1))?;
//! ```

extern crate self as declic;

mod application;
mod arguments;
mod command;
mod complete;
mod config;
mod context;
mod deprecated;
pub mod duration;
mod error;
mod flags;
mod help;
mod merge;
mod output;
mod resolve;
mod validate;

pub use application::Application;
pub use arguments::{Argument, Arguments};
pub use command::{AutoCompleteFn, Command, Example, RunFn};
pub use complete::{Completion, CompletionRequest};
pub use config::{ConfigError, ConfigStore, Settings};
pub use context::{CancelHandle, Context};
pub use deprecated::{DeprecatedCommand, Deprecation, Redirect, ReplacementFn};
pub use error::{Error, StructuralError, UserError};
pub use flags::{
    Count, FlagField, FlagKind, FlagSlot, FlagString, FlagValue, FlagVisitor, Flags, FlagsRef,
    GlobalFlags, IntValue, Shared, StringList, UintValue, shared,
};
pub use output::{Buffer, FixedAnswer, Output, OutputError, Prompter, StdinPrompter, Verbosity};
pub use validate::{ValidateFn, validate_exact_args, validate_min_args};

/// Derive macros for [`Flags`] records and [`FlagValue`] wrappers.
pub use declic_macros::{FlagValue, Flags};

pub type Result<T, E = Error> = std::result::Result<T, E>;
