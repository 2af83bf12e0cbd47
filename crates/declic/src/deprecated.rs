//! Deprecation markers and the signal a deprecated command raises instead of
//! running.

use std::fmt;

use tracing::debug;

use crate::arguments::Arguments;
use crate::context::Context;
use crate::output::{Output, OutputError};

/// Computes replacement tokens from the arguments the deprecated command got.
/// The tokens exclude the application name.
pub type ReplacementFn = Box<dyn Fn(&Context, &Arguments) -> Vec<String>>;

/// Whether invoking a deprecated command re-runs its replacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Redirect {
    /// Report the deprecation and stop.
    #[default]
    Never,
    /// Run the replacement without asking.
    Always,
    /// Ask through the output prompter first.
    Confirm,
}

enum Replacement {
    None,
    Static(Vec<String>),
    Dynamic(ReplacementFn),
}

pub struct Deprecation {
    replacement: Replacement,
    redirect: Redirect,
}

impl Deprecation {
    pub fn without_replacement() -> Self {
        Self {
            replacement: Replacement::None,
            redirect: Redirect::Never,
        }
    }

    /// `tokens` is the replacement command path with its arguments and flags,
    /// e.g. `["new-command", "arg", "--flag", "value"]`.
    pub fn with_replacement<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replacement: Replacement::Static(tokens.into_iter().map(Into::into).collect()),
            redirect: Redirect::Never,
        }
    }

    pub fn with_replacement_fn<F>(replacement: F) -> Self
    where
        F: Fn(&Context, &Arguments) -> Vec<String> + 'static,
    {
        Self {
            replacement: Replacement::Dynamic(Box::new(replacement)),
            redirect: Redirect::Never,
        }
    }

    pub fn redirect(mut self, redirect: Redirect) -> Self {
        self.redirect = redirect;
        self
    }

    pub(crate) fn signal(
        &self,
        ctx: &Context,
        args: &Arguments,
        out: &Output,
        app: &str,
    ) -> Result<DeprecatedCommand, OutputError> {
        let replacement = match &self.replacement {
            Replacement::None => Vec::new(),
            Replacement::Static(tokens) => tokens.clone(),
            Replacement::Dynamic(build) => build(ctx, args),
        };

        let execute_replacement = !replacement.is_empty()
            && match self.redirect {
                Redirect::Never => false,
                Redirect::Always => true,
                Redirect::Confirm => out.confirm(format_args!(
                    "Do you want to run {:?} instead?",
                    format!("{app} {}", replacement.join(" "))
                ))?,
            };
        debug!(?replacement, execute_replacement, "deprecated command invoked");

        Ok(DeprecatedCommand {
            replacement,
            execute_replacement,
        })
    }
}

impl fmt::Debug for Deprecation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let replacement = match &self.replacement {
            Replacement::None => "none",
            Replacement::Static(_) => "static",
            Replacement::Dynamic(_) => "dynamic",
        };
        f.debug_struct("Deprecation")
            .field("replacement", &replacement)
            .field("redirect", &self.redirect)
            .finish()
    }
}

/// Raised when a deprecated command is invoked.
///
/// When returned from [`Application::run`](crate::Application::run) the
/// replacement starts with the application name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprecatedCommand {
    pub replacement: Vec<String>,
    pub execute_replacement: bool,
}

impl fmt::Display for DeprecatedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("the command is deprecated")?;
        if self.replacement.is_empty() {
            f.write_str(" and has no replacement")
        } else {
            write!(f, ", please use {:?} instead", self.replacement.join(" "))
        }
    }
}

impl std::error::Error for DeprecatedCommand {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arguments::Argument;
    use crate::output::{Buffer, FixedAnswer};

    fn signal(deprecation: &Deprecation, out: &Output) -> DeprecatedCommand {
        let args = Arguments::bind(&[Argument::new("name")], &["x".to_string()]);
        deprecation.signal(&Context::new(), &args, out, "app").unwrap()
    }

    #[test]
    fn messages() {
        let none = DeprecatedCommand {
            replacement: Vec::new(),
            execute_replacement: false,
        };
        assert_eq!(none.to_string(), "the command is deprecated and has no replacement");

        let some = DeprecatedCommand {
            replacement: vec!["app".into(), "new".into(), "x".into()],
            execute_replacement: false,
        };
        assert_eq!(some.to_string(), "the command is deprecated, please use \"app new x\" instead");
    }

    #[test]
    fn dynamic_replacement_sees_arguments() {
        let deprecation = Deprecation::with_replacement_fn(|_, args| {
            vec!["v3".to_string(), format!("value-for-{}", args.get("name"))]
        })
        .redirect(Redirect::Always);
        let (out, _) = Output::buffered();
        let signal = signal(&deprecation, &out);
        assert_eq!(signal.replacement, ["v3", "value-for-x"]);
        assert!(signal.execute_replacement);
    }

    #[test]
    fn never_redirect_and_missing_replacement_do_not_execute() {
        let (out, _) = Output::buffered();
        assert!(!signal(&Deprecation::with_replacement(["v2"]), &out).execute_replacement);
        let none = Deprecation::without_replacement().redirect(Redirect::Always);
        assert!(!signal(&none, &out).execute_replacement);
    }

    #[test]
    fn confirm_asks_the_prompter() {
        let deprecation = Deprecation::with_replacement(["v2", "arg"]).redirect(Redirect::Confirm);

        let buffer = Buffer::new();
        let yes = Output::new(buffer.clone()).with_prompter(FixedAnswer::yes());
        assert!(signal(&deprecation, &yes).execute_replacement);
        assert_eq!(buffer.contents(), "Do you want to run \"app v2 arg\" instead? [y/N] \n");

        let no = Output::new(Buffer::new()).with_prompter(FixedAnswer::no());
        assert!(!signal(&deprecation, &no).execute_replacement);
    }
}
