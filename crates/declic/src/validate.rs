use crate::arguments::{Argument, Arguments};
use crate::context::Context;
use crate::error::{Error, UserError};

pub type ValidateFn = Box<dyn Fn(&Context, &Arguments) -> anyhow::Result<()>>;

/// Fails unless exactly `n` arguments were bound.
pub fn validate_exact_args(n: usize) -> impl Fn(&Context, &Arguments) -> anyhow::Result<()> {
    move |_, args| match exact(n, args.len()) {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

/// Fails unless at least `n` arguments were bound.
pub fn validate_min_args(n: usize) -> impl Fn(&Context, &Arguments) -> anyhow::Result<()> {
    move |_, args| match at_least(n, args.len()) {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

fn exact(n: usize, got: usize) -> Option<UserError> {
    (got != n).then(|| {
        UserError::new(format!("Expected exactly {n} argument{}, got {got}", plural(n)))
    })
}

fn at_least(n: usize, got: usize) -> Option<UserError> {
    (got < n).then(|| {
        UserError::new(format!("Expected at least {n} argument{}, got {got}", plural(n)))
    })
}

/// Check the token count against the declared arguments.
fn check_count(specs: &[Argument], got: usize) -> Option<UserError> {
    let n = specs.len();
    if n == 0 {
        return None;
    }
    if specs.last().is_some_and(|a| a.repeatable) {
        at_least(n, got)
    } else {
        exact(n, got)
    }
}

/// Count check, then the command's own validation function, then binding.
pub(crate) fn run(
    ctx: &Context,
    specs: &[Argument],
    tokens: &[String],
    validate: Option<&ValidateFn>,
) -> Result<Arguments, Error> {
    if let Some(err) = check_count(specs, tokens.len()) {
        return Err(Error::Validation(err));
    }

    let args = Arguments::bind(specs, tokens);
    if let Some(validate) = validate {
        validate(ctx, &args).map_err(|err| match err.downcast::<UserError>() {
            Ok(user) => Error::Validation(user),
            Err(other) => Error::Validation(UserError::new(format!(
                "input validation failed: {other:#}"
            ))),
        })?;
    }
    Ok(args)
}
