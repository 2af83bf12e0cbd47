//! Commands kept for old scripts. Each one forwards to its successor.

use declic::{Argument, Command, Deprecation, Redirect};

pub(crate) fn commands() -> Vec<Command> {
    vec![
        Command::new("command-v1", "First version of the command")
            .hidden()
            .deprecated(
                Deprecation::with_replacement(["command-v2", "from-v1"]).redirect(Redirect::Always),
            ),
        Command::new("command-v2", "Second version of the command")
            .hidden()
            .arg(Argument::new("foo"))
            .deprecated(
                Deprecation::with_replacement_fn(|_, args| {
                    vec!["command-v3".to_string(), format!("value-for-{}", args.get("foo"))]
                })
                .redirect(Redirect::Confirm),
            ),
        Command::new("command-v3", "Current version of the command")
            .arg(Argument::new("bar"))
            .run(|_, args, out| {
                out.println(format_args!("bar: {}", args.get("bar")));
                Ok(())
            }),
        Command::new("command-v0", "Retired command")
            .hidden()
            .deprecated(Deprecation::without_replacement()),
    ]
}
