//! Runtime side of shell completion.
//!
//! Generated shell scripts call `<app> __complete <words...>`; the last word is
//! the one being completed and may be empty. The reply is one candidate per
//! line, an optional `_activeHelp_` line and a final `:<directive>` line.

use std::fmt::Write as _;

use declic_argparse::names;

use crate::arguments::Arguments;
use crate::command::Node;
use crate::context::Context;
use crate::flags::{self, FlagSpec};
use crate::resolve::{self, Target};

/// Hidden root token that switches a run into completion mode.
pub(crate) const COMPLETE_TOKEN: &str = "__complete";

/// What a completer sees.
pub struct CompletionRequest<'a> {
    pub context: &'a Context,
    pub args: &'a Arguments,
    /// The partial word under the cursor.
    pub to_complete: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub suggestions: Vec<String>,
    /// Hint shown by shells that support active help. Empty for none.
    pub active_help: String,
}

impl Completion {
    pub fn new<I, S>(suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suggestions: suggestions.into_iter().map(Into::into).collect(),
            active_help: String::new(),
        }
    }

    pub fn with_active_help(mut self, help: impl Into<String>) -> Self {
        self.active_help = help.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Directive {
    /// Let the shell fall back to file completion.
    Default = 0,
    NoFileComp = 4,
    /// Candidates are file extensions to filter by.
    FilterFileExt = 8,
}

pub(crate) fn render(completion: &Completion, directive: Directive) -> String {
    let mut out = String::new();
    for suggestion in &completion.suggestions {
        let _ = writeln!(out, "{suggestion}");
    }
    if !completion.active_help.is_empty() {
        let _ = writeln!(out, "_activeHelp_ {}", completion.active_help);
    }
    let _ = writeln!(out, ":{}", directive as u8);
    out
}

fn files(extensions: &[String]) -> (Completion, Directive) {
    let mut extensions = extensions.to_vec();
    extensions.sort();
    let patterns: Vec<String> = extensions.iter().map(|e| format!("*.{e}")).collect();
    let help = match patterns.split_last() {
        None => "Select a file.".to_string(),
        Some((last, [])) => format!("Select a file ({last})."),
        Some((last, rest)) => format!("Select a file ({} or {last}).", rest.join(", ")),
    };
    (Completion::new(extensions).with_active_help(help), Directive::FilterFileExt)
}

/// Complete `words`, the tokens typed after the application name.
pub(crate) fn complete(root: &Node<'_>, ctx: &Context, words: &[String]) -> (Completion, Directive) {
    let (partial, typed) = match words.split_last() {
        Some((last, rest)) => (last.as_str(), rest),
        None => ("", words),
    };
    let walk = resolve::resolve_lenient(root, typed);
    let node = walk.deepest();
    let args = Arguments::bind(&node.command.args, &walk.positionals);
    let request = CompletionRequest {
        context: ctx,
        args: &args,
        to_complete: partial,
    };

    if let Some(Target::Flag { scope, spec }) = walk.pending {
        return complete_flag_value(scope.group_of(&scope.specs[spec]), &scope.specs[spec], &request);
    }

    if partial.starts_with('-') {
        let candidates = walk.active().long_names().into_iter().map(|n| format!("--{n}"));
        return (
            Completion::new(names::filter_prefixed(candidates, partial, &[])),
            Directive::NoFileComp,
        );
    }

    if node.is_branch() {
        let suggestions = node
            .visible_children()
            .filter(|c| c.command.name.starts_with(partial))
            .map(|c| format!("{}\t{}", c.command.name, c.command.short_text()))
            .collect::<Vec<_>>();
        return (Completion::new(suggestions), Directive::NoFileComp);
    }

    let command = node.command;
    if !command.auto_complete_extensions.is_empty() {
        return files(&command.auto_complete_extensions);
    }
    match &command.auto_complete {
        Some(complete) => (complete(ctx, &args, partial), Directive::NoFileComp),
        None => (Completion::default(), Directive::NoFileComp),
    }
}

fn complete_flag_value(
    group: &flags::FlagsRef,
    spec: &FlagSpec,
    request: &CompletionRequest<'_>,
) -> (Completion, Directive) {
    if let Some(extensions) = &spec.file_extensions {
        return files(extensions);
    }

    let present = flags::with_slot(group, &spec.name, |slot| slot.current_values()).unwrap_or_default();
    let record = group.borrow();
    let root: &dyn std::any::Any = &*record;
    match record.complete_flag(&spec.name, request, root) {
        Some(mut completion) => {
            completion.suggestions.retain(|s| !present.contains(s));
            (completion, Directive::NoFileComp)
        }
        None => (Completion::default(), Directive::Default),
    }
}
