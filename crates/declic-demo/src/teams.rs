use std::any::Any;

use anyhow::bail;
use declic::{
    Argument, Command, Completion, CompletionRequest, FlagValue, Flags, Output, Shared, shared,
};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
struct Team {
    name: &'static str,
    lead: &'static str,
    members: Vec<&'static str>,
}

fn directory() -> Vec<Team> {
    vec![
        Team {
            name: "core",
            lead: "alice",
            members: vec!["alice", "bob"],
        },
        Team {
            name: "platform",
            lead: "carol",
            members: vec!["carol", "dave", "erin"],
        },
    ]
}

const FORMATS: &[&str] = &["json", "table", "yaml"];

fn complete_format(request: &CompletionRequest<'_>, _flags: &dyn Any) -> Option<Completion> {
    Some(Completion::new(
        FORMATS.iter().filter(|f| f.starts_with(request.to_complete)).copied(),
    ))
}

#[derive(Debug, FlagValue)]
#[flag_value(complete = complete_format)]
struct Format(String);

impl Default for Format {
    fn default() -> Self {
        Self("table".to_string())
    }
}

#[derive(Debug, Default, Flags)]
struct OutputFlags {
    #[flag(short = "o", usage = "Output |format|: table, json or yaml.")]
    pub output: Format,
}

fn print(out: &Output, format: &str, teams: &[Team]) -> anyhow::Result<()> {
    match format {
        "json" => out.json_pretty(teams)?,
        "yaml" => out.yaml(teams)?,
        "table" => {
            let mut rows = vec![vec!["Name".to_string(), "Lead".to_string(), "Members".to_string()]];
            rows.extend(teams.iter().map(|t| {
                vec![t.name.to_string(), t.lead.to_string(), t.members.len().to_string()]
            }));
            out.table(&rows)?;
        }
        other => bail!("unsupported output format {other:?}, expected one of: {}", FORMATS.join(", ")),
    }
    Ok(())
}

fn list(flags: &Shared<OutputFlags>) -> Command {
    let flags = flags.clone();
    Command::new("list", "List teams").alias("ls").run(move |_, _, out| {
        print(out, &flags.borrow().output.0, &directory())
    })
}

fn show(flags: &Shared<OutputFlags>) -> Command {
    let flags = flags.clone();
    Command::new("show", "Show one team")
        .arg(Argument::new("team"))
        .auto_complete(|_, args, partial| {
            if !args.is_empty() {
                return Completion::default();
            }
            Completion::new(
                directory()
                    .into_iter()
                    .map(|t| t.name)
                    .filter(|name| name.starts_with(partial)),
            )
        })
        .run(move |_, args, out| {
            let wanted = args.get("team");
            let Some(team) = directory().into_iter().find(|t| t.name == wanted) else {
                bail!("no team named {wanted:?}");
            };
            print(out, &flags.borrow().output.0, &[team])
        })
}

pub(crate) fn command() -> Command {
    let flags = shared(OutputFlags::default());
    Command::new("team", "Inspect teams")
        .group("Organization")
        .sticky_flags(&flags)
        .sub_commands([list(&flags), show(&flags)])
}
