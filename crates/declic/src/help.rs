use declic_argparse::help::{self, Example, FlagRow, HelpDoc, Row, Section};

use crate::command::Node;
use crate::flags::Scope;

fn flag_rows(scope: &Scope) -> impl Iterator<Item = Row> + '_ {
    scope.specs.iter().map(|spec| {
        FlagRow {
            short: spec.short,
            long: spec.name.clone(),
            value_name: spec.value_name.clone(),
            usage: spec.usage.clone(),
            default: spec.default.clone(),
        }
        .to_row()
    })
}

fn command_sections(node: &Node<'_>) -> Vec<Section> {
    let mut groups: Vec<Section> = Vec::new();
    let mut ungrouped: Vec<Row> = Vec::new();
    for child in node.visible_children() {
        let row = Row::new(child.command.name.clone(), child.command.short_text());
        match &child.command.group {
            Some(title) => match groups.iter_mut().find(|s| &s.title == title) {
                Some(section) => section.rows.push(row),
                None => groups.push(Section {
                    title: title.clone(),
                    rows: vec![row],
                }),
            },
            None => ungrouped.push(row),
        }
    }

    let title = if groups.is_empty() {
        "Available Commands"
    } else {
        "Additional Commands"
    };
    groups.push(Section {
        title: title.to_string(),
        rows: ungrouped,
    });
    groups
}

/// Help page for the deepest node of `chain` (root first).
pub(crate) fn render(chain: &[&Node<'_>]) -> String {
    let Some((&node, ancestors)) = chain.split_last() else {
        return String::new();
    };
    let command = node.command;
    let path = node.path_string();
    let is_root = ancestors.is_empty();

    let usage = if node.is_branch() {
        format!("{path} [command]")
    } else {
        let signature = command.usage_signature();
        let prefix = ancestors.iter().map(|n| n.command.name.as_str()).collect::<Vec<_>>();
        if prefix.is_empty() {
            format!("{signature} [flags]")
        } else {
            format!("{} {signature} [flags]", prefix.join(" "))
        }
    };

    let aliases = if command.aliases.is_empty() {
        Vec::new()
    } else {
        std::iter::once(command.name.clone())
            .chain(command.aliases.iter().cloned())
            .collect()
    };

    let examples = command
        .examples
        .iter()
        .map(|ex| Example {
            description: ex.description.clone(),
            command: format!("{path} {}", ex.command.trim()),
        })
        .collect();

    let mut sections = if node.is_branch() {
        command_sections(node)
    } else {
        Vec::new()
    };

    let mut flags: Vec<Row> = flag_rows(&node.own).chain(flag_rows(&node.sticky)).collect();
    flags.push(Row::new("-h, --help", format!("help for {}", command.name)));
    if is_root {
        flags.push(Row::new("    --version", format!("version for {}", command.name)));
    }
    sections.push(Section {
        title: "Flags".to_string(),
        rows: flags,
    });
    sections.push(Section {
        title: "Global Flags".to_string(),
        rows: ancestors.iter().rev().flat_map(|n| flag_rows(&n.sticky)).collect(),
    });

    let footer = node
        .is_branch()
        .then(|| format!("Use \"{path} [command] -h\" for more information about a command."));

    help::render(&HelpDoc {
        about: command.long_text(),
        usage: vec![usage],
        aliases,
        examples,
        sections,
        footer,
    })
}
