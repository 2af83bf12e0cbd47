//! Walks argv down the command tree.
//!
//! The flag set visible to the scanner grows as the walk descends: the current
//! node's own flags, then sticky flags from the deepest node up to the root,
//! then the built-in `--help` (and `--version` at the root).

use declic_argparse::scan::{FlagLookup, FlagRef, ScanError, Scanner, Token};
use tracing::trace;

use crate::command::Node;
use crate::error::Error;
use crate::flags::{ChangedFlags, Scope, parse_bool, with_slot};

#[derive(Clone, Copy)]
pub(crate) enum Target<'n> {
    Flag { scope: &'n Scope, spec: usize },
    Help,
    Version,
}

impl Target<'_> {
    fn long(&self) -> &str {
        match self {
            Self::Flag { scope, spec } => &scope.specs[*spec].name,
            Self::Help => "help",
            Self::Version => "version",
        }
    }

    fn short(&self) -> Option<char> {
        match self {
            Self::Flag { scope, spec } => scope.specs[*spec].short,
            Self::Help => Some('h'),
            Self::Version => None,
        }
    }

    fn takes_value(&self) -> bool {
        match self {
            Self::Flag { scope, spec } => scope.specs[*spec].kind.takes_value(),
            Self::Help | Self::Version => false,
        }
    }
}

/// The flags visible at one point of the walk, in lookup order.
pub(crate) struct Active<'n> {
    targets: Vec<Target<'n>>,
}

impl<'n> Active<'n> {
    fn new(chain: &[&'n Node<'_>]) -> Self {
        let mut targets = Vec::new();
        if let Some(&deepest) = chain.last() {
            push_scope(&mut targets, &deepest.own);
        }
        for &node in chain.iter().rev() {
            push_scope(&mut targets, &node.sticky);
        }
        targets.push(Target::Help);
        if chain.len() == 1 {
            targets.push(Target::Version);
        }
        Self { targets }
    }

    fn flag_ref(&self, id: usize) -> FlagRef {
        if self.targets[id].takes_value() {
            FlagRef::value(id)
        } else {
            FlagRef::switch(id)
        }
    }

    /// Long names in lookup order, shadowed names removed.
    pub fn long_names(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for target in &self.targets {
            let name = target.long();
            if !out.iter().any(|n| n == name) {
                out.push(name.to_string());
            }
        }
        out
    }
}

fn push_scope<'n>(targets: &mut Vec<Target<'n>>, scope: &'n Scope) {
    targets.extend((0..scope.specs.len()).map(|spec| Target::Flag { scope, spec }));
}

impl FlagLookup for Active<'_> {
    fn long(&self, name: &str) -> Option<FlagRef> {
        let id = self.targets.iter().position(|t| t.long() == name)?;
        Some(self.flag_ref(id))
    }

    fn short(&self, short: char) -> Option<FlagRef> {
        let id = self.targets.iter().position(|t| t.short() == Some(short))?;
        Some(self.flag_ref(id))
    }
}

/// Where the walk ended up.
pub(crate) struct Walk<'n, 'c> {
    /// Root first. Never empty.
    pub chain: Vec<&'n Node<'c>>,
    pub positionals: Vec<String>,
    pub help: bool,
    pub version: bool,
    pub changed: ChangedFlags,
    /// In lenient mode: the flag whose value is missing at the end of argv.
    pub pending: Option<Target<'n>>,
}

impl<'n, 'c> Walk<'n, 'c> {
    fn new(root: &'n Node<'c>) -> Self {
        Self {
            chain: vec![root],
            positionals: Vec::new(),
            help: false,
            version: false,
            changed: ChangedFlags::default(),
            pending: None,
        }
    }

    pub fn deepest(&self) -> &'n Node<'c> {
        self.chain[self.chain.len() - 1]
    }

    pub fn active(&self) -> Active<'n> {
        Active::new(&self.chain)
    }

    /// Sticky scopes along the chain plus the deepest node's own scope.
    pub fn scopes(&self) -> Vec<&'n Scope> {
        let mut scopes: Vec<&'n Scope> = self.chain.iter().map(|&n| &n.sticky).collect();
        scopes.push(&self.deepest().own);
        scopes
    }

    fn apply(&mut self, target: Target<'n>, spelling: &str, value: Option<&str>) -> Result<(), Error> {
        match target {
            Target::Help => self.help = value.map_or(Ok(true), parse_bool).map_err(Error::Usage)?,
            Target::Version => {
                self.version = value.map_or(Ok(true), parse_bool).map_err(Error::Usage)?
            }
            Target::Flag { scope, spec } => {
                let spec = &scope.specs[spec];
                let group = scope.group_of(spec);
                let first = self.changed.mark(group, &spec.name);
                let result = with_slot(group, &spec.name, |slot| slot.apply_token(value, first));
                if let Some(Err(message)) = result {
                    return Err(Error::Usage(format!(
                        "invalid argument {:?} for \"{spelling}\" flag: {message}",
                        value.unwrap_or_default()
                    )));
                }
                trace!(flag = %spec.name, ?value, "flag set from command line");
            }
        }
        Ok(())
    }

    fn unknown_command(&self, token: &str) -> Error {
        let node = self.deepest();
        Error::UnknownCommand {
            token: token.to_string(),
            path: node.path_string(),
            available: node.visible_children().map(|c| c.command.name.clone()).collect(),
        }
    }

    fn run(&mut self, argv: &[String], lenient: bool) -> Result<(), Error> {
        let mut scanner = Scanner::new(argv);
        let mut active = self.active();

        while let Some(next) = scanner.next_token(&active) {
            match next {
                Ok(Token::Flag { id, spelling, value }) => {
                    self.apply(active.targets[id], &spelling, value)?;
                }
                Ok(Token::Positional(word)) if self.deepest().is_branch() => {
                    let Some(child) = self.deepest().find_child(word) else {
                        return Err(self.unknown_command(word));
                    };
                    trace!(command = %child.command.name, "descending into command");
                    self.chain.push(child);
                    active = self.active();
                }
                Ok(Token::Positional(word)) | Ok(Token::Escaped(word)) => {
                    if self.deepest().is_branch() {
                        return Err(self.unknown_command(word));
                    }
                    self.positionals.push(word.to_string());
                }
                Err(ScanError::MissingValue { id, .. }) if lenient => {
                    self.pending = Some(active.targets[id]);
                    return Ok(());
                }
                Err(ScanError::UnknownFlag(_)) if lenient => {}
                Err(err) => return Err(Error::Usage(err.message())),
            }
        }
        Ok(())
    }
}

/// Resolve argv against the tree. The walk is returned even on failure so the
/// caller can report how far it got.
pub(crate) fn resolve<'n, 'c>(root: &'n Node<'c>, argv: &[String]) -> (Walk<'n, 'c>, Result<(), Error>) {
    let mut walk = Walk::new(root);
    let result = walk.run(argv, false);
    (walk, result)
}

/// Resolve for completion: unknown flags are skipped, flag conversion errors
/// and unknown commands end the walk where it stands.
pub(crate) fn resolve_lenient<'n, 'c>(root: &'n Node<'c>, argv: &[String]) -> Walk<'n, 'c> {
    let mut walk = Walk::new(root);
    let _ = walk.run(argv, true);
    walk
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Flags;
    use crate::command::Command;
    use crate::flags::{Count, FlagsRef, GlobalFlags, Shared, shared};

    #[derive(Debug, Default, Flags)]
    struct TeamFlags {
        #[flag(short = "t", usage = "The |team| to use.")]
        pub team: String,
    }

    #[derive(Debug, Default, Flags)]
    struct CreateFlags {
        #[flag(short = "f")]
        pub force: bool,
        pub count: u64,
    }

    struct Fixture {
        root: Command,
        commands: Vec<Command>,
        global: Shared<GlobalFlags>,
        team: Shared<TeamFlags>,
        create: Shared<CreateFlags>,
    }

    fn fixture() -> Fixture {
        let team = shared(TeamFlags::default());
        let create = shared(CreateFlags::default());
        let commands = vec![
            Command::new("cmd", "Cmd")
                .alias("c")
                .sticky_flags(&team)
                .sub_command(
                    Command::new("create", "Create")
                        .flags(&create)
                        .run(|_, _, _| Ok(())),
                )
                .sub_command(Command::new("hidden", "Hidden").hidden().run(|_, _, _| Ok(()))),
            Command::new("leaf", "Leaf").run(|_, _, _| Ok(())),
        ];
        Fixture {
            root: Command::new("app", "App"),
            commands,
            global: shared(GlobalFlags::default()),
            team,
            create,
        }
    }

    fn tree(f: &Fixture) -> Node<'_> {
        let mut global = Scope::default();
        let group: FlagsRef = f.global.clone();
        global.register(&group).unwrap();
        Node::root(&f.root, f.commands.iter(), global).unwrap()
    }

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn path(walk: &Walk<'_, '_>) -> String {
        walk.deepest().path_string()
    }

    #[test]
    fn descends_and_binds_flags_at_every_level() {
        let f = fixture();
        let root = tree(&f);
        let (walk, result) = resolve(&root, &argv(&["-vv", "c", "--team", "core", "create", "-f", "x", "--count=3"]));
        result.unwrap();
        assert_eq!(path(&walk), "app cmd create");
        assert_eq!(walk.positionals, ["x"]);
        assert_eq!(f.global.borrow().verbose, Count(2));
        assert_eq!(f.team.borrow().team, "core");
        assert!(f.create.borrow().force);
        assert_eq!(f.create.borrow().count, 3);
    }

    #[test]
    fn own_flags_are_not_visible_to_children_or_parents() {
        let f = fixture();
        let root = tree(&f);
        let (_, result) = resolve(&root, &argv(&["cmd", "--force", "create"]));
        match result {
            Err(Error::Usage(msg)) => assert_eq!(msg, "unknown flag: --force"),
            other => panic!("expected Usage, got: {other:?}"),
        }
    }

    #[test]
    fn unknown_command_keeps_matched_path() {
        let f = fixture();
        let root = tree(&f);
        let (walk, result) = resolve(&root, &argv(&["cmd", "bogus"]));
        assert_eq!(path(&walk), "app cmd");
        match result {
            Err(Error::UnknownCommand { token, path, available }) => {
                assert_eq!(token, "bogus");
                assert_eq!(path, "app cmd");
                assert_eq!(available, ["create"]);
            }
            other => panic!("expected UnknownCommand, got: {other:?}"),
        }
    }

    #[test]
    fn hidden_commands_still_resolve() {
        let f = fixture();
        let root = tree(&f);
        let (walk, result) = resolve(&root, &argv(&["cmd", "hidden"]));
        result.unwrap();
        assert_eq!(path(&walk), "app cmd hidden");
    }

    #[test]
    fn separator_escapes_flag_like_words() {
        let f = fixture();
        let root = tree(&f);
        let (walk, result) = resolve(&root, &argv(&["leaf", "--", "-v", "--team"]));
        result.unwrap();
        assert_eq!(walk.positionals, ["-v", "--team"]);
        assert_eq!(f.global.borrow().verbose, Count(0));
    }

    #[test]
    fn version_only_at_root_and_help_everywhere() {
        let f = fixture();
        let root = tree(&f);
        let (walk, result) = resolve(&root, &argv(&["--version"]));
        result.unwrap();
        assert!(walk.version);

        let (_, result) = resolve(&root, &argv(&["leaf", "--version"]));
        assert!(matches!(result, Err(Error::Usage(_))));

        let (walk, result) = resolve(&root, &argv(&["cmd", "create", "-h"]));
        result.unwrap();
        assert!(walk.help);
    }

    #[test]
    fn invalid_and_missing_values_are_usage_errors() {
        let f = fixture();
        let root = tree(&f);
        let (_, result) = resolve(&root, &argv(&["cmd", "create", "--count", "many"]));
        match result {
            Err(Error::Usage(msg)) => {
                assert!(msg.starts_with("invalid argument \"many\" for \"--count\" flag:"), "{msg}")
            }
            other => panic!("expected Usage, got: {other:?}"),
        }

        let (_, result) = resolve(&root, &argv(&["cmd", "--team"]));
        match result {
            Err(Error::Usage(msg)) => assert_eq!(msg, "flag needs an argument: --team"),
            other => panic!("expected Usage, got: {other:?}"),
        }
    }

    #[test]
    fn lenient_walk_reports_pending_flag() {
        let f = fixture();
        let root = tree(&f);
        let walk = resolve_lenient(&root, &argv(&["cmd", "--bogus", "create", "-t"]));
        assert_eq!(path(&walk), "app cmd create");
        match walk.pending {
            Some(target) => assert_eq!(target.long(), "team"),
            None => panic!("expected a pending flag"),
        }
    }

    #[test]
    fn active_names_follow_lookup_order() {
        let f = fixture();
        let root = tree(&f);
        let walk = resolve_lenient(&root, &argv(&["cmd", "create"]));
        assert_eq!(
            walk.active().long_names(),
            ["force", "count", "team", "verbose", "no-colors", "config", "help"]
        );
    }
}
