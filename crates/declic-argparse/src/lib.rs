//! Incremental argv scanning and help rendering.
//!
//! This crate has no dependencies and knows nothing about command trees. The
//! engine in `declic` drives it:
//! - [`scan::Scanner`] yields one token at a time, asking a [`scan::FlagLookup`]
//!   which flags are active *right now* (the set grows as the walk descends)
//! - [`help::render`] lays out cobra-style help pages with aligned columns
//! - [`names`] holds the small name checks shared by tree validation

pub mod scan {
    use std::fmt;

    /// Whether a flag consumes a value.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Arity {
        /// `--flag` on its own; `--flag=value` is still accepted (e.g. `--force=false`).
        Switch,
        /// `--flag value`, `--flag=value`, `-f value`, `-fvalue`.
        Value,
    }

    /// A flag resolved by a [`FlagLookup`]. `id` is opaque to the scanner.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FlagRef {
        pub id: usize,
        pub arity: Arity,
    }

    impl FlagRef {
        pub fn switch(id: usize) -> Self {
            Self {
                id,
                arity: Arity::Switch,
            }
        }

        pub fn value(id: usize) -> Self {
            Self {
                id,
                arity: Arity::Value,
            }
        }
    }

    /// Currently visible flags.
    pub trait FlagLookup {
        /// Resolve a long name (without the leading `--`).
        fn long(&self, name: &str) -> Option<FlagRef>;
        /// Resolve a single-character short form.
        fn short(&self, short: char) -> Option<FlagRef>;
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Token<'a> {
        Flag {
            id: usize,
            /// How the user spelled it (`--team`, `-t`), for error messages.
            spelling: String,
            value: Option<&'a str>,
        },
        /// A bare word seen while flags are still being parsed.
        Positional(&'a str),
        /// A word after the `--` separator.
        Escaped(&'a str),
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ScanError {
        UnknownFlag(String),
        MissingValue { id: usize, spelling: String },
    }

    impl ScanError {
        pub fn message(&self) -> String {
            match self {
                Self::UnknownFlag(flag) => format!("unknown flag: {flag}"),
                Self::MissingValue { spelling, .. } => {
                    format!("flag needs an argument: {spelling}")
                }
            }
        }
    }

    impl fmt::Display for ScanError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.message())
        }
    }

    impl std::error::Error for ScanError {}

    /// Pull-based argv scanner.
    ///
    /// The lookup is passed on every call instead of being stored, so the
    /// caller can swap the active flag set between tokens.
    #[derive(Debug, Clone)]
    pub struct Scanner<'a> {
        argv: &'a [String],
        index: usize,
        /// Byte offset of the next short flag inside `argv[index]` while a
        /// cluster like `-vvf` is being expanded.
        cluster: Option<usize>,
        escaped: bool,
    }

    impl<'a> Scanner<'a> {
        pub fn new(argv: &'a [String]) -> Self {
            Self {
                argv,
                index: 0,
                cluster: None,
                escaped: false,
            }
        }

        pub fn is_done(&self) -> bool {
            self.cluster.is_none() && self.index >= self.argv.len()
        }

        /// Whether `--` has been consumed.
        pub fn is_escaped(&self) -> bool {
            self.escaped
        }

        pub fn next_token(
            &mut self,
            lookup: &dyn FlagLookup,
        ) -> Option<Result<Token<'a>, ScanError>> {
            if let Some(offset) = self.cluster {
                return Some(self.short(lookup, offset));
            }

            let argv = self.argv;
            let arg = argv.get(self.index)?.as_str();

            if self.escaped {
                self.index += 1;
                return Some(Ok(Token::Escaped(arg)));
            }

            if arg == "--" {
                self.escaped = true;
                self.index += 1;
                return self.next_token(lookup);
            }

            if let Some(body) = arg.strip_prefix("--") {
                self.index += 1;
                return Some(self.long(lookup, body));
            }

            // `-` alone is a positional (conventionally stdin).
            if arg.len() > 1 && arg.starts_with('-') {
                return Some(self.short(lookup, 1));
            }

            self.index += 1;
            Some(Ok(Token::Positional(arg)))
        }

        fn take_next(&mut self) -> Option<&'a str> {
            let argv = self.argv;
            let value = argv.get(self.index)?;
            self.index += 1;
            Some(value.as_str())
        }

        fn long(&mut self, lookup: &dyn FlagLookup, body: &'a str) -> Result<Token<'a>, ScanError> {
            let (name, attached) = match body.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (body, None),
            };
            let spelling = format!("--{name}");
            let Some(flag) = lookup.long(name) else {
                return Err(ScanError::UnknownFlag(spelling));
            };

            let value = match (flag.arity, attached) {
                (_, Some(value)) => Some(value),
                (Arity::Switch, None) => None,
                (Arity::Value, None) => match self.take_next() {
                    Some(value) => Some(value),
                    None => {
                        return Err(ScanError::MissingValue {
                            id: flag.id,
                            spelling,
                        });
                    }
                },
            };

            Ok(Token::Flag {
                id: flag.id,
                spelling,
                value,
            })
        }

        // Short flags: -v, -o value, -abc, -ofile, -o=file
        fn short(&mut self, lookup: &dyn FlagLookup, offset: usize) -> Result<Token<'a>, ScanError> {
            let argv = self.argv;
            let arg = argv[self.index].as_str();
            let Some(c) = arg[offset..].chars().next() else {
                self.end_cluster();
                return Err(ScanError::UnknownFlag(arg.to_string()));
            };
            let spelling = format!("-{c}");
            let tail = &arg[offset + c.len_utf8()..];

            let Some(flag) = lookup.short(c) else {
                self.end_cluster();
                return Err(ScanError::UnknownFlag(spelling));
            };

            match flag.arity {
                Arity::Switch => {
                    if let Some(value) = tail.strip_prefix('=') {
                        self.end_cluster();
                        return Ok(Token::Flag {
                            id: flag.id,
                            spelling,
                            value: Some(value),
                        });
                    }
                    if tail.is_empty() {
                        self.end_cluster();
                    } else {
                        self.cluster = Some(offset + c.len_utf8());
                    }
                    Ok(Token::Flag {
                        id: flag.id,
                        spelling,
                        value: None,
                    })
                }
                Arity::Value => {
                    self.end_cluster();
                    if !tail.is_empty() {
                        let value = tail.strip_prefix('=').unwrap_or(tail);
                        return Ok(Token::Flag {
                            id: flag.id,
                            spelling,
                            value: Some(value),
                        });
                    }
                    match self.take_next() {
                        Some(value) => Ok(Token::Flag {
                            id: flag.id,
                            spelling,
                            value: Some(value),
                        }),
                        None => Err(ScanError::MissingValue {
                            id: flag.id,
                            spelling,
                        }),
                    }
                }
            }
        }

        fn end_cluster(&mut self) {
            self.cluster = None;
            self.index += 1;
        }
    }
}

pub mod help {
    /// One left/right row of a help section.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Row {
        pub left: String,
        pub right: String,
    }

    impl Row {
        pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
            Self {
                left: left.into(),
                right: right.into(),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Section {
        pub title: String,
        pub rows: Vec<Row>,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Example {
        pub description: String,
        pub command: String,
    }

    /// Flag description used to build a flag row.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct FlagRow {
        pub short: Option<char>,
        pub long: String,
        pub value_name: Option<String>,
        pub usage: String,
        pub default: Option<String>,
    }

    impl FlagRow {
        pub fn to_row(&self) -> Row {
            let mut left = match self.short {
                Some(c) => format!("-{c}, --{}", self.long),
                None => format!("    --{}", self.long),
            };
            if let Some(value_name) = &self.value_name {
                left.push(' ');
                left.push_str(value_name);
            }

            let mut right = self.usage.trim().to_string();
            if let Some(default) = &self.default {
                if !right.is_empty() {
                    right.push(' ');
                }
                right.push_str(&format!("(default {default})"));
            }
            Row { left, right }
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct HelpDoc {
        pub about: String,
        pub usage: Vec<String>,
        pub aliases: Vec<String>,
        pub examples: Vec<Example>,
        pub sections: Vec<Section>,
        pub footer: Option<String>,
    }

    /// Render rows with the left column padded to the widest entry.
    pub fn render_rows(rows: &[Row]) -> String {
        let width = rows
            .iter()
            .map(|r| r.left.chars().count())
            .max()
            .unwrap_or(0);
        let mut out = String::new();
        for row in rows {
            if row.right.is_empty() {
                out.push_str(&format!("  {}\n", row.left));
            } else {
                out.push_str(&format!("  {:width$}   {}\n", row.left, row.right, width = width));
            }
        }
        out
    }

    pub fn render(doc: &HelpDoc) -> String {
        let mut blocks: Vec<String> = Vec::new();

        if !doc.about.trim().is_empty() {
            blocks.push(format!("{}\n", doc.about.trim_end()));
        }

        if !doc.usage.is_empty() {
            let mut block = String::from("Usage:\n");
            for line in &doc.usage {
                block.push_str(&format!("  {line}\n"));
            }
            blocks.push(block);
        }

        if !doc.aliases.is_empty() {
            blocks.push(format!("Aliases:\n  {}\n", doc.aliases.join(", ")));
        }

        if !doc.examples.is_empty() {
            let examples: Vec<String> = doc
                .examples
                .iter()
                .map(|ex| format!("  # {}\n  $ {}\n", ex.description.trim(), ex.command.trim()))
                .collect();
            blocks.push(format!("Examples:\n{}", examples.join("\n")));
        }

        for section in &doc.sections {
            if section.rows.is_empty() {
                continue;
            }
            blocks.push(format!("{}:\n{}", section.title, render_rows(&section.rows)));
        }

        if let Some(footer) = &doc.footer {
            blocks.push(format!("{}\n", footer.trim_end()));
        }

        blocks.join("\n")
    }
}

pub mod names {
    use std::collections::HashSet;

    /// Return the first name that appears more than once.
    pub fn first_duplicate<'a, I>(names: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen: HashSet<&str> = HashSet::new();
        names.into_iter().find(|name| !seen.insert(name))
    }

    pub fn contains_whitespace(value: &str) -> bool {
        value.chars().any(char::is_whitespace)
    }

    /// Keep the candidates starting with `prefix`, dropping the ones in `exclude`.
    pub fn filter_prefixed<I, S>(candidates: I, prefix: &str, exclude: &[String]) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        candidates
            .into_iter()
            .map(Into::into)
            .filter(|c: &String| c.starts_with(prefix) && !exclude.iter().any(|e| e == c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::help::{self, FlagRow, HelpDoc, Row, Section};
    use super::names;
    use super::scan::{FlagLookup, FlagRef, ScanError, Scanner, Token};

    // -v/--verbose (switch, id 0), -o/--output (value, id 1), --force (switch, id 2)
    struct Lookup;

    impl FlagLookup for Lookup {
        fn long(&self, name: &str) -> Option<FlagRef> {
            match name {
                "verbose" => Some(FlagRef::switch(0)),
                "output" => Some(FlagRef::value(1)),
                "force" => Some(FlagRef::switch(2)),
                _ => None,
            }
        }

        fn short(&self, short: char) -> Option<FlagRef> {
            match short {
                'v' => Some(FlagRef::switch(0)),
                'o' => Some(FlagRef::value(1)),
                _ => None,
            }
        }
    }

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn scan_all(items: &[String]) -> Vec<Result<Token<'_>, ScanError>> {
        let mut scanner = Scanner::new(items);
        let mut out = Vec::new();
        while let Some(next) = scanner.next_token(&Lookup) {
            out.push(next);
        }
        out
    }

    fn flag(id: usize, spelling: &str, value: Option<&'static str>) -> Result<Token<'static>, ScanError> {
        Ok(Token::Flag {
            id,
            spelling: spelling.to_string(),
            value,
        })
    }

    #[test]
    fn scan_supports_combined_short_flags_and_attached_value() {
        let items = argv(&["-vvoout.txt", "in.txt"]);
        let tokens = scan_all(&items);
        assert_eq!(
            tokens,
            vec![
                flag(0, "-v", None),
                flag(0, "-v", None),
                flag(1, "-o", Some("out.txt")),
                Ok(Token::Positional("in.txt")),
            ]
        );
    }

    #[test]
    fn scan_supports_long_forms() {
        let items = argv(&["--output", "a", "--output=b", "--force=false", "--verbose"]);
        let tokens = scan_all(&items);
        assert_eq!(
            tokens,
            vec![
                flag(1, "--output", Some("a")),
                flag(1, "--output", Some("b")),
                flag(2, "--force", Some("false")),
                flag(0, "--verbose", None),
            ]
        );
    }

    #[test]
    fn scan_value_flag_consumes_dash_prefixed_value() {
        let items = argv(&["-o", "-5", "-o=x"]);
        let tokens = scan_all(&items);
        assert_eq!(tokens, vec![flag(1, "-o", Some("-5")), flag(1, "-o", Some("x"))]);
    }

    #[test]
    fn scan_separator_escapes_everything_after_it() {
        let items = argv(&["a", "--", "--verbose", "-x", "--"]);
        let tokens = scan_all(&items);
        assert_eq!(
            tokens,
            vec![
                Ok(Token::Positional("a")),
                Ok(Token::Escaped("--verbose")),
                Ok(Token::Escaped("-x")),
                Ok(Token::Escaped("--")),
            ]
        );
    }

    #[test]
    fn scan_lone_dash_is_positional() {
        let items = argv(&["-"]);
        assert_eq!(scan_all(&items), vec![Ok(Token::Positional("-"))]);
    }

    #[test]
    fn scan_reports_unknown_flags_and_continues() {
        let items = argv(&["--bogus", "-xv", "file"]);
        let tokens = scan_all(&items);
        assert_eq!(
            tokens,
            vec![
                Err(ScanError::UnknownFlag("--bogus".to_string())),
                Err(ScanError::UnknownFlag("-x".to_string())),
                Ok(Token::Positional("file")),
            ]
        );
    }

    #[test]
    fn scan_reports_missing_value() {
        let items = argv(&["--output"]);
        let tokens = scan_all(&items);
        match &tokens[..] {
            [Err(ScanError::MissingValue { id, spelling })] => {
                assert_eq!(*id, 1);
                assert_eq!(spelling, "--output");
            }
            other => panic!("expected MissingValue, got: {other:?}"),
        }
        assert_eq!(tokens[0].clone().unwrap_err().message(), "flag needs an argument: --output");
    }

    #[test]
    fn scanner_uses_lookup_given_per_call() {
        struct Empty;
        impl FlagLookup for Empty {
            fn long(&self, _: &str) -> Option<FlagRef> {
                None
            }
            fn short(&self, _: char) -> Option<FlagRef> {
                None
            }
        }

        let items = argv(&["--verbose", "--verbose"]);
        let mut scanner = Scanner::new(&items);
        assert!(matches!(scanner.next_token(&Empty), Some(Err(ScanError::UnknownFlag(_)))));
        assert_eq!(scanner.next_token(&Lookup), Some(flag(0, "--verbose", None)));
        assert!(scanner.is_done());
    }

    #[test]
    fn flag_row_formats_short_value_and_default() {
        let row = FlagRow {
            short: Some('t'),
            long: "team".to_string(),
            value_name: Some("TEAM".to_string()),
            usage: "Team slug".to_string(),
            default: Some("\"core\"".to_string()),
        }
        .to_row();
        assert_eq!(row.left, "-t, --team TEAM");
        assert_eq!(row.right, "Team slug (default \"core\")");

        let row = FlagRow {
            long: "force".to_string(),
            ..Default::default()
        }
        .to_row();
        assert_eq!(row.left, "    --force");
    }

    #[test]
    fn render_aligns_rows_and_orders_blocks() {
        let doc = HelpDoc {
            about: "Greet a user.".to_string(),
            usage: vec!["app greet USER_NAME [flags]".to_string()],
            aliases: vec!["greet".to_string(), "g".to_string()],
            examples: vec![help::Example {
                description: "Greet alice".to_string(),
                command: "app greet alice".to_string(),
            }],
            sections: vec![Section {
                title: "Flags".to_string(),
                rows: vec![Row::new("-h, --help", "help for greet"), Row::new("    --loud", "")],
            }],
            footer: Some("Use \"app greet -h\" for more information.".to_string()),
        };
        let text = help::render(&doc);
        assert_eq!(
            text,
            "Greet a user.\n\
             \n\
             Usage:\n  app greet USER_NAME [flags]\n\
             \n\
             Aliases:\n  greet, g\n\
             \n\
             Examples:\n  # Greet alice\n  $ app greet alice\n\
             \n\
             Flags:\n  -h, --help   help for greet\n      --loud\n\
             \n\
             Use \"app greet -h\" for more information.\n"
        );
    }

    #[test]
    fn render_skips_empty_sections() {
        let doc = HelpDoc {
            usage: vec!["app".to_string()],
            sections: vec![Section {
                title: "Flags".to_string(),
                rows: Vec::new(),
            }],
            ..Default::default()
        };
        assert_eq!(help::render(&doc), "Usage:\n  app\n");
    }

    #[test]
    fn first_duplicate_finds_repeated_name() {
        assert_eq!(names::first_duplicate(["a", "b", "c"]), None);
        assert_eq!(names::first_duplicate(["a", "b", "a", "b"]), Some("a"));
    }

    #[test]
    fn filter_prefixed_excludes_existing() {
        let got = names::filter_prefixed(["alpha", "beta", "alps"], "al", &["alps".to_string()]);
        assert_eq!(got, vec!["alpha".to_string()]);
    }
}
