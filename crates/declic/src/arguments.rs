use indexmap::IndexMap;

/// A positional argument declared on a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub name: String,
    /// Absorbs every remaining token. Only allowed on the last argument.
    pub repeatable: bool,
}

impl Argument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repeatable: false,
        }
    }

    pub fn repeatable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repeatable: true,
        }
    }

    /// `NAME`, or `NAME [NAME...]` for a repeatable argument.
    pub(crate) fn signature(&self) -> String {
        let upper = self.name.to_uppercase();
        if self.repeatable {
            format!("{upper} [{upper}...]")
        } else {
            upper
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Bound {
    Single(String),
    Repeated(Vec<String>),
}

/// Positional tokens bound to the arguments of the executed command.
///
/// The accessors panic when asked for a name the command does not declare,
/// or with the wrong cardinality. That is a bug in the command body, not a
/// user error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments {
    values: IndexMap<String, Bound>,
}

impl Arguments {
    /// Zip `tokens` against `specs` by position.
    ///
    /// Unfilled trailing arguments are left out; counting is the job of the
    /// validation step.
    pub fn bind(specs: &[Argument], tokens: &[String]) -> Self {
        let mut values = IndexMap::new();
        for (i, spec) in specs.iter().enumerate() {
            if i >= tokens.len() {
                break;
            }
            let bound = if spec.repeatable {
                Bound::Repeated(tokens[i..].to_vec())
            } else {
                Bound::Single(tokens[i].clone())
            };
            values.insert(spec.name.clone(), bound);
        }
        Self { values }
    }

    /// Number of bound arguments (a repeatable argument counts once).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// All bound values in order, with repeatable values spliced in place.
    pub fn all(&self) -> Vec<String> {
        let mut out = Vec::new();
        for bound in self.values.values() {
            match bound {
                Bound::Single(value) => out.push(value.clone()),
                Bound::Repeated(values) => out.extend(values.iter().cloned()),
            }
        }
        out
    }

    pub fn get(&self, name: &str) -> &str {
        match self.values.get(name) {
            Some(Bound::Single(value)) => value,
            _ => panic!("\"{name}\" is not a valid argument"),
        }
    }

    pub fn get_repeatable(&self, name: &str) -> &[String] {
        match self.values.get(name) {
            Some(Bound::Repeated(values)) => values,
            _ => panic!("\"{name}\" is not a valid repeatable argument"),
        }
    }
}
