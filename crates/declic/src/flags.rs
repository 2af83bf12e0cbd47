//! Flag records and their registration on a parser scope.
//!
//! A flag record is any struct implementing [`Flags`], usually through
//! `#[derive(Flags)]`. Registration walks the record once with a visitor and
//! turns each field into a [`FlagSpec`]; later passes walk it again to assign
//! values by name.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use crate::complete::{Completion, CompletionRequest};
use crate::duration;
use crate::error::StructuralError;
use crate::output::Verbosity;

pub type Shared<T> = Rc<RefCell<T>>;

/// Type-erased handle to a flag record, as stored by commands.
pub type FlagsRef = Rc<RefCell<dyn Flags>>;

pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// A record whose fields are flags.
pub trait Flags: Any {
    /// Call `visitor.visit` once per flag field, recursing into nested records.
    fn visit_flags(&mut self, visitor: &mut dyn FlagVisitor);

    /// Complete the value of flag `flag`. `root` is the whole record.
    fn complete_flag(
        &self,
        _flag: &str,
        _request: &CompletionRequest<'_>,
        _root: &dyn Any,
    ) -> Option<Completion> {
        None
    }
}

pub trait FlagVisitor {
    fn visit(&mut self, field: FlagField<'_>);
}

pub struct FlagField<'a> {
    pub name: &'a str,
    /// Empty for no short form.
    pub short: &'a str,
    pub usage: &'a str,
    pub value: &'a mut dyn FlagValue,
}

/// A field type usable as a flag.
///
/// Newtypes implement this by delegating [`FlagValue::slot`] to their inner
/// value and optionally adding completion.
pub trait FlagValue {
    fn slot(&mut self) -> FlagSlot<'_>;

    /// Complete this flag with files having these extensions.
    fn file_extensions(&self) -> Option<Vec<String>> {
        None
    }

    fn complete(&self, _request: &CompletionRequest<'_>, _flags: &dyn Any) -> Option<Completion> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    String,
    Bool,
    Uint,
    Int,
    Strings,
    Duration,
    Count,
}

impl FlagKind {
    /// Value placeholder shown in help, if the flag takes a value.
    pub fn type_name(self) -> Option<&'static str> {
        match self {
            Self::String => Some("string"),
            Self::Uint => Some("uint"),
            Self::Int => Some("int"),
            Self::Strings => Some("strings"),
            Self::Duration => Some("duration"),
            Self::Bool | Self::Count => None,
        }
    }

    pub fn takes_value(self) -> bool {
        self.type_name().is_some()
    }
}

/// Mutable view of a flag field's underlying primitive.
pub enum FlagSlot<'a> {
    String(&'a mut String),
    Bool(&'a mut bool),
    Uint(&'a mut dyn UintValue),
    Int(&'a mut dyn IntValue),
    Strings(&'a mut dyn StringList),
    Duration(&'a mut Duration),
    Count(&'a mut Count),
}

impl FlagSlot<'_> {
    pub fn kind(&self) -> FlagKind {
        match self {
            Self::String(_) => FlagKind::String,
            Self::Bool(_) => FlagKind::Bool,
            Self::Uint(_) => FlagKind::Uint,
            Self::Int(_) => FlagKind::Int,
            Self::Strings(_) => FlagKind::Strings,
            Self::Duration(_) => FlagKind::Duration,
            Self::Count(_) => FlagKind::Count,
        }
    }

    /// Help text for a non-zero default, e.g. `"core"` or `5s`.
    pub(crate) fn default_display(&self) -> Option<String> {
        match self {
            Self::String(v) if !v.is_empty() => Some(format!("{v:?}")),
            Self::Bool(v) if **v => Some("true".to_string()),
            Self::Uint(v) if v.get() != 0 => Some(v.get().to_string()),
            Self::Int(v) if v.get() != 0 => Some(v.get().to_string()),
            Self::Strings(v) if !v.strings().is_empty() => Some(format!("[{}]", v.strings().join(","))),
            Self::Duration(v) if !v.is_zero() => Some(duration::format(**v)),
            Self::Count(v) if v.0 != 0 => Some(v.0.to_string()),
            _ => None,
        }
    }

    pub(crate) fn current_values(&self) -> Vec<String> {
        match self {
            Self::Strings(v) => v.strings(),
            Self::String(v) if !v.is_empty() => vec![v.to_string()],
            _ => Vec::new(),
        }
    }

    /// Apply one occurrence on the command line. `first` is true for the first
    /// occurrence in this run, so sequences and counters start over.
    pub(crate) fn apply_token(&mut self, value: Option<&str>, first: bool) -> Result<(), String> {
        match self {
            Self::Bool(v) => {
                **v = match value {
                    None => true,
                    Some(raw) => parse_bool(raw)?,
                };
            }
            Self::Count(v) => match value {
                None => {
                    let base = if first { 0 } else { v.0 };
                    v.0 = base.saturating_add(1);
                }
                Some(raw) => v.0 = raw.parse().map_err(|e| format!("{e}"))?,
            },
            Self::String(v) => **v = required(value)?.to_string(),
            Self::Uint(v) => v.set(required(value)?.parse().map_err(|e| format!("{e}"))?)?,
            Self::Int(v) => v.set(required(value)?.parse().map_err(|e| format!("{e}"))?)?,
            Self::Duration(v) => **v = duration::parse(required(value)?)?,
            Self::Strings(v) => {
                let raw = required(value)?;
                if first {
                    v.set_strings(Vec::new());
                }
                for item in split_list(raw) {
                    v.push_string(item);
                }
            }
        }
        Ok(())
    }
}

fn required(value: Option<&str>) -> Result<&str, String> {
    value.ok_or_else(|| "a value is required".to_string())
}

pub(crate) fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(format!("invalid boolean {other:?}")),
    }
}

pub(crate) fn split_list(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A flag counting its occurrences, e.g. `-vvv`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Count(pub u32);

impl Count {
    pub fn get(self) -> u32 {
        self.0
    }

    pub fn verbosity(self) -> Verbosity {
        Verbosity::from_count(self.0)
    }

    pub fn is_verbose(self) -> bool {
        self.0 >= 1
    }

    pub fn is_debug(self) -> bool {
        self.0 >= 2
    }

    pub fn is_trace(self) -> bool {
        self.0 >= 3
    }
}

impl FlagValue for String {
    fn slot(&mut self) -> FlagSlot<'_> {
        FlagSlot::String(self)
    }
}

impl FlagValue for bool {
    fn slot(&mut self) -> FlagSlot<'_> {
        FlagSlot::Bool(self)
    }
}

/// An unsigned integer field of any width. Values are parsed as `u64` and
/// narrowed on assignment.
pub trait UintValue {
    fn get(&self) -> u64;
    fn set(&mut self, value: u64) -> Result<(), String>;
}

/// A signed integer field of any width, parsed as `i64`.
pub trait IntValue {
    fn get(&self) -> i64;
    fn set(&mut self, value: i64) -> Result<(), String>;
}

macro_rules! integer_flags {
    ($trait:ident, $wide:ty, $variant:ident: $($ty:ty),*) => {$(
        impl $trait for $ty {
            fn get(&self) -> $wide {
                <$wide>::try_from(*self).unwrap_or(<$wide>::MAX)
            }

            fn set(&mut self, value: $wide) -> Result<(), String> {
                *self = <$ty>::try_from(value)
                    .map_err(|_| format!("{value} is out of range for {}", stringify!($ty)))?;
                Ok(())
            }
        }

        impl FlagValue for $ty {
            fn slot(&mut self) -> FlagSlot<'_> {
                FlagSlot::$variant(self)
            }
        }
    )*};
}

integer_flags!(UintValue, u64, Uint: u8, u16, u32, u64, usize);
integer_flags!(IntValue, i64, Int: i8, i16, i32, i64, isize);

/// A string, or a newtype over one, usable as the element of a list flag.
///
/// `#[derive(FlagValue)]` implements this for single-field structs over
/// `String`, so `Vec<Team>` works like `Vec<String>`.
pub trait FlagString {
    fn from_flag(value: String) -> Self;
    fn flag_str(&self) -> &str;
}

impl FlagString for String {
    fn from_flag(value: String) -> Self {
        value
    }

    fn flag_str(&self) -> &str {
        self
    }
}

/// Type-erased view of a list flag.
pub trait StringList {
    fn strings(&self) -> Vec<String>;
    fn set_strings(&mut self, values: Vec<String>);
    fn push_string(&mut self, value: String);
}

impl<T: FlagString> StringList for Vec<T> {
    fn strings(&self) -> Vec<String> {
        self.iter().map(|v| v.flag_str().to_string()).collect()
    }

    fn set_strings(&mut self, values: Vec<String>) {
        *self = values.into_iter().map(T::from_flag).collect();
    }

    fn push_string(&mut self, value: String) {
        self.push(T::from_flag(value));
    }
}

impl<T: FlagString> FlagValue for Vec<T> {
    fn slot(&mut self) -> FlagSlot<'_> {
        FlagSlot::Strings(self)
    }
}

impl FlagValue for Duration {
    fn slot(&mut self) -> FlagSlot<'_> {
        FlagSlot::Duration(self)
    }
}

impl FlagValue for Count {
    fn slot(&mut self) -> FlagSlot<'_> {
        FlagSlot::Count(self)
    }
}

/// Flags available on every command.
#[derive(Debug, Clone, Default, declic_macros::Flags)]
pub struct GlobalFlags {
    #[flag(
        short = "v",
        usage = "Set verbosity level. Use -v for verbose, -vv for debug, -vvv for trace."
    )]
    pub verbose: Count,
    #[flag(name = "no-colors", usage = "Disable colors in the output.")]
    pub no_colors: bool,
    #[flag(usage = "Specify the location for the configuration file.")]
    pub config: String,
}

/// A registered flag as the parser sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FlagSpec {
    pub name: String,
    pub short: Option<char>,
    pub usage: String,
    pub value_name: Option<String>,
    pub kind: FlagKind,
    pub default: Option<String>,
    pub file_extensions: Option<Vec<String>>,
    /// Index into [`Scope::groups`].
    pub group: usize,
}

/// The flags visible at one parser level: a command's own flags, or its
/// sticky flags.
#[derive(Clone, Default)]
pub(crate) struct Scope {
    pub groups: Vec<FlagsRef>,
    pub specs: Vec<FlagSpec>,
}

impl Scope {
    pub fn register(&mut self, group: &FlagsRef) -> Result<(), StructuralError> {
        let mut collector = Collector {
            group: self.groups.len(),
            specs: Vec::new(),
            error: None,
        };
        group.borrow_mut().visit_flags(&mut collector);
        if let Some(err) = collector.error {
            return Err(err);
        }

        for spec in collector.specs {
            if self.find_long(&spec.name).is_some() {
                return Err(StructuralError::DuplicateFlag(spec.name));
            }
            if let Some(short) = spec.short {
                if let Some(existing) = self.find_short(short) {
                    return Err(StructuralError::DuplicateShortFlag {
                        short,
                        first: self.specs[existing].name.clone(),
                        second: spec.name,
                    });
                }
            }
            self.specs.push(spec);
        }
        self.groups.push(Rc::clone(group));
        Ok(())
    }

    pub fn find_long(&self, name: &str) -> Option<usize> {
        self.specs.iter().position(|s| s.name == name)
    }

    pub fn find_short(&self, short: char) -> Option<usize> {
        self.specs.iter().position(|s| s.short == Some(short))
    }

    pub fn group_of(&self, spec: &FlagSpec) -> &FlagsRef {
        &self.groups[spec.group]
    }
}

struct Collector {
    group: usize,
    specs: Vec<FlagSpec>,
    error: Option<StructuralError>,
}

impl FlagVisitor for Collector {
    fn visit(&mut self, field: FlagField<'_>) {
        if self.error.is_some() {
            return;
        }
        if field.name.trim().is_empty() {
            self.error = Some(StructuralError::EmptyFlagName);
            return;
        }

        let mut chars = field.short.chars();
        let short = match (chars.next(), chars.next()) {
            (None, _) => None,
            (Some(c), None) => Some(c),
            (Some(_), Some(_)) => {
                self.error = Some(StructuralError::InvalidShortFlag {
                    name: field.name.to_string(),
                    short: field.short.to_string(),
                });
                return;
            }
        };

        let file_extensions = field.value.file_extensions();
        let slot = field.value.slot();
        let kind = slot.kind();
        let (usage, placeholder) = normalize_usage(field.usage);
        let value_name = kind
            .type_name()
            .map(|type_name| placeholder.unwrap_or_else(|| type_name.to_string()));

        self.specs.push(FlagSpec {
            name: field.name.to_string(),
            short,
            usage,
            value_name,
            kind,
            default: slot.default_display(),
            file_extensions,
            group: self.group,
        });
    }
}

/// Replace `|name|` markers with `NAME`; the first marker becomes the value
/// placeholder.
fn normalize_usage(usage: &str) -> (String, Option<String>) {
    let mut out = String::new();
    let mut placeholder = None;
    let mut rest = usage;
    while let Some(start) = rest.find('|') {
        let Some(len) = rest[start + 1..].find('|') else {
            break;
        };
        let name = &rest[start + 1..start + 1 + len];
        if name.is_empty() || name.contains(char::is_whitespace) {
            out.push_str(&rest[..start + 1]);
            rest = &rest[start + 1..];
            continue;
        }
        let upper = name.to_uppercase();
        out.push_str(&rest[..start]);
        out.push_str(&upper);
        placeholder.get_or_insert(upper);
        rest = &rest[start + 2 + len..];
    }
    out.push_str(rest);
    (out, placeholder)
}

fn group_key(group: &FlagsRef) -> usize {
    Rc::as_ptr(group) as *const () as usize
}

/// Flags given explicitly on the command line during one run.
#[derive(Debug, Default)]
pub(crate) struct ChangedFlags(HashSet<(usize, String)>);

impl ChangedFlags {
    /// Returns true if this is the first time the flag was marked.
    pub fn mark(&mut self, group: &FlagsRef, name: &str) -> bool {
        self.0.insert((group_key(group), name.to_string()))
    }

    pub fn contains(&self, group: &FlagsRef, name: &str) -> bool {
        self.0.contains(&(group_key(group), name.to_string()))
    }
}

/// Run `apply` against the slot of flag `name` inside `group`.
pub(crate) fn with_slot<R>(
    group: &FlagsRef,
    name: &str,
    apply: impl FnOnce(&mut FlagSlot<'_>) -> R,
) -> Option<R> {
    struct Find<'n, F, R> {
        name: &'n str,
        apply: Option<F>,
        result: Option<R>,
    }

    impl<F, R> FlagVisitor for Find<'_, F, R>
    where
        F: FnOnce(&mut FlagSlot<'_>) -> R,
    {
        fn visit(&mut self, field: FlagField<'_>) {
            if field.name != self.name {
                return;
            }
            if let Some(apply) = self.apply.take() {
                let mut slot = field.value.slot();
                self.result = Some(apply(&mut slot));
            }
        }
    }

    let mut find = Find {
        name,
        apply: Some(apply),
        result: None,
    };
    group.borrow_mut().visit_flags(&mut find);
    find.result
}
