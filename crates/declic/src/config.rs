//! The persisted configuration file and the built-in `config` command.
//!
//! The file is a YAML mapping. Nested mappings are flattened to dotted keys
//! and keys are lower-cased, so `Team: core` and `team: core` are the same
//! setting. Every change rewrites the whole file, nesting dotted keys back
//! into mappings.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::debug;

use crate::arguments::{Argument, Arguments};
use crate::command::Command;
use crate::complete::Completion;
use crate::flags::Shared;

/// Flattened configuration keys and their values.
pub type Settings = IndexMap<String, Value>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file {} does not exist", .path.display())]
    NotFound { path: PathBuf },
    #[error("unable to read configuration file {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("unable to parse configuration file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("configuration file {} must contain a mapping", .path.display())]
    NotAMapping { path: PathBuf },
    #[error("unable to save configuration file {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("unable to encode configuration: {0}")]
    Serialize(#[source] serde_yaml::Error),
    #[error("unable to determine the user configuration directory")]
    NoConfigDir,
    #[error("invalid value for {key:?} from {origin}: {message}")]
    InvalidValue {
        key: String,
        origin: String,
        message: String,
    },
}

/// `<user config dir>/.<app>/config.yaml`
pub(crate) fn default_path(app: &str) -> Result<PathBuf, ConfigError> {
    let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(dir.join(format!(".{app}")).join("config.yaml"))
}

/// Expand a leading `~` to the home directory.
pub(crate) fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some("") => "",
        Some(rest) if rest.starts_with('/') => &rest[1..],
        _ => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}

/// Render a scalar the way it reads in the file; lists render as `[a,b]`.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(items) => {
            let items: Vec<String> = items.iter().map(display_value).collect();
            format!("[{}]", items.join(","))
        }
        Value::Mapping(_) => "{...}".to_string(),
        Value::Tagged(tagged) => display_value(&tagged.value),
    }
}

fn key_text(key: &Value) -> String {
    display_value(key).to_lowercase()
}

fn flatten(prefix: &str, mapping: &Mapping, out: &mut Settings) {
    for (key, value) in mapping {
        let key = key_text(key);
        let full = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Mapping(nested) => flatten(&full, nested, out),
            other => {
                out.insert(full, other.clone());
            }
        }
    }
}

/// Inverse of [`flatten`]. A dotted key whose prefix already holds a scalar
/// stays dotted.
fn nest(mapping: &mut Mapping, key: &str, value: Value) {
    if let Some((head, rest)) = key.split_once('.') {
        let entry = mapping
            .entry(Value::String(head.to_string()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        if let Value::Mapping(nested) = entry {
            nest(nested, rest, value);
            return;
        }
    }
    mapping.insert(Value::String(key.to_string()), value);
}

/// Handle to the configuration file. The path is fixed once flags are known.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn set_path(&mut self, path: PathBuf) {
        self.path = path;
    }

    /// Directory holding the file.
    pub fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// Read every setting. A missing file is [`ConfigError::NotFound`].
    pub fn read_all(&self) -> Result<Settings, ConfigError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound {
                    path: self.path.clone(),
                });
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let value: Value = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        let mut settings = Settings::new();
        match value {
            Value::Null => {}
            Value::Mapping(mapping) => flatten("", &mapping, &mut settings),
            _ => {
                return Err(ConfigError::NotAMapping {
                    path: self.path.clone(),
                });
            }
        }
        Ok(settings)
    }

    /// Like [`ConfigStore::read_all`], with a missing file read as empty.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        match self.read_all() {
            Err(ConfigError::NotFound { path }) => {
                debug!(path = %path.display(), "configuration file does not exist");
                Ok(Settings::new())
            }
            other => other,
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        Ok(self.load()?.shift_remove(&key.to_lowercase()))
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<(), ConfigError> {
        let mut settings = self.load()?;
        settings.insert(key.to_lowercase(), value.into());
        self.write_all(&settings)
    }

    /// Remove `key`. Returns false if it was not set.
    pub fn unset(&self, key: &str) -> Result<bool, ConfigError> {
        let mut settings = self.load()?;
        if settings.shift_remove(&key.to_lowercase()).is_none() {
            return Ok(false);
        }
        self.write_all(&settings)?;
        Ok(true)
    }

    /// Replace the file with `settings`, keys sorted and nested on `.`.
    pub fn write_all(&self, settings: &Settings) -> Result<(), ConfigError> {
        let mut sorted = settings.clone();
        sorted.sort_keys();
        let mut mapping = Mapping::new();
        for (key, value) in sorted {
            nest(&mut mapping, &key, value);
        }
        let text = serde_yaml::to_string(&mapping).map_err(ConfigError::Serialize)?;
        fs::write(&self.path, text).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// Create the directory holding the file (mode `0o750` on unix).
    pub fn ensure_dir(&self) -> Result<(), ConfigError> {
        let dir = self.dir();
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o750);
        }
        builder.create(dir).map_err(|source| ConfigError::Write {
            path: dir.to_path_buf(),
            source,
        })
    }
}

fn sorted_keys(settings: &Settings, exclude: &[String]) -> Vec<String> {
    let mut keys: Vec<String> = settings
        .keys()
        .filter(|k| !exclude.contains(k))
        .cloned()
        .collect();
    keys.sort();
    keys
}

fn complete_keys(store: &Shared<ConfigStore>, args: &Arguments) -> Completion {
    let Ok(settings) = store.borrow().load() else {
        return Completion::default();
    };
    let present = if args.contains("key") {
        args.get_repeatable("key").to_vec()
    } else {
        Vec::new()
    };
    let keys = sorted_keys(&settings, &present);
    if keys.is_empty() {
        return Completion::default();
    }
    Completion::new(keys).with_active_help("Available configuration keys")
}

/// The built-in `config` command operating on `store`.
pub(crate) fn command(store: &Shared<ConfigStore>) -> Command {
    Command::new("config", "Manage configuration file / values.")
        .description(
            "The config command allows you to set, get, unset and list configuration values stored in the configuration file.\n\n\
             Configuration values acts as defaults for various flags throughout the application.",
        )
        .sub_commands([set(store), get(store), list(store), unset(store)])
}

fn set(store: &Shared<ConfigStore>) -> Command {
    let complete = Rc::clone(store);
    let store = Rc::clone(store);
    Command::new("set", "Set a configuration value")
        .description(
            "Set a configuration value in the configuration file. This value will be used as default for relevant flags throughout the application.",
        )
        .args([Argument::new("key"), Argument::new("value")])
        .auto_complete(move |_, args, _| {
            if !args.is_empty() {
                return Completion::default();
            }
            match complete.borrow().load() {
                Ok(settings) => Completion::new(sorted_keys(&settings, &[]))
                    .with_active_help("Choose an existing key or create a new one"),
                Err(_) => Completion::default(),
            }
        })
        .run(move |_, args, out| {
            let store = store.borrow();
            let dir = store.dir();
            if !dir.exists() {
                let create = out.confirm(format_args!(
                    "The directory for the configuration file ({}) does not exist, do you want to create it?",
                    dir.display()
                ))?;
                if !create {
                    out.warn("Directory creation aborted; configuration not saved");
                    return Ok(());
                }
            }
            store.ensure_dir()?;

            let (key, value) = (args.get("key"), args.get("value"));
            out.println(format_args!("Set {key} = {value}"));
            store.set(key, value)?;
            out.println("Configuration file updated");
            Ok(())
        })
}

fn get(store: &Shared<ConfigStore>) -> Command {
    let complete = Rc::clone(store);
    let store = Rc::clone(store);
    Command::new("get", "Get one or more configuration values.")
        .description("This command retrieves one or more configuration values from the configuration file.")
        .arg(Argument::repeatable("key"))
        .auto_complete(move |_, args, _| complete_keys(&complete, args))
        .run(move |_, args, out| {
            let settings = store.borrow().load()?;
            for key in args.get_repeatable("key") {
                match settings.get(&key.to_lowercase()) {
                    Some(value) => out.println(format_args!("{key} = {}", display_value(value))),
                    None => out.println(format_args!(
                        "No such configuration key: {key}, create the value using config set {key} <value>"
                    )),
                }
            }
            Ok(())
        })
}

fn list(store: &Shared<ConfigStore>) -> Command {
    let store = Rc::clone(store);
    Command::new("list", "List all configuration values found in the configuration file.").run(
        move |_, _, out| {
            let store = store.borrow();
            let settings = store.load()?;
            let path = store.path().display();
            if settings.is_empty() {
                out.println(format_args!(
                    "The configuration file {path} is empty, or it does not yet exist"
                ));
                out.println("Use the config set <key> <value> command to set configuration values");
                return Ok(());
            }

            let mut rows: Vec<Vec<String>> = settings
                .iter()
                .map(|(k, v)| vec![k.clone(), display_value(v)])
                .collect();
            rows.sort();
            rows.insert(0, vec!["Key".to_string(), "Value".to_string()]);

            out.println(format_args!("The following configuration values are set in {path}:\n"));
            out.table(&rows)?;
            out.println(
                "\nUse the config set <key> <value> command to update or create values, or the config unset <value>[, <value>] command to remove values",
            );
            Ok(())
        },
    )
}

fn unset(store: &Shared<ConfigStore>) -> Command {
    let complete = Rc::clone(store);
    let store = Rc::clone(store);
    Command::new("unset", "Unset one or more configuration values.")
        .description("This command removes one or more configuration values from the configuration file completely.")
        .arg(Argument::repeatable("key"))
        .auto_complete(move |_, args, _| complete_keys(&complete, args))
        .run(move |_, args, out| {
            let store = store.borrow();
            let mut settings = store.load()?;
            let mut updated = false;
            for key in args.get_repeatable("key") {
                match settings.shift_remove(&key.to_lowercase()) {
                    Some(value) => {
                        out.println(format_args!("Unset {key} (value: {})", display_value(&value)));
                        updated = true;
                    }
                    None => out.println(format_args!("No such configuration key: {key}")),
                }
            }

            if !updated {
                out.println("Nothing to update");
                return Ok(());
            }
            store.write_all(&settings)?;
            out.println("Configuration file updated");
            Ok(())
        })
}
