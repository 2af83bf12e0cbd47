//! Layers persisted configuration and environment variables under the flags
//! given on the command line.
//!
//! Precedence, lowest first: compiled default, configuration file,
//! environment, command line. A flag set on the command line is never
//! touched here.

use std::path::Path;

use serde_yaml::Value;
use tracing::trace;

use crate::config::{ConfigError, Settings, display_value};
use crate::duration;
use crate::flags::{ChangedFlags, FlagSlot, Scope, split_list, with_slot};

enum LayerValue<'v> {
    File(&'v Value),
    Env(&'v str),
}

/// `myapp` + `dry-run` gives `MYAPP_DRY_RUN`.
pub(crate) fn env_key(app: &str, flag: &str) -> String {
    format!("{app}_{flag}")
        .to_uppercase()
        .replace(['-', '.'], "_")
}

pub(crate) fn lookup_env<'e>(env: &'e [(String, String)], key: &str) -> Option<&'e str> {
    env.iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Apply the file and environment layers to every flag in `scopes` that was
/// not given on the command line.
pub(crate) fn reconcile(
    app: &str,
    scopes: &[&Scope],
    settings: &Settings,
    config_path: &Path,
    env: &[(String, String)],
    changed: &ChangedFlags,
) -> Result<(), ConfigError> {
    for scope in scopes {
        for spec in &scope.specs {
            let group = scope.group_of(spec);
            if changed.contains(group, &spec.name) {
                continue;
            }

            let env_name = env_key(app, &spec.name);
            let (layer, origin) = match lookup_env(env, &env_name) {
                Some(raw) => (LayerValue::Env(raw), env_name),
                None => match settings.get(&spec.name.to_lowercase()) {
                    Some(value) => (LayerValue::File(value), config_path.display().to_string()),
                    None => continue,
                },
            };

            let result = with_slot(group, &spec.name, |slot| apply(slot, &layer));
            if let Some(Err(message)) = result {
                return Err(ConfigError::InvalidValue {
                    key: spec.name.clone(),
                    origin,
                    message,
                });
            }
            trace!(flag = %spec.name, %origin, "flag set from configuration");
        }
    }
    Ok(())
}

fn apply(slot: &mut FlagSlot<'_>, layer: &LayerValue<'_>) -> Result<(), String> {
    let text = match layer {
        LayerValue::Env(raw) => raw.to_string(),
        LayerValue::File(Value::Sequence(items)) => match slot {
            FlagSlot::Strings(values) => {
                values.set_strings(items.iter().map(display_value).collect());
                return Ok(());
            }
            _ => return Err("expected a single value, got a list".to_string()),
        },
        LayerValue::File(Value::Mapping(_)) => return Err("expected a value, got a mapping".to_string()),
        LayerValue::File(value) => display_value(value),
    };
    apply_text(slot, &text)
}

fn apply_text(slot: &mut FlagSlot<'_>, text: &str) -> Result<(), String> {
    match slot {
        FlagSlot::Duration(value) => **value = duration::parse_lenient(text)?,
        FlagSlot::Strings(values) => values.set_strings(split_list(text).collect()),
        FlagSlot::Count(value) => value.0 = text.trim().parse().map_err(|e| format!("{e}"))?,
        other => other.apply_token(Some(text.trim()), true)?,
    }
    Ok(())
}
