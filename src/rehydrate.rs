//! Rehydration loader
//!
//! Runs once before the state container exists. Reads each module's storage
//! entry, parses it (outer object, then every inner value), and deep-merges
//! the result onto the caller's initial state.
//!
//! Corruption policy: with no error handler, a module that fails to load
//! clears the *whole* backend, taking every other module's persisted data in
//! that store with it. This is deliberate self-healing so a bad entry can't
//! break every future startup, but the blast radius is wide.

use std::collections::BTreeMap;

use crate::config::{Config, Settings};
use crate::error::PersistError;
use crate::storage::is_usable;
use crate::value::{Value, merge_deep_right};

/// Build the seed state for `module_names` from storage.
///
/// Modules live under the top-level keys of the seed, so an initial state
/// that isn't an object can't hold them. It is logged and replaced by an
/// empty object before merging. If storage is unusable the initial state is
/// returned as given.
pub fn rehydrate<I, S>(module_names: I, config: Config) -> Value
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let settings = config.resolve();
    if !is_usable(settings.backend.as_ref()) {
        log::warn!(
            "{} storage unusable, using initial state",
            settings.storage.as_str()
        );
        return settings.initial_state;
    }

    let mut seed = if settings.initial_state.is_object() {
        settings.initial_state.clone()
    } else {
        log::warn!(
            "Initial state is not an object, seeding from an empty one: {:?}",
            settings.initial_state
        );
        Value::object()
    };
    for module in module_names {
        let module = module.as_ref();
        match load_module(&settings, module) {
            Ok(Some(persisted)) => {
                let merged = match settings.initial_state.get(module) {
                    Some(initial) => merge_deep_right(initial, &persisted),
                    None => persisted,
                };
                seed.insert_path(&[module], merged);
                log::info!("Rehydrated `{}` from storage", module);
            }
            Ok(None) => log::debug!("Nothing stored for `{}`", module),
            Err(e) => recover(&settings, module, e),
        }
    }
    seed
}

/// The module's persisted subtrees, `None` if nothing is stored.
fn load_module(settings: &Settings, module: &str) -> Result<Option<Value>, PersistError> {
    let Some(raw) = settings.backend.get_item(module)? else {
        return Ok(None);
    };

    let fields = match settings.parse(&raw)? {
        Value::Object(fields) => fields,
        other => {
            return Err(PersistError::CorruptEntry {
                key: module.to_string(),
                reason: format!("expected an object, found {:?}", other),
            });
        }
    };

    let mut subtrees = BTreeMap::new();
    for (path, inner) in fields {
        let Value::String(serialized) = inner else {
            return Err(PersistError::CorruptEntry {
                key: module.to_string(),
                reason: format!("value for `{}` is not a string", path),
            });
        };
        subtrees.insert(path, settings.parse(&serialized)?);
    }
    Ok(Some(Value::Object(subtrees)))
}

/// Skip the module, after either notifying the handler or clearing the store.
fn recover(settings: &Settings, module: &str, err: PersistError) {
    log::warn!("Failed to rehydrate `{}`: {}", module, err);
    if settings.report(err).is_ok() {
        return;
    }
    match settings.backend.clear() {
        Ok(()) => log::warn!("Cleared {} storage after corrupt entry", settings.storage.as_str()),
        Err(e) => log::error!("Could not clear {} storage: {}", settings.storage.as_str(), e),
    }
}
