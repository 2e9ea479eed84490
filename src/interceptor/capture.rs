//! The deferred capture task: diff, serialize, merge, write

use std::collections::BTreeMap;
use std::rc::Rc;

use super::StoreApi;
use crate::config::Settings;
use crate::error::PersistError;
use crate::value::Value;

pub(crate) struct Capture {
    module: String,
    paths: Vec<String>,
    settings: Settings,
    store: Rc<dyn StoreApi>,
}

impl Capture {
    pub(crate) fn new(
        module: String,
        paths: Vec<String>,
        settings: Settings,
        store: Rc<dyn StoreApi>,
    ) -> Self {
        Self {
            module,
            paths,
            settings,
            store,
        }
    }

    pub(crate) fn module(&self) -> &str {
        &self.module
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Diff `previous` against the store's state *now* and persist whatever
    /// changed. Errors go to the handler; without one they are returned.
    pub(crate) fn run(&self, previous: &Value) -> Result<(), PersistError> {
        let current = self.store.get_state();
        let staged = self.stage(previous, &current)?;
        if staged.is_empty() {
            return Ok(());
        }
        match self.write(&staged) {
            Ok(()) => {
                log::debug!(
                    "Persisted {} path(s) of `{}`",
                    staged.len(),
                    self.module
                );
                Ok(())
            }
            Err(e) => self.settings.report(e),
        }
    }

    /// Serialized values for every path that changed and is still defined.
    fn stage(&self, previous: &Value, current: &Value) -> Result<BTreeMap<String, String>, PersistError> {
        let mut staged = BTreeMap::new();
        for path in &self.paths {
            let location = [self.module.as_str(), path.as_str()];
            let before = previous.get_path(&location);
            let Some(after) = current.get_path(&location) else {
                continue;
            };
            if before == Some(after) {
                continue;
            }
            match self.settings.serialize(path, after) {
                Ok(serialized) => {
                    staged.insert(path.clone(), serialized);
                }
                // Handled failures leave the path out of this write
                Err(e) => self.settings.report(e)?,
            }
        }
        Ok(staged)
    }

    /// Read-modify-write of the module entry. Existing keys survive.
    fn write(&self, staged: &BTreeMap<String, String>) -> Result<(), PersistError> {
        let backend = &self.settings.backend;
        let mut entry = match backend.get_item(&self.module)? {
            Some(raw) => match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(serde_json::Value::Object(entry)) => entry,
                Ok(_) => {
                    return Err(PersistError::CorruptEntry {
                        key: self.module.clone(),
                        reason: "not a JSON object".to_string(),
                    });
                }
                Err(e) => {
                    return Err(PersistError::CorruptEntry {
                        key: self.module.clone(),
                        reason: e.to_string(),
                    });
                }
            },
            None => serde_json::Map::new(),
        };

        for (path, serialized) in staged {
            entry.insert(path.clone(), serde_json::Value::String(serialized.clone()));
        }
        let raw = serde_json::to_string(&entry).map_err(crate::codec::CodecError::from)?;
        backend.set_item(&self.module, &raw)?;
        Ok(())
    }
}
