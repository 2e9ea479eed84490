//! Browser host: `window.localStorage`, `window.sessionStorage`, `setTimeout`

use std::rc::Rc;
use std::time::Duration;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::error::PersistError;
use crate::storage::{StorageBackend, StorageError, StorageKind};
use crate::timer::{Task, Timer, TimerHandle};

fn describe(err: JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{:?}", err))
}

/// Classify a JS exception from the Storage API
fn storage_error(err: JsValue, key: &str) -> StorageError {
    match err.dyn_ref::<web_sys::DomException>() {
        Some(dom) => StorageError::from_host(&dom.name(), dom.message(), key),
        None => StorageError::Host(describe(err)),
    }
}

/// A `web_sys::Storage` behind the backend trait
pub struct WebStorage {
    inner: web_sys::Storage,
}

impl WebStorage {
    pub fn new(inner: web_sys::Storage) -> Self {
        Self { inner }
    }
}

impl StorageBackend for WebStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get_item(key).map_err(|e| storage_error(e, key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner
            .set_item(key, value)
            .map_err(|e| storage_error(e, key))
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove_item(key).map_err(|e| storage_error(e, key))
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.inner.clear().map_err(|e| StorageError::Host(describe(e)))
    }
}

/// Look up the host store. Accessing it can throw (e.g. cookies blocked).
pub(super) fn storage(kind: StorageKind) -> Result<Rc<dyn StorageBackend>, String> {
    let window = web_sys::window().ok_or_else(|| "no window".to_string())?;
    let storage = match kind {
        StorageKind::Local => window.local_storage(),
        StorageKind::Session => window.session_storage(),
    }
    .map_err(describe)?
    .ok_or_else(|| format!("window.{}Storage is null", kind.as_str()))?;
    Ok(Rc::new(WebStorage::new(storage)))
}

/// `window.setTimeout`. A task's `Err` is thrown from the callback, so it
/// reaches the page as an uncaught exception.
pub struct BrowserTimer;

impl Timer for BrowserTimer {
    fn set_timeout(&self, delay: Duration, task: Task) -> Result<TimerHandle, PersistError> {
        let window = web_sys::window().ok_or_else(|| PersistError::Timer("no window".to_string()))?;
        let callback = Closure::once_into_js(move || -> Result<(), JsValue> {
            task().map_err(|e| JsValue::from_str(&e.to_string()))
        });
        let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        let id = window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), millis)
            .map_err(|e| PersistError::Timer(describe(e)))?;
        Ok(TimerHandle(id as u64))
    }

    fn clear_timeout(&self, handle: TimerHandle) {
        if let Some(window) = web_sys::window() {
            window.clear_timeout_with_handle(handle.0 as i32);
        }
    }
}
