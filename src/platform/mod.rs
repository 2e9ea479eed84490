//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Storage (LocalStorage/SessionStorage on web, per-thread memory natively)
//! - Deferred tasks (`setTimeout` on web, a manual clock natively)
//! - Wall-clock time

#[cfg(not(target_arch = "wasm32"))]
mod native;
#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(not(target_arch = "wasm32"))]
pub use native::{manual_timer, memory_storage};
#[cfg(target_arch = "wasm32")]
pub use web::{BrowserTimer, WebStorage};

use std::rc::Rc;

use crate::storage::{StorageBackend, StorageKind, UnavailableStorage};
use crate::timer::Timer;

/// The host store for `kind`, or a stand-in that fails every call when the
/// host won't provide one.
pub fn storage(kind: StorageKind) -> Rc<dyn StorageBackend> {
    #[cfg(target_arch = "wasm32")]
    let backend = web::storage(kind);
    #[cfg(not(target_arch = "wasm32"))]
    let backend = Ok::<_, String>(native::memory_storage(kind) as Rc<dyn StorageBackend>);

    match backend {
        Ok(backend) => backend,
        Err(reason) => {
            log::warn!("{} storage unavailable: {}", kind.as_str(), reason);
            Rc::new(UnavailableStorage::new(reason))
        }
    }
}

/// The host's deferred-task driver
pub fn timer() -> Rc<dyn Timer> {
    #[cfg(target_arch = "wasm32")]
    {
        Rc::new(BrowserTimer)
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        native::manual_timer()
    }
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> f64 {
    #[cfg(target_arch = "wasm32")]
    {
        js_sys::Date::now()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }
}
