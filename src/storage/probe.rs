//! Storage capability probe
//!
//! A store can exist yet be useless: disabled by policy, full, or silently
//! dropping writes. The probe round-trips a throwaway value to find out.

use std::cell::Cell;

use super::{StorageBackend, StorageError};
use crate::platform;

/// Throwaway key written and removed by the probe
pub const PROBE_KEY: &str = "__subtree_persist_probe__";

thread_local! {
    static PROBE_SEQ: Cell<u64> = const { Cell::new(0) };
}

fn probe_stamp() -> String {
    let seq = PROBE_SEQ.with(|seq| {
        let next = seq.get().wrapping_add(1);
        seq.set(next);
        next
    });
    format!("{}-{}", platform::now_millis(), seq)
}

/// Whether `backend` accepts a write and reads it back. Never fails.
///
/// Once the write lands, the key is removed again whatever the read did.
pub fn is_usable(backend: &dyn StorageBackend) -> bool {
    let stamp = probe_stamp();
    if let Err(e) = backend.set_item(PROBE_KEY, &stamp) {
        log::warn!("Storage probe failed: {}", e);
        return false;
    }
    let read_back = backend.get_item(PROBE_KEY);
    let removed = backend.remove_item(PROBE_KEY);

    match (read_back, removed) {
        (Ok(value), Ok(())) if value.as_deref() == Some(stamp.as_str()) => true,
        (Ok(_), Ok(())) => {
            log::warn!("Storage probe read back a different value");
            false
        }
        (Err(e), removed) => {
            if let Err(cleanup) = removed {
                log::warn!("Could not remove probe key: {}", cleanup);
            }
            log::warn!("Storage probe failed: {}", e);
            false
        }
        (Ok(_), Err(e)) => {
            log::warn!("Storage probe failed: {}", e);
            false
        }
    }
}
