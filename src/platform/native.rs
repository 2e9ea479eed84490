//! Native host emulation
//!
//! There is no origin storage outside the browser, so each thread gets its
//! own pair of in-memory stores and a manual timer.

use std::rc::Rc;

use crate::storage::{MemoryStorage, StorageKind};
use crate::timer::ManualTimer;

thread_local! {
    static LOCAL: Rc<MemoryStorage> = Rc::new(MemoryStorage::new());
    static SESSION: Rc<MemoryStorage> = Rc::new(MemoryStorage::new());
    static TIMER: Rc<ManualTimer> = Rc::new(ManualTimer::new());
}

/// This thread's emulated store for `kind`
pub fn memory_storage(kind: StorageKind) -> Rc<MemoryStorage> {
    match kind {
        StorageKind::Local => LOCAL.with(Rc::clone),
        StorageKind::Session => SESSION.with(Rc::clone),
    }
}

/// This thread's default timer. Advance it to let capture writes fire.
pub fn manual_timer() -> Rc<ManualTimer> {
    TIMER.with(Rc::clone)
}
