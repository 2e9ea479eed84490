//! Trailing-edge write coalescing
//!
//! One scheduler per interceptor. The first snapshot arms a timer; snapshots
//! arriving while it is armed replace the pending one, so at most one write
//! is ever queued.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use super::capture::Capture;
use crate::timer::{Timer, TimerHandle};
use crate::value::Value;

#[derive(Default)]
struct Pending {
    snapshot: Option<Rc<Value>>,
    handle: Option<TimerHandle>,
}

pub struct CaptureScheduler {
    pending: Rc<RefCell<Pending>>,
    capture: Rc<Capture>,
    timer: Rc<dyn Timer>,
    interval: Duration,
}

impl CaptureScheduler {
    pub(crate) fn new(capture: Rc<Capture>, timer: Rc<dyn Timer>, interval: Duration) -> Self {
        Self {
            pending: Rc::new(RefCell::new(Pending::default())),
            capture,
            timer,
            interval,
        }
    }

    /// Queue a capture against `snapshot` (the state before some action).
    pub fn schedule(&self, snapshot: Rc<Value>) {
        let mut pending = self.pending.borrow_mut();
        // Last write wins on the old snapshot
        pending.snapshot = Some(snapshot);
        if pending.handle.is_some() {
            return;
        }

        let shared = Rc::clone(&self.pending);
        let capture = Rc::clone(&self.capture);
        let armed = self.timer.set_timeout(
            self.interval,
            Box::new(move || {
                // Reset before running so a failed write can't wedge the scheduler
                let snapshot = {
                    let mut pending = shared.borrow_mut();
                    pending.handle = None;
                    pending.snapshot.take()
                };
                match snapshot {
                    Some(previous) => capture.run(&previous),
                    None => Ok(()),
                }
            }),
        );

        match armed {
            Ok(handle) => pending.handle = Some(handle),
            Err(e) => {
                pending.snapshot = None;
                drop(pending);
                if let Err(e) = self.capture.settings().report(e) {
                    log::error!("Could not schedule write for `{}`: {}", self.capture.module(), e);
                }
            }
        }
    }

    /// Drop the pending write, if any.
    pub fn cancel(&self) {
        let mut pending = self.pending.borrow_mut();
        pending.snapshot = None;
        if let Some(handle) = pending.handle.take() {
            self.timer.clear_timeout(handle);
            log::debug!("Cancelled pending write for `{}`", self.capture.module());
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.borrow().handle.is_some()
    }
}
