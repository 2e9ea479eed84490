//! Deferred task execution
//!
//! Capture writes never run inline with a dispatch; they are handed to a
//! [`Timer`] and run on a later turn. In the browser that is `setTimeout`;
//! natively and in tests it is a [`ManualTimer`] driven by hand.

use std::cell::RefCell;
use std::time::Duration;

use crate::error::PersistError;

/// Deferred work. An `Err` is an uncaught failure surfaced to the host.
pub type Task = Box<dyn FnOnce() -> Result<(), PersistError>>;

/// Identifies a scheduled task for cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

pub trait Timer {
    /// Run `task` once, no earlier than `delay` from now and never inline.
    fn set_timeout(&self, delay: Duration, task: Task) -> Result<TimerHandle, PersistError>;

    /// Drop a task that hasn't run yet. Unknown handles are ignored.
    fn clear_timeout(&self, handle: TimerHandle);
}

struct Scheduled {
    id: u64,
    due: Duration,
    task: Task,
}

#[derive(Default)]
struct Queue {
    now: Duration,
    next_id: u64,
    tasks: Vec<Scheduled>,
}

impl Queue {
    /// Remove the earliest task due at or before `limit` (ties in schedule order)
    fn pop_due(&mut self, limit: Option<Duration>) -> Option<Scheduled> {
        let index = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| limit.is_none_or(|limit| t.due <= limit))
            .min_by_key(|(_, t)| (t.due, t.id))
            .map(|(i, _)| i)?;
        Some(self.tasks.remove(index))
    }
}

/// Virtual-clock timer. Nothing runs until the owner advances time.
#[derive(Default)]
pub struct ManualTimer {
    queue: RefCell<Queue>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed so far
    pub fn now(&self) -> Duration {
        self.queue.borrow().now
    }

    /// Number of tasks waiting to run
    pub fn pending(&self) -> usize {
        self.queue.borrow().tasks.len()
    }

    /// Move the clock forward by `by`, running every task that comes due in
    /// order. Returns the errors tasks raised.
    pub fn advance(&self, by: Duration) -> Vec<PersistError> {
        let target = self.now() + by;
        let errors = self.drain(Some(target));
        self.queue.borrow_mut().now = target;
        errors
    }

    /// Run everything queued, including tasks scheduled while draining.
    pub fn run_until_idle(&self) -> Vec<PersistError> {
        self.drain(None)
    }

    fn drain(&self, limit: Option<Duration>) -> Vec<PersistError> {
        let mut errors = Vec::new();
        loop {
            // Release the borrow before running; tasks may schedule more work
            let next = {
                let mut queue = self.queue.borrow_mut();
                let next = queue.pop_due(limit);
                if let Some(task) = &next {
                    queue.now = queue.now.max(task.due);
                }
                next
            };
            let Some(scheduled) = next else {
                break;
            };
            if let Err(e) = (scheduled.task)() {
                log::error!("Uncaught error in deferred task: {}", e);
                errors.push(e);
            }
        }
        errors
    }
}

impl Timer for ManualTimer {
    fn set_timeout(&self, delay: Duration, task: Task) -> Result<TimerHandle, PersistError> {
        let mut queue = self.queue.borrow_mut();
        queue.next_id += 1;
        let id = queue.next_id;
        let due = queue.now + delay;
        queue.tasks.push(Scheduled { id, due, task });
        Ok(TimerHandle(id))
    }

    fn clear_timeout(&self, handle: TimerHandle) {
        self.queue.borrow_mut().tasks.retain(|t| t.id != handle.0);
    }
}
