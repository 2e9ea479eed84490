//! Change-capture interceptor
//!
//! Sits in a state container's dispatch pipeline:
//! - Snapshots the state before each action
//! - Forwards the action untouched and returns the next handler's result
//! - Schedules a coalesced write of the configured subtree paths that changed
//!
//! Shape: `create_interceptor(..)` → `.attach(store)` → `.wrap(next)` →
//! `dispatch(action)`.

mod capture;
pub mod scheduler;

pub use scheduler::CaptureScheduler;

use std::rc::Rc;

use capture::Capture;

use crate::config::{Config, Settings};
use crate::storage::is_usable;
use crate::value::Value;

/// The part of a state container the interceptor needs: the current state.
pub trait StoreApi {
    fn get_state(&self) -> Rc<Value>;
}

impl<F> StoreApi for F
where
    F: Fn() -> Rc<Value>,
{
    fn get_state(&self) -> Rc<Value> {
        self()
    }
}

/// Build an interceptor for one module and a fixed list of subtree paths.
///
/// Writes are deferred through the configured [`Timer`](crate::timer::Timer).
/// In the browser the default is `setTimeout`. Natively the default is the
/// per-thread [`platform::manual_timer`](crate::platform::manual_timer),
/// which runs nothing until the caller advances it:
///
/// ```
/// # use std::rc::Rc;
/// # use std::time::Duration;
/// # use subtree_persist::{Config, MemoryStorage, Value, create_interceptor, platform};
/// let storage = Rc::new(MemoryStorage::new());
/// let state = Rc::new(Value::from(serde_json::json!({"cart": {"items": [1]}})));
/// let api = move || Rc::clone(&state);
/// let config = Config::new().with_backend(storage);
/// let middleware = create_interceptor("cart", ["items"], config).attach(Rc::new(api));
/// let mut dispatch = middleware.wrap(|_: ()| ());
///
/// dispatch(());
/// assert!(middleware.is_pending());
/// platform::manual_timer().advance(Duration::ZERO);
/// assert!(!middleware.is_pending());
/// ```
///
/// Pass [`Config::with_timer`] to drive writes from a timer of your own.
pub fn create_interceptor<P, S>(module_name: &str, paths: P, config: Config) -> Interceptor
where
    P: IntoIterator<Item = S>,
    S: Into<String>,
{
    Interceptor::new(module_name, paths, config)
}

/// An interceptor not yet bound to a store
pub struct Interceptor {
    module: String,
    paths: Vec<String>,
    settings: Settings,
    enabled: bool,
}

impl Interceptor {
    pub fn new<P, S>(module_name: &str, paths: P, config: Config) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let settings = config.resolve();
        // Decided once; a store that fails later still gets tried
        let enabled = is_usable(settings.backend.as_ref());
        if !enabled {
            log::warn!(
                "{} storage unusable, `{}` will not be persisted",
                settings.storage.as_str(),
                module_name
            );
        }
        Self {
            module: module_name.to_string(),
            paths: paths.into_iter().map(Into::into).collect(),
            settings,
            enabled,
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Whether writes will be captured at all
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Bind to a store, producing the dispatch wrapper.
    pub fn attach<S: StoreApi + 'static>(&self, store: Rc<S>) -> Middleware {
        let mode = if self.enabled {
            let capture = Capture::new(
                self.module.clone(),
                self.paths.clone(),
                self.settings.clone(),
                store.clone() as Rc<dyn StoreApi>,
            );
            Mode::Capturing(Rc::new(CaptureScheduler::new(
                Rc::new(capture),
                Rc::clone(&self.settings.timer),
                self.settings.interval,
            )))
        } else {
            Mode::PassThrough
        };
        Middleware {
            store: store as Rc<dyn StoreApi>,
            mode,
        }
    }
}

#[derive(Clone)]
enum Mode {
    Capturing(Rc<CaptureScheduler>),
    PassThrough,
}

/// An interceptor bound to a store
#[derive(Clone)]
pub struct Middleware {
    store: Rc<dyn StoreApi>,
    mode: Mode,
}

impl Middleware {
    /// Wrap the next dispatch handler. The returned dispatcher forwards every
    /// action in order and returns exactly what `next` returns.
    pub fn wrap<A, R, N>(&self, mut next: N) -> impl FnMut(A) -> R + use<A, R, N>
    where
        N: FnMut(A) -> R,
    {
        let middleware = self.clone();
        move |action: A| match &middleware.mode {
            Mode::Capturing(scheduler) => {
                let previous = middleware.store.get_state();
                let result = next(action);
                scheduler.schedule(previous);
                result
            }
            Mode::PassThrough => next(action),
        }
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.mode, Mode::Capturing(_))
    }

    /// Whether a write is waiting on the timer
    pub fn is_pending(&self) -> bool {
        match &self.mode {
            Mode::Capturing(scheduler) => scheduler.is_pending(),
            Mode::PassThrough => false,
        }
    }

    /// Drop a pending write. Nothing in this crate calls it on its own.
    pub fn cancel(&self) {
        if let Mode::Capturing(scheduler) = &self.mode {
            scheduler.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CodecError, MAX_NESTING};
    use crate::error::PersistError;
    use crate::storage::{MemoryStorage, StorageBackend};
    use crate::timer::ManualTimer;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::time::Duration;

    type Action = (Vec<&'static str>, Value);

    /// Minimal container: state plus a reducer
    struct TestStore {
        state: RefCell<Rc<Value>>,
    }

    impl TestStore {
        fn new(state: serde_json::Value) -> Rc<Self> {
            Rc::new(Self {
                state: RefCell::new(Rc::new(Value::from(state))),
            })
        }

        /// Reducer: each action sets one path to a value and returns a counter
        fn reduce(&self, (path, value): Action) -> usize {
            let mut next = (**self.state.borrow()).clone();
            next.insert_path(&path, value);
            *self.state.borrow_mut() = Rc::new(next);
            path.len()
        }
    }

    impl StoreApi for TestStore {
        fn get_state(&self) -> Rc<Value> {
            Rc::clone(&self.state.borrow())
        }
    }

    struct Harness {
        store: Rc<TestStore>,
        storage: Rc<MemoryStorage>,
        timer: Rc<ManualTimer>,
    }

    fn harness(state: serde_json::Value) -> Harness {
        Harness {
            store: TestStore::new(state),
            storage: Rc::new(MemoryStorage::new()),
            timer: Rc::new(ManualTimer::new()),
        }
    }

    impl Harness {
        fn config(&self) -> Config {
            Config::new()
                .with_backend(self.storage.clone())
                .with_timer(self.timer.clone())
        }

        fn dispatcher(
            &self,
            middleware: &Middleware,
        ) -> impl FnMut(Action) -> usize + use<> {
            let store = Rc::clone(&self.store);
            middleware.wrap(move |action: Action| store.reduce(action))
        }

        fn entry(&self, module: &str) -> Option<serde_json::Value> {
            self.storage
                .peek(module)
                .map(|raw| serde_json::from_str(&raw).unwrap())
        }
    }

    fn set(path: &[&'static str], value: serde_json::Value) -> Action {
        (path.to_vec(), Value::from(value))
    }

    #[test]
    fn test_changed_path_is_written_after_interval() {
        let h = harness(json!({"cart": {"items": [], "total": 0}}));
        let interceptor = create_interceptor("cart", ["items"], h.config());
        let middleware = interceptor.attach(h.store.clone());
        let mut dispatch = h.dispatcher(&middleware);

        dispatch(set(&["cart", "items"], json!([1, 2])));
        // Never inline with dispatch
        assert_eq!(h.entry("cart"), None);
        assert!(middleware.is_pending());

        assert!(h.timer.advance(Duration::ZERO).is_empty());
        assert_eq!(h.entry("cart"), Some(json!({"items": "[1,2]"})));
        assert!(!middleware.is_pending());
    }

    #[test]
    fn test_dispatch_result_is_transparent() {
        let h = harness(json!({"cart": {}}));
        let middleware = create_interceptor("cart", ["items"], h.config()).attach(h.store.clone());
        let mut dispatch = h.dispatcher(&middleware);

        assert_eq!(dispatch(set(&["cart", "items"], json!(1))), 2);
        assert_eq!(dispatch(set(&["other"], json!(1))), 1);
        assert_eq!(dispatch(set(&["a", "b", "c"], json!(1))), 3);
    }

    #[test]
    fn test_unchanged_paths_are_not_written() {
        let h = harness(json!({"cart": {"items": [], "total": 0}}));
        let middleware =
            create_interceptor("cart", ["items", "total"], h.config()).attach(h.store.clone());
        let mut dispatch = h.dispatcher(&middleware);

        dispatch(set(&["cart", "total"], json!(5)));
        h.timer.run_until_idle();
        assert_eq!(h.entry("cart"), Some(json!({"total": "5"})));

        // Deep-equal replacement is not a change
        dispatch(set(&["cart", "items"], json!([])));
        h.timer.run_until_idle();
        assert_eq!(h.storage.set_calls(), 2); // probe + first write
    }

    #[test]
    fn test_writes_merge_into_existing_entry() {
        let h = harness(json!({"cart": {"items": [], "total": 0}}));
        h.storage
            .set_item("cart", r#"{"legacy":"\"kept\"","total":"1"}"#)
            .unwrap();
        let middleware =
            create_interceptor("cart", ["items", "total"], h.config()).attach(h.store.clone());
        let mut dispatch = h.dispatcher(&middleware);

        dispatch(set(&["cart", "items"], json!(["a"])));
        h.timer.run_until_idle();
        assert_eq!(
            h.entry("cart"),
            Some(json!({"legacy": "\"kept\"", "total": "1", "items": "[\"a\"]"}))
        );
    }

    #[test]
    fn test_burst_coalesces_into_one_write() {
        let h = harness(json!({"cart": {"items": [], "total": 0}}));
        let config = h.config().with_interval(Duration::from_millis(100));
        let middleware =
            create_interceptor("cart", ["items", "total"], config).attach(h.store.clone());
        let mut dispatch = h.dispatcher(&middleware);
        let writes_before = h.storage.set_calls();

        dispatch(set(&["cart", "items"], json!([1])));
        h.timer.advance(Duration::from_millis(40));
        dispatch(set(&["cart", "total"], json!(1)));
        dispatch(set(&["cart", "total"], json!(2)));
        assert_eq!(h.timer.pending(), 1);

        h.timer.advance(Duration::from_millis(60));
        assert_eq!(h.storage.set_calls(), writes_before + 1);
        // The old snapshot is the one before the last action, diffed against
        // the latest state
        assert_eq!(h.entry("cart"), Some(json!({"total": "2"})));
    }

    #[test]
    fn test_latest_state_is_read_when_the_write_fires() {
        let h = harness(json!({"cart": {"items": []}}));
        let middleware = create_interceptor("cart", ["items"], h.config()).attach(h.store.clone());
        let mut dispatch = h.dispatcher(&middleware);

        dispatch(set(&["cart", "items"], json!([1])));
        // Changed behind the interceptor's back before the timer fires
        h.store.reduce(set(&["cart", "items"], json!([1, 2, 3])));
        h.timer.run_until_idle();
        assert_eq!(h.entry("cart"), Some(json!({"items": "[1,2,3]"})));
    }

    #[test]
    fn test_removed_path_is_not_written() {
        let h = harness(json!({"cart": {"items": [1]}}));
        let middleware = create_interceptor("cart", ["items"], h.config()).attach(h.store.clone());
        let mut dispatch = h.dispatcher(&middleware);

        dispatch(set(&["cart"], json!({})));
        h.timer.run_until_idle();
        assert_eq!(h.entry("cart"), None);
    }

    #[test]
    fn test_sets_use_marked_encoding() {
        let h = harness(json!({"user": {}}));
        let middleware = create_interceptor("user", ["seen"], h.config()).attach(h.store.clone());
        let mut dispatch = h.dispatcher(&middleware);

        dispatch((vec!["user", "seen"], Value::set([Value::from(7)])));
        h.timer.run_until_idle();
        assert_eq!(
            h.entry("user"),
            Some(json!({"seen": r#"{"_isSet":true,"arr":[7]}"#}))
        );
    }

    #[test]
    fn test_set_change_with_repeated_items_is_written() {
        let h = harness(json!({"user": {}}));
        h.store.reduce((
            vec!["user", "seen"],
            Value::Set(vec![Value::from(1), Value::from(1)]),
        ));
        let middleware = create_interceptor("user", ["seen"], h.config()).attach(h.store.clone());
        let mut dispatch = h.dispatcher(&middleware);

        dispatch((
            vec!["user", "seen"],
            Value::set([Value::from(1), Value::from(2)]),
        ));
        h.timer.run_until_idle();
        assert_eq!(
            h.entry("user"),
            Some(json!({"seen": r#"{"_isSet":true,"arr":[1,2]}"#}))
        );
    }

    #[test]
    fn test_too_deep_value_is_not_written() {
        let h = harness(json!({"cart": {"items": [], "total": 0}}));
        let deep = (0..=MAX_NESTING).fold(Value::from(1), |inner, _| Value::Array(vec![inner]));
        let middleware =
            create_interceptor("cart", ["items", "total"], h.config()).attach(h.store.clone());
        let mut dispatch = h.dispatcher(&middleware);

        dispatch((vec!["cart", "items"], deep));
        let errors = h.timer.run_until_idle();
        assert!(matches!(
            errors.as_slice(),
            [PersistError::Serialize { path, source: CodecError::TooDeep(_) }] if path == "items"
        ));
        assert_eq!(h.entry("cart"), None);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_default_timer_waits_for_thread_timer() {
        let h = harness(json!({"cart": {"items": []}}));
        let config = Config::new().with_backend(h.storage.clone());
        let middleware = create_interceptor("cart", ["items"], config).attach(h.store.clone());
        let mut dispatch = h.dispatcher(&middleware);

        dispatch(set(&["cart", "items"], json!([1])));
        // The harness timer isn't the one in use
        h.timer.run_until_idle();
        assert_eq!(h.entry("cart"), None);

        assert!(crate::platform::manual_timer().advance(Duration::ZERO).is_empty());
        assert_eq!(h.entry("cart"), Some(json!({"items": "[1]"})));
    }

    #[test]
    fn test_unusable_storage_is_pass_through() {
        let h = harness(json!({"cart": {"items": []}}));
        h.storage.set_disabled(true);
        let interceptor = create_interceptor("cart", ["items"], h.config());
        assert!(!interceptor.is_enabled());
        h.storage.set_disabled(false);

        let middleware = interceptor.attach(h.store.clone());
        assert!(!middleware.is_capturing());
        let mut dispatch = h.dispatcher(&middleware);
        assert_eq!(dispatch(set(&["cart", "items"], json!([1]))), 2);
        h.timer.run_until_idle();

        // Only the failed probe write was attempted
        assert_eq!(h.storage.set_calls(), 1);
        assert!(h.storage.is_empty());
        assert_eq!(h.timer.pending(), 0);
    }

    #[test]
    fn test_write_failure_goes_to_error_handler() {
        let h = harness(json!({"cart": {"items": []}}));
        let errors = Rc::new(Cell::new(0));
        let config = h.config().with_error_handler({
            let errors = Rc::clone(&errors);
            move |e| {
                assert!(matches!(e, PersistError::Storage(_)));
                errors.set(errors.get() + 1);
            }
        });
        let middleware = create_interceptor("cart", ["items"], config).attach(h.store.clone());
        let mut dispatch = h.dispatcher(&middleware);

        h.storage.set_disabled(true);
        let result = dispatch(set(&["cart", "items"], json!([1])));
        assert_eq!(result, 2);
        assert!(h.timer.run_until_idle().is_empty());
        assert_eq!(errors.get(), 1);

        // Scheduling still works after a failure
        h.storage.set_disabled(false);
        dispatch(set(&["cart", "items"], json!([1, 2])));
        h.timer.run_until_idle();
        assert_eq!(h.entry("cart"), Some(json!({"items": "[1,2]"})));
    }

    #[test]
    fn test_write_failure_without_handler_is_uncaught() {
        let h = harness(json!({"cart": {"items": []}}));
        let middleware = create_interceptor("cart", ["items"], h.config()).attach(h.store.clone());
        let mut dispatch = h.dispatcher(&middleware);

        h.storage.set_disabled(true);
        dispatch(set(&["cart", "items"], json!([1])));
        let errors = h.timer.run_until_idle();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], PersistError::Storage(_)));
    }

    #[test]
    fn test_quota_exceeded_is_reported() {
        let h = Harness {
            store: TestStore::new(json!({"cart": {"items": []}})),
            storage: Rc::new(MemoryStorage::with_quota(64)),
            timer: Rc::new(ManualTimer::new()),
        };
        let middleware = create_interceptor("cart", ["items"], h.config()).attach(h.store.clone());
        let mut dispatch = h.dispatcher(&middleware);

        dispatch(set(&["cart", "items"], json!(["x".repeat(100)])));
        let errors = h.timer.run_until_idle();
        assert!(matches!(
            errors.as_slice(),
            [PersistError::Storage(crate::storage::StorageError::QuotaExceeded { .. })]
        ));
    }

    #[test]
    fn test_serialize_failure_skips_path_when_handled() {
        let h = harness(json!({"cart": {"items": [], "total": 0}}));
        let failures = Rc::new(Cell::new(0));
        let config = h
            .config()
            .with_serializer(|path, value| {
                if path == "items" {
                    Err(crate::codec::CodecError::Custom("no items".to_string()))
                } else {
                    crate::codec::default_serialize(path, value)
                }
            })
            .with_error_handler({
                let failures = Rc::clone(&failures);
                move |_| failures.set(failures.get() + 1)
            });
        let middleware =
            create_interceptor("cart", ["items", "total"], config).attach(h.store.clone());
        let mut dispatch = h.dispatcher(&middleware);

        dispatch(set(&["cart"], json!({"items": [1], "total": 3})));
        h.timer.run_until_idle();
        assert_eq!(failures.get(), 1);
        assert_eq!(h.entry("cart"), Some(json!({"total": "3"})));
    }

    #[test]
    fn test_corrupt_existing_entry_is_reported() {
        let h = harness(json!({"cart": {"items": []}}));
        h.storage.set_item("cart", "not json").unwrap();
        let middleware = create_interceptor("cart", ["items"], h.config()).attach(h.store.clone());
        let mut dispatch = h.dispatcher(&middleware);

        dispatch(set(&["cart", "items"], json!([1])));
        let errors = h.timer.run_until_idle();
        assert!(matches!(errors.as_slice(), [PersistError::CorruptEntry { .. }]));
        assert_eq!(h.storage.peek("cart").as_deref(), Some("not json"));
    }

    #[test]
    fn test_cancel_drops_pending_write() {
        let h = harness(json!({"cart": {"items": []}}));
        let middleware = create_interceptor("cart", ["items"], h.config()).attach(h.store.clone());
        let mut dispatch = h.dispatcher(&middleware);

        dispatch(set(&["cart", "items"], json!([1])));
        middleware.cancel();
        assert!(!middleware.is_pending());
        h.timer.run_until_idle();
        assert_eq!(h.entry("cart"), None);
    }

    #[test]
    fn test_interceptors_for_different_modules_are_independent() {
        let h = harness(json!({"cart": {"items": []}, "user": {"name": ""}}));
        let cart = create_interceptor("cart", ["items"], h.config()).attach(h.store.clone());
        let user = create_interceptor("user", ["name"], h.config()).attach(h.store.clone());
        let store = Rc::clone(&h.store);
        let inner = user.wrap(move |action: Action| store.reduce(action));
        let mut dispatch = cart.wrap(inner);

        dispatch(set(&["cart", "items"], json!([1])));
        dispatch(set(&["user", "name"], json!("ada")));
        assert_eq!(h.timer.pending(), 2);
        h.timer.run_until_idle();
        assert_eq!(h.entry("user"), Some(json!({"name": "\"ada\""})));
        // The cart's pending snapshot was replaced by the one before the
        // second action, which already had the new items
        assert_eq!(h.entry("cart"), None);
    }

    #[test]
    fn test_closure_store_api() {
        let state = Rc::new(Value::from(json!({"m": {"p": 1}})));
        let api = {
            let state = Rc::clone(&state);
            move || Rc::clone(&state)
        };
        assert_eq!(api.get_state().get_path(&["m", "p"]), Some(&Value::from(1)));
    }
}
