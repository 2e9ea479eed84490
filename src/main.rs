//! subtree-persist demo
//!
//! Rehydrates a small cart store, dispatches a few actions through the
//! capture interceptor, and lets the coalesced write land in storage.

use std::cell::RefCell;
use std::rc::Rc;

use subtree_persist::{Config, StorageKind, StoreApi, Value, create_interceptor, rehydrate};

/// Cart actions
#[derive(Debug, Clone)]
enum Action {
    AddItem(String),
    Watch(String),
    SetTotal(f64),
}

/// A tiny state container: current state plus a reducer
struct CartStore {
    state: RefCell<Rc<Value>>,
}

impl CartStore {
    fn new(initial: Value) -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(Rc::new(initial)),
        })
    }

    fn reduce(&self, action: Action) -> usize {
        let mut next = (**self.state.borrow()).clone();
        match action {
            Action::AddItem(sku) => {
                let mut items = match next.get_path(&["cart", "items"]) {
                    Some(Value::Array(items)) => items.clone(),
                    _ => Vec::new(),
                };
                items.push(Value::from(sku));
                next.insert_path(&["cart", "items"], Value::Array(items));
            }
            Action::Watch(sku) => {
                let mut watched = match next.get_path(&["cart", "watched"]) {
                    Some(Value::Set(watched)) => watched.clone(),
                    _ => Vec::new(),
                };
                watched.push(Value::from(sku));
                next.insert_path(&["cart", "watched"], Value::set(watched));
            }
            Action::SetTotal(total) => next.insert_path(&["cart", "total"], Value::from(total)),
        }
        let count = next
            .get_path(&["cart", "items"])
            .and_then(|items| match items {
                Value::Array(items) => Some(items.len()),
                _ => None,
            })
            .unwrap_or(0);
        *self.state.borrow_mut() = Rc::new(next);
        count
    }
}

impl StoreApi for CartStore {
    fn get_state(&self) -> Rc<Value> {
        Rc::clone(&self.state.borrow())
    }
}

fn initial_state() -> Value {
    let mut state = Value::object();
    state.insert_path(&["cart", "items"], Value::Array(Vec::new()));
    state.insert_path(&["cart", "watched"], Value::set([]));
    state.insert_path(&["cart", "total"], Value::from(0.0));
    state
}

fn config() -> Config {
    Config::new()
        .with_storage(StorageKind::Local)
        .with_error_handler(|e| log::error!("Persistence failed: {}", e))
}

/// Rehydrate, build the store, and dispatch a few actions. `settle` runs
/// after each dispatch to give pending writes a chance to fire.
fn run_demo(settle: impl Fn()) -> Rc<CartStore> {
    let seed = rehydrate(["cart"], config().with_initial_state(initial_state()));
    log::info!("Seed state: {:?}", seed);

    let store = CartStore::new(seed);
    let middleware = create_interceptor("cart", ["items", "watched", "total"], config())
        .attach(Rc::clone(&store));
    let mut dispatch = {
        let store = Rc::clone(&store);
        middleware.wrap(move |action: Action| store.reduce(action))
    };

    for action in [
        Action::AddItem("sku-1".to_string()),
        Action::Watch("sku-9".to_string()),
        Action::AddItem("sku-2".to_string()),
        Action::SetTotal(42.5),
    ] {
        log::info!("Dispatch {:?} -> {} item(s)", action, dispatch(action.clone()));
        settle();
    }
    store
}

#[cfg(target_arch = "wasm32")]
fn main() {
    console_error_panic_hook::set_once();
    if let Err(e) = console_log::init_with_level(log::Level::Info) {
        web_sys::console::error_1(&format!("Failed to init logger: {}", e).into());
    }
    log::info!("subtree-persist demo starting...");
    // Every dispatch happens in this turn, so they coalesce into one
    // setTimeout write diffed against the snapshot before the last action
    let _store = run_demo(|| {});
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use std::time::Duration;
    use subtree_persist::platform;

    env_logger::init();
    log::info!("subtree-persist demo (native) starting...");

    let _store = run_demo(|| {
        for e in platform::manual_timer().advance(Duration::ZERO) {
            log::error!("Uncaught: {}", e);
        }
    });
    let stored = platform::memory_storage(StorageKind::Local).peek("cart");
    println!("localStorage[\"cart\"] = {}", stored.unwrap_or_default());

    // A second startup sees what the first one wrote
    let seed = rehydrate(["cart"], config().with_initial_state(initial_state()));
    println!("rehydrated: {:?}", seed);
}
