//! subtree-persist - keep selected state subtrees in browser storage
//!
//! Core modules:
//! - `interceptor`: Dispatch-pipeline stage that captures changed subtrees
//! - `rehydrate`: Startup loader that merges stored subtrees onto initial state
//! - `codec`: Value <-> string encoding with set/extension support
//! - `storage`: Backend trait, in-memory backend, capability probe
//! - `platform`: Browser/native storage and timer plumbing
//!
//! ```
//! use std::rc::Rc;
//! use std::time::Duration;
//! use subtree_persist::{Config, ManualTimer, MemoryStorage, Value, create_interceptor, rehydrate};
//!
//! let storage = Rc::new(MemoryStorage::new());
//! let timer = Rc::new(ManualTimer::new());
//! let config = || Config::new().with_backend(storage.clone()).with_timer(timer.clone());
//!
//! let state = Rc::new(std::cell::RefCell::new(Rc::new(Value::from(
//!     serde_json::json!({"cart": {"items": []}}),
//! ))));
//! let api = {
//!     let state = state.clone();
//!     move || state.borrow().clone()
//! };
//! let middleware = create_interceptor("cart", ["items"], config()).attach(Rc::new(api));
//! let mut dispatch = middleware.wrap(|items: Value| {
//!     let mut next = (**state.borrow()).clone();
//!     next.insert_path(&["cart", "items"], items);
//!     *state.borrow_mut() = Rc::new(next);
//! });
//!
//! dispatch(Value::from(serde_json::json!([1, 2])));
//! timer.advance(Duration::ZERO);
//!
//! let seed = rehydrate(["cart"], config());
//! assert_eq!(seed, Value::from(serde_json::json!({"cart": {"items": [1, 2]}})));
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod platform;
pub mod rehydrate;
pub mod storage;
pub mod timer;
pub mod value;

pub use codec::{CodecError, DefaultCodec, Extension, ExtensionRegistry, SetExtension};
pub use config::{Config, Parser, Serializer, Settings};
pub use error::{ErrorHandler, PersistError};
pub use interceptor::{Interceptor, Middleware, StoreApi, create_interceptor};
pub use rehydrate::rehydrate;
pub use storage::{MemoryStorage, StorageBackend, StorageError, StorageKind, is_usable};
pub use timer::{ManualTimer, Timer, TimerHandle};
pub use value::{Value, merge_deep_right};
