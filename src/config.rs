//! Per-call configuration
//!
//! Callers fill in whatever they care about on a [`Config`]; it is resolved
//! once into [`Settings`], where every option has a concrete value.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::codec::{CodecError, DefaultCodec, ExtensionRegistry};
use crate::error::{ErrorHandler, PersistError};
use crate::platform;
use crate::storage::{StorageBackend, StorageKind};
use crate::timer::Timer;
use crate::value::Value;

/// Turns a subtree value into its stored string. Receives the subtree path.
pub type Serializer = Rc<dyn Fn(&str, &Value) -> Result<String, CodecError>>;
/// Turns a stored string back into a value.
pub type Parser = Rc<dyn Fn(&str) -> Result<Value, CodecError>>;

/// Caller options for both the interceptor and the loader.
#[derive(Clone, Default)]
pub struct Config {
    /// Replaces the default serializer for every value
    pub serializer: Option<Serializer>,
    /// Replaces the default parser for every value, outer and inner
    pub parser: Option<Parser>,
    /// Extensions for the default codec (sets only, if unset)
    pub extensions: Option<ExtensionRegistry>,
    /// Write coalescing interval (next turn, if unset)
    pub interval: Option<Duration>,
    /// Which host store to use
    pub storage: StorageKind,
    /// Explicit backend, overriding `storage`
    pub backend: Option<Rc<dyn StorageBackend>>,
    /// Explicit timer, overriding the platform default
    pub timer: Option<Rc<dyn Timer>>,
    pub error_handler: Option<ErrorHandler>,
    /// Seed state the loader merges persisted values onto
    pub initial_state: Option<Value>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_serializer(
        mut self,
        serializer: impl Fn(&str, &Value) -> Result<String, CodecError> + 'static,
    ) -> Self {
        self.serializer = Some(Rc::new(serializer));
        self
    }

    pub fn with_parser(
        mut self,
        parser: impl Fn(&str) -> Result<Value, CodecError> + 'static,
    ) -> Self {
        self.parser = Some(Rc::new(parser));
        self
    }

    pub fn with_extensions(mut self, extensions: ExtensionRegistry) -> Self {
        self.extensions = Some(extensions);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_storage(mut self, storage: StorageKind) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_backend(mut self, backend: Rc<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_timer(mut self, timer: Rc<dyn Timer>) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn with_error_handler(mut self, handler: impl Fn(&PersistError) + 'static) -> Self {
        self.error_handler = Some(Rc::new(handler));
        self
    }

    pub fn with_initial_state(mut self, state: Value) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Fill every unset option from its default.
    pub fn resolve(self) -> Settings {
        let codec = DefaultCodec::new(self.extensions.unwrap_or_default());
        let serializer = self.serializer.unwrap_or_else(|| {
            let codec = codec.clone();
            Rc::new(move |_path: &str, value: &Value| codec.serialize(value))
        });
        let parser = self
            .parser
            .unwrap_or_else(|| Rc::new(move |raw: &str| codec.deserialize(raw)));

        Settings {
            serializer,
            parser,
            interval: self.interval.unwrap_or(Duration::ZERO),
            storage: self.storage,
            backend: self
                .backend
                .unwrap_or_else(|| platform::storage(self.storage)),
            timer: self.timer.unwrap_or_else(platform::timer),
            error_handler: self.error_handler,
            initial_state: self.initial_state.unwrap_or_else(Value::object),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("serializer", &self.serializer.is_some())
            .field("parser", &self.parser.is_some())
            .field("extensions", &self.extensions)
            .field("interval", &self.interval)
            .field("storage", &self.storage)
            .field("backend", &self.backend.is_some())
            .field("timer", &self.timer.is_some())
            .field("error_handler", &self.error_handler.is_some())
            .field("initial_state", &self.initial_state)
            .finish()
    }
}

/// Fully-resolved configuration
#[derive(Clone)]
pub struct Settings {
    pub serializer: Serializer,
    pub parser: Parser,
    pub interval: Duration,
    pub storage: StorageKind,
    pub backend: Rc<dyn StorageBackend>,
    pub timer: Rc<dyn Timer>,
    pub error_handler: Option<ErrorHandler>,
    pub initial_state: Value,
}

impl Settings {
    pub fn serialize(&self, path: &str, value: &Value) -> Result<String, PersistError> {
        (self.serializer)(path, value).map_err(|source| PersistError::Serialize {
            path: path.to_string(),
            source,
        })
    }

    pub fn parse(&self, raw: &str) -> Result<Value, PersistError> {
        Ok((self.parser)(raw)?)
    }

    /// Hand `err` to the error handler. Without one, give it back so the
    /// caller can apply its own fallback.
    pub fn report(&self, err: PersistError) -> Result<(), PersistError> {
        match &self.error_handler {
            Some(handler) => {
                handler(&err);
                Ok(())
            }
            None => Err(err),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("interval", &self.interval)
            .field("storage", &self.storage)
            .field("error_handler", &self.error_handler.is_some())
            .field("initial_state", &self.initial_state)
            .finish_non_exhaustive()
    }
}
