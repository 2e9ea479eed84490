//! Tagged-variant extensions for values JSON can't represent natively
//!
//! Each extension owns a marker key. Encoding swaps a claimed value for a
//! plain object carrying `marker: true`; decoding spots the marker on an
//! already-decoded object and rebuilds the original value.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use super::CodecError;
use crate::value::Value;

/// Marker key used by the built-in set encoding
pub const SET_MARKER: &str = "_isSet";
/// Field holding the set's elements
pub const SET_ITEMS: &str = "arr";

/// An encode/decode pair for one non-JSON-native type.
pub trait Extension {
    /// Key whose truthy presence identifies an encoded value
    fn marker(&self) -> &str;

    /// Replacement for `value` if this extension claims it. The replacement
    /// is encoded recursively and should carry the marker.
    fn encode(&self, value: &Value) -> Option<Value>;

    /// Rebuild a value from an object that carries this extension's marker.
    /// Children have already been decoded.
    fn decode(&self, fields: &BTreeMap<String, Value>) -> Result<Value, CodecError>;
}

/// Sets travel as `{"arr": [...], "_isSet": true}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SetExtension;

impl Extension for SetExtension {
    fn marker(&self) -> &str {
        SET_MARKER
    }

    fn encode(&self, value: &Value) -> Option<Value> {
        let Value::Set(items) = value else {
            return None;
        };
        let mut fields = BTreeMap::new();
        fields.insert(SET_ITEMS.to_string(), Value::Array(items.clone()));
        fields.insert(SET_MARKER.to_string(), Value::Bool(true));
        Some(Value::Object(fields))
    }

    fn decode(&self, fields: &BTreeMap<String, Value>) -> Result<Value, CodecError> {
        match fields.get(SET_ITEMS) {
            Some(Value::Array(items)) => Ok(Value::set(items.iter().cloned())),
            // A set built from nothing is empty
            None | Some(Value::Null) => Ok(Value::Set(Vec::new())),
            Some(other) => Err(CodecError::Malformed {
                marker: SET_MARKER.to_string(),
                reason: format!("`{}` is not an array: {:?}", SET_ITEMS, other),
            }),
        }
    }
}

/// Ordered table of extensions consulted by the default codec.
#[derive(Clone)]
pub struct ExtensionRegistry {
    extensions: Vec<Rc<dyn Extension>>,
}

impl ExtensionRegistry {
    /// Registry with no extensions at all (sets become unencodable)
    pub fn empty() -> Self {
        Self {
            extensions: Vec::new(),
        }
    }

    /// Add an extension. Later registrations are consulted after earlier ones.
    pub fn register(&mut self, extension: impl Extension + 'static) -> &mut Self {
        self.extensions.push(Rc::new(extension));
        self
    }

    pub fn with(mut self, extension: impl Extension + 'static) -> Self {
        self.register(extension);
        self
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// First replacement offered for `value`
    pub fn encode(&self, value: &Value) -> Option<Value> {
        self.extensions.iter().find_map(|ext| ext.encode(value))
    }

    /// Rebuild `fields` if some extension's marker is set, otherwise `None`.
    pub fn decode(&self, fields: &BTreeMap<String, Value>) -> Option<Result<Value, CodecError>> {
        self.extensions
            .iter()
            .find(|ext| fields.get(ext.marker()).is_some_and(Value::is_truthy))
            .map(|ext| ext.decode(fields))
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::empty().with(SetExtension)
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.extensions.iter().map(|ext| ext.marker()))
            .finish()
    }
}
