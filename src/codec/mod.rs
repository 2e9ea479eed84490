//! Value <-> string codec
//!
//! Structural JSON with extension hooks:
//! - Numbers follow host semantics (`2`, not `2.0`; non-finite becomes `null`)
//! - Values claimed by an [`Extension`] are swapped for a marked object
//! - Marked objects are rebuilt bottom-up on the way back in
//! - Nesting deeper than [`MAX_NESTING`] is refused when encoding, so nothing
//!   gets written that the parser would reject on the way back

pub mod registry;

pub use registry::{Extension, ExtensionRegistry, SET_ITEMS, SET_MARKER, SetExtension};

use thiserror::Error;

use crate::value::Value;

/// Largest integer an `f64` holds exactly
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Deepest array/object nesting the encoder will produce. `serde_json`
/// refuses to parse 128 levels, so stay clear of it.
pub const MAX_NESTING: usize = 100;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no extension registered to encode {0}")]
    Unencodable(String),

    #[error("malformed `{marker}` payload: {reason}")]
    Malformed { marker: String, reason: String },

    #[error("value nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("{0}")]
    Custom(String),
}

/// The default serializer/parser pair, driven by an extension registry.
#[derive(Debug, Clone, Default)]
pub struct DefaultCodec {
    registry: ExtensionRegistry,
}

impl DefaultCodec {
    pub fn new(registry: ExtensionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn serialize(&self, value: &Value) -> Result<String, CodecError> {
        let json = self.to_json(value)?;
        Ok(serde_json::to_string(&json)?)
    }

    pub fn deserialize(&self, raw: &str) -> Result<Value, CodecError> {
        let json: serde_json::Value = serde_json::from_str(raw)?;
        self.from_json(json)
    }

    /// Convert to plain JSON, applying extensions top-down.
    pub fn to_json(&self, value: &Value) -> Result<serde_json::Value, CodecError> {
        self.encode_at(value, 0)
    }

    fn encode_at(&self, value: &Value, depth: usize) -> Result<serde_json::Value, CodecError> {
        match self.registry.encode(value) {
            // The replacement itself is not offered to extensions again
            Some(replacement) => self.structural_to_json(&replacement, depth),
            None => self.structural_to_json(value, depth),
        }
    }

    fn structural_to_json(
        &self,
        value: &Value,
        depth: usize,
    ) -> Result<serde_json::Value, CodecError> {
        if matches!(value, Value::Array(_) | Value::Object(_)) && depth >= MAX_NESTING {
            return Err(CodecError::TooDeep(MAX_NESTING));
        }
        Ok(match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| self.encode_at(item, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(key, item)| Ok((key.clone(), self.encode_at(item, depth + 1)?)))
                    .collect::<Result<_, CodecError>>()?,
            ),
            Value::Set(_) => return Err(CodecError::Unencodable("a set".to_string())),
            Value::Custom { tag, .. } => {
                return Err(CodecError::Unencodable(format!("custom value `{}`", tag)));
            }
        })
    }

    /// Convert from plain JSON, rebuilding marked objects bottom-up.
    pub fn from_json(&self, json: serde_json::Value) -> Result<Value, CodecError> {
        Ok(match json {
            serde_json::Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.from_json(item))
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(fields) => {
                let fields = fields
                    .into_iter()
                    .map(|(key, item)| Ok((key, self.from_json(item)?)))
                    .collect::<Result<_, CodecError>>()?;
                match self.registry.decode(&fields) {
                    Some(rebuilt) => rebuilt?,
                    None => Value::Object(fields),
                }
            }
            scalar => Value::from(scalar),
        })
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Default serializer. The subtree path is accepted for parity with custom
/// serializers but plays no part in the encoding.
pub fn default_serialize(_path: &str, value: &Value) -> Result<String, CodecError> {
    DefaultCodec::default().serialize(value)
}

/// Default parser
pub fn default_parse(raw: &str) -> Result<Value, CodecError> {
    DefaultCodec::default().deserialize(raw)
}
