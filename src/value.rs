//! Dynamic state tree values
//!
//! The state container hands us snapshots of its whole tree. Everything the
//! interceptor diffs and the loader merges is expressed as a [`Value`].

use std::collections::BTreeMap;

/// A node in the application state tree.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    /// Distinct values, compared without regard to order or repeats.
    /// Prefer [`Value::set`], which drops duplicates.
    Set(Vec<Value>),
    /// Plain string-keyed object
    Object(BTreeMap<String, Value>),
    /// Application-defined type; only encodable through a registered extension
    Custom { tag: String, data: Box<Value> },
}

impl Value {
    /// Empty plain object
    pub fn object() -> Self {
        Value::Object(BTreeMap::new())
    }

    /// Build a set, dropping duplicates (by deep equality) while keeping
    /// first-seen order.
    pub fn set<I: IntoIterator<Item = Value>>(items: I) -> Self {
        let mut distinct: Vec<Value> = Vec::new();
        for item in items {
            if !distinct.contains(&item) {
                distinct.push(item);
            }
        }
        Value::Set(distinct)
    }

    pub fn custom(tag: impl Into<String>, data: Value) -> Self {
        Value::Custom {
            tag: tag.into(),
            data: Box::new(data),
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Host truthiness: `false`, `0`, `NaN`, `""` and `null` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Object member lookup; `None` for missing keys and non-objects.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Resolve a path of object keys. `None` means "undefined": some segment
    /// is missing or its parent is not an object. A stored `Null` is defined.
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        path.iter()
            .try_fold(self, |node, segment| node.get(segment.as_ref()))
    }

    /// Set `value` at `path`, replacing non-object intermediates with fresh
    /// objects. An empty path replaces `self`.
    pub fn insert_path<S: AsRef<str>>(&mut self, path: &[S], value: Value) {
        let Some((last, parents)) = path.split_last() else {
            *self = value;
            return;
        };
        let mut node = self;
        for segment in parents {
            node = node.ensure_object().entry(segment.as_ref().to_string()).or_default();
        }
        node.ensure_object().insert(last.as_ref().to_string(), value);
    }

    fn ensure_object(&mut self) -> &mut BTreeMap<String, Value> {
        if !self.is_object() {
            *self = Value::object();
        }
        match self {
            Value::Object(map) => map,
            _ => unreachable!("value was just replaced with an object"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => {
                a.iter().all(|item| b.contains(item)) && b.iter().all(|item| a.contains(item))
            }
            (Value::Object(a), Value::Object(b)) => a == b,
            (
                Value::Custom { tag: ta, data: da },
                Value::Custom { tag: tb, data: db },
            ) => ta == tb && da == db,
            _ => false,
        }
    }
}

/// Deep-merge `right` onto `left`. Plain objects merge key by key, recursively;
/// anywhere else the right-hand value wins outright.
pub fn merge_deep_right(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                let next = match base.get(key) {
                    Some(existing) => merge_deep_right(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        _ => right.clone(),
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}
