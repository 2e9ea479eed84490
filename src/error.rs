//! Persistence errors

use std::rc::Rc;

use thiserror::Error;

use crate::codec::CodecError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("failed to serialize `{path}`: {source}")]
    Serialize {
        path: String,
        #[source]
        source: CodecError,
    },

    #[error("corrupt storage entry `{key}`: {reason}")]
    CorruptEntry { key: String, reason: String },

    #[error("timer error: {0}")]
    Timer(String),
}

/// Caller-supplied sink for persistence failures
pub type ErrorHandler = Rc<dyn Fn(&PersistError)>;
