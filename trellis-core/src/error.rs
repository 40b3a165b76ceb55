//! Error types.

use std::any::Any;

use thiserror::Error;

/// Errors produced while evaluating cells or running reactions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellError {
    /// A cell (transitively) depends on itself.
    #[error("dependency cycle: {}", .chain.join(" -> "))]
    Cycle {
        /// Cell labels along the cycle, starting and ending at the same cell.
        chain: Vec<String>,
    },

    /// A compute function returned an error or panicked.
    #[error("evaluation of `{cell}` failed: {message}")]
    Evaluation { cell: String, message: String },

    /// A reaction panicked.
    #[error("reaction on `{cell}` failed: {message}")]
    Reaction { cell: String, message: String },

    /// A lazy cell was read while inactive and has nothing cached.
    #[error("lazy cell `{cell}` is inactive and has no cached value")]
    Inactive { cell: String },

    /// Reactions kept mutating cells for more passes than allowed.
    #[error("propagation did not settle after {passes} passes")]
    PropagationLimit { passes: usize },

    /// A persistence adapter failed to mirror a value.
    #[error("storage for `{key}` failed: {message}")]
    Storage { key: String, message: String },
}

impl CellError {
    pub fn is_cycle(&self) -> bool {
        matches!(self, CellError::Cycle { .. })
    }

    /// Convert a caught panic payload into an error for `cell`.
    ///
    /// Cell errors raised by `get()` are passed through unchanged so a cycle
    /// keeps its chain as it unwinds through the evaluations above it.
    pub(crate) fn from_panic(cell: String, payload: Box<dyn Any + Send>) -> Self {
        match payload.downcast::<CellError>() {
            Ok(err) => *err,
            Err(payload) => CellError::Evaluation {
                cell,
                message: panic_message(payload.as_ref()),
            },
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(err) = payload.downcast_ref::<CellError>() {
        err.to_string()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Errors from persistence backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("msgpack encoding failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("msgpack decoding failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("invalid storage key `{0}`")]
    InvalidKey(String),
}

pub type Result<T, E = CellError> = std::result::Result<T, E>;
