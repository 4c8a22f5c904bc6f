//! Serdes error types.

use std::path::PathBuf;

/// Errors from converting state values to and from the wire.
///
/// `serialise` itself never fails; these surface only when a caller asks
/// for strict JSON output or loads a file into a wrapper.
#[derive(Debug, thiserror::Error)]
pub enum SerdesError {
    #[error("value of type {0} is not wire-safe; serialise it first")]
    NotWireSafe(String),

    #[error("float {0} has no JSON representation")]
    NonFinite(f64),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type SerdesResult<T> = Result<T, SerdesError>;
