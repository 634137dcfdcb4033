//! Error type for typed cache access.

use thiserror::Error;

/// Errors raised while moving typed values in and out of the cache.
#[derive(Debug, Error)]
pub enum Error {
    /// The cached JSON value does not deserialize into the requested type.
    #[error("cache entry `{key}` could not be decoded: {source}")]
    Decode {
        /// Key of the offending entry.
        key: String,
        /// Underlying serde failure.
        #[source]
        source: serde_json::Error,
    },

    /// A value handed to the cache could not be serialized.
    #[error("value for cache entry `{key}` could not be encoded: {source}")]
    Encode {
        /// Key of the offending entry.
        key: String,
        /// Underlying serde failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Result alias used across the store API.
pub type Result<T> = std::result::Result<T, Error>;
