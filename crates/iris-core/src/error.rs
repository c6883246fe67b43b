//! # Error Types
//!
//! Errors shared by every crate of the workspace. Domain crates define their
//! own `thiserror` enums for their operations and wrap these where needed.

use thiserror::Error;

/// Top-level error type for the foundational layer.
#[derive(Error, Debug)]
pub enum IrisError {
    /// Input failed validation (malformed timestamp, unknown state name).
    #[error("validation error: {0}")]
    Validation(String),

    /// A required parameter is absent from the parameter store.
    ///
    /// Lenient lookups never return this; they log and fall back to the
    /// documented default instead.
    #[error("configuration parameter {key} is missing")]
    ConfigurationMissing {
        /// The parameter key that was looked up.
        key: String,
    },

    /// A parameter is present but cannot be interpreted.
    #[error("configuration parameter {key} has invalid value {value:?}")]
    ConfigurationInvalid {
        /// The parameter key.
        key: String,
        /// The raw value found in the store.
        value: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
