//! Error types for the synchronization core

use thiserror::Error;
use wattpilot_client::ClientError;

/// A coercion rule could not interpret a raw value or a requested option.
///
/// Coercion failures are values, not control flow: the update pipeline logs
/// them and keeps the previous state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    #[error("expected a {expected} value, got: {value}")]
    InvalidType {
        expected: &'static str,
        value: String,
    },

    #[error("option '{option}' not within the option table")]
    UnknownOption { option: String },

    #[error("version '{version}' not within the available versions")]
    UnknownVersion { version: String },
}

/// Errors surfaced by entity setup and entity actions
#[derive(Debug, Error)]
pub enum EntityError {
    /// The platform-specific initializer failed; the entity is excluded
    #[error("initialization failed: {0}")]
    Init(String),

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error(transparent)]
    Client(#[from] ClientError),
}
