//! Error types.
//!
//! Fetch problems never show up here: every fetch strategy swallows its own
//! failures and hands back an empty list. The only errors that leave the
//! pipeline are configuration problems at start-up and a delivery that ran
//! out of attempts.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failure of a single delivery attempt over one transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid address: {0}")]
    Address(String),

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("transport timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery failed after {cycles} cycles; last error: {last}")]
    Exhausted {
        cycles: u32,
        #[source]
        last: TransportError,
    },
}
