//! Error types for the exchange-adapter crate.

use thiserror::Error;

/// The main error type for this crate
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration (missing instruments, bad settings). Fatal at
    /// startup; the pipeline never starts with a broken configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP request to the snapshot provider failed
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Snapshot provider returned an unusable response
    #[error("snapshot provider error: {0}")]
    Provider(String),

    /// An outbound publish channel has no remaining receiver
    #[error("publish channel closed: {0}")]
    ChannelClosed(&'static str),
}
