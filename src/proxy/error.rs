//! Error types for the harvesting and checking pipeline

use thiserror::Error;

/// A listing source could not be reached or its payload could not be read.
///
/// Always recovered by the harvest loop: the failing source contributes
/// nothing and the run continues with the remaining sources.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport-level failure talking to the provider
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// The provider responded but the payload had no usable structure
    #[error("unparseable response from provider: {0}")]
    Parse(String),
}

/// Invalid checker configuration, fatal before any probing begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("concurrency limit must be at least 1")]
    ZeroConcurrency,
    #[error("probe timeout must be greater than zero")]
    ZeroTimeout,
    #[error("invalid probe URL `{url}`: {reason}")]
    InvalidProbeUrl { url: String, reason: String },
}
