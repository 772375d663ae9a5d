//! The uniform contract every intelligence source satisfies

use async_trait::async_trait;
use magpie_core::{RawEntity, Target};
use thiserror::Error;

/// Errors surfaced by source adapters
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API rejected request with status {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("Failed to parse source response: {0}")]
    Parse(String),

    #[error("Source did not complete within {0}s")]
    Timeout(u64),

    #[error("Tool invocation failed: {0}")]
    Tool(String),

    #[error("Adapter misconfigured: {0}")]
    Config(String),
}

impl SourceError {
    /// Whether this failure is a timeout. Timed-out attempts are terminal
    /// for the task that ran them and are never retried.
    pub fn is_timeout(&self) -> bool {
        match self {
            SourceError::Timeout(_) => true,
            SourceError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Uniform interface over heterogeneous intelligence sources.
///
/// An adapter owns everything tool-specific: endpoints, authentication,
/// polling loops, subprocess invocation, and the translation of the tool's
/// native response shape into `RawEntity` values. Nothing downstream of
/// this trait branches on which source produced an entity.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable module identifier this adapter answers for ("shodan",
    /// "spiderfoot", ...). Targets request sources by this name.
    fn module(&self) -> &str;

    /// Collect raw entities for the target.
    ///
    /// A source that has nothing to say about the target's kind returns
    /// an empty vec rather than an error. Every fault mode (network,
    /// authentication, parsing, tool failure) maps onto `SourceError`.
    async fn fetch(&self, target: &Target) -> Result<Vec<RawEntity>, SourceError>;
}
