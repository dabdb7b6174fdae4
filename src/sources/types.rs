// src/sources/types.rs
use async_trait::async_trait;

use crate::update::Update;

/// Why a single source produced nothing.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("selector '{0}' matched no elements")]
    SelectorMiss(String),
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{program}' exited with {status}: {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("fetch task aborted: {0}")]
    Aborted(String),
}

/// One external source. Implementations hold no per-request state.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, query: &str) -> Result<Vec<Update>, FetchError>;
    fn name(&self) -> &str;
}
