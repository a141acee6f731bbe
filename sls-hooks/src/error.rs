//! Error types for the hooks engine

use crate::engine::EngineError;
use crate::streams::StreamName;
use std::path::PathBuf;

/// Errors surfaced to the host's hook invocation mechanism.
///
/// Unreadable manifests and failed context cleanup are tolerated and never
/// show up here.
#[derive(Debug, thiserror::Error)]
pub enum HooksError {
    #[error("Invalid serverless-hooks configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Failed to open {stream} stream at {}: {source}", path.display())]
    StreamOpen {
        stream: StreamName,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize invocation context: {0}")]
    ContextSerialize(#[source] serde_json::Error),

    #[error("Failed to write invocation context: {0}")]
    ContextWrite(#[source] std::io::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type Result<T> = std::result::Result<T, HooksError>;
