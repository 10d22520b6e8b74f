//! Error taxonomy for impact analysis.
//!
//! Transport problems never reach this type through the normal read path:
//! connectors log them and degrade to "no data". What remains are caller
//! defects, collaborator failures and unreadable inputs.

use std::path::PathBuf;

use testscope_transport::TransportError;

/// Impact analysis errors.
#[derive(Debug, thiserror::Error)]
pub enum ImpactError {
    #[error("relationship engine queried before init")]
    NotInitialized,

    #[error("git error: {0}")]
    Git(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("unreadable relationship artifact {path:?}: {reason}")]
    Artifact { path: PathBuf, reason: String },

    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for impact analysis operations.
pub type Result<T> = std::result::Result<T, ImpactError>;
