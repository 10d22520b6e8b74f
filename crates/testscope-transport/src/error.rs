//! Error types for testscope-transport

use thiserror::Error;

/// Errors that can occur while moving a relationship artifact
#[derive(Error, Debug)]
pub enum TransportError {
    /// A required connection option was not supplied
    #[error("missing connection option: {0}")]
    MissingOption(&'static str),

    /// Relationship kind cannot be used as an archive name
    #[error("invalid relationship kind: {0:?}")]
    InvalidKind(String),

    /// URL could not be built or parsed
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Remote answered with a non-success status
    #[error("{status} - {url}")]
    Status { status: u16, url: String },

    /// Remote redirected the request to another origin
    #[error("cross-origin redirect from {from} to {to}")]
    CrossOriginRedirect { from: String, to: String },

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(String),

    /// Archive codec failed
    #[error("archive error: {0}")]
    Archive(String),

    /// Request signing failed
    #[error("signing error: {0}")]
    Signing(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Http(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_mentions_code_and_url() {
        let err = TransportError::Status {
            status: 404,
            url: "https://artifacts.example.com/relationships.tar.gz".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("404"));
        assert!(msg.contains("relationships.tar.gz"));
    }

    #[test]
    fn missing_option_names_the_option() {
        let err = TransportError::MissingOption("url");
        assert_eq!(err.to_string(), "missing connection option: url");
    }
}
