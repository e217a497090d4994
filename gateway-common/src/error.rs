use thiserror::Error;

/// Common error type for gateway components.
#[derive(Debug, Error)]
pub enum Error {
    /// Logging could not be set up (bad filter, subscriber already set).
    #[error("Logging error: {0}")]
    Logging(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CBOR serialization error: {0}")]
    Cbor(String),

    /// A textual gNMI path could not be parsed.
    #[error("Invalid path: {0}")]
    Path(String),
}

impl From<ciborium::ser::Error<std::io::Error>> for Error {
    fn from(e: ciborium::ser::Error<std::io::Error>) -> Self {
        Error::Cbor(e.to_string())
    }
}

impl From<ciborium::de::Error<std::io::Error>> for Error {
    fn from(e: ciborium::de::Error<std::io::Error>) -> Self {
        Error::Cbor(e.to_string())
    }
}

/// Result type alias using the gateway's Error.
pub type Result<T> = std::result::Result<T, Error>;
