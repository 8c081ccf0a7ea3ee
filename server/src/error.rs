use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the server outside of the ingress itself.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown network: {0}")]
    UnknownNetwork(String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid base64 in {0}")]
    Base64(&'static str),
    #[error("invalid length for {field}: expected {expected}, got {actual}")]
    Length {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid {field}: {value}")]
    Value { field: &'static str, value: i64 },
    #[error("keystore is missing its address")]
    MissingAddress,
    #[error("keystore could not be decrypted")]
    Decrypt,
    #[error("ingress error: {0}")]
    Ingress(#[from] darkpool_ingress::Error),
}

impl Error {
    /// Returns true if the error was caused by the client's request.
    pub fn is_invalid_request(&self) -> bool {
        match self {
            Error::Json(_)
            | Error::Base64(_)
            | Error::Length { .. }
            | Error::Value { .. } => true,
            Error::Ingress(err) => err.is_invalid_request(),
            _ => false,
        }
    }
}
