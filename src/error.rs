use thiserror::Error;

/// Errors raised while validating a simulation or reading/writing a photon database.
///
/// Transport never produces one of these: configuration problems are caught
/// before the first photon is launched.
#[derive(Debug, Error)]
pub enum TurbidError {
    #[error("invalid optical properties: {0}")]
    InvalidOpticalProperties(String),

    #[error("invalid tissue definition: {0}")]
    InvalidTissue(String),

    #[error("invalid detector '{name}': {reason}")]
    InvalidDetector { name: String, reason: String },

    #[error("invalid source: {0}")]
    InvalidSource(String),

    #[error("invalid simulation input: {0}")]
    InvalidInput(String),

    #[error("photon database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for TurbidError {
    fn from(e: serde_json::Error) -> Self {
        TurbidError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TurbidError>;
