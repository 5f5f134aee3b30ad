use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid in-blob reference: {0}")]
    InvalidReference(String),

    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
