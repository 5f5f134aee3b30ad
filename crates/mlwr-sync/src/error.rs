use mlwr_protocol::ProtocolError;
use mlwr_store::StoreError;
use mlwr_types::{Capability, Dhash, ObjectKind};
use thiserror::Error;

/// Failure of a single request against a peer.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("unknown remote: {0}")]
    UnknownRemote(String),

    #[error("remote object not found")]
    NotFound,

    #[error("access to the remote object is forbidden")]
    Forbidden,

    #[error("object exists on remote with a different type")]
    Conflict,

    #[error("remote responded with status {0}")]
    Status(u16),

    #[error("remote request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid remote response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("{kind} {id} not found")]
    ObjectNotFound { kind: ObjectKind, id: Dhash },

    #[error("referenced blob {0} not found")]
    BlobNotFound(Dhash),

    #[error("group not found: {0}")]
    GroupNotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("missing capability: {0}")]
    Forbidden(Capability),

    #[error("object {dhash} already exists as {existing}, cannot store it as {requested}")]
    Conflict {
        dhash: Dhash,
        existing: ObjectKind,
        requested: ObjectKind,
    },

    #[error("hook failed: {0}")]
    Hook(String),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::TypeConflict {
                dhash,
                existing,
                requested,
            } => Self::Conflict {
                dhash,
                existing,
                requested,
            },
            StoreError::InvalidObject(reason) => Self::BadRequest(reason),
            other => Self::Store(other),
        }
    }
}

impl From<ProtocolError> for SyncError {
    fn from(e: ProtocolError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
