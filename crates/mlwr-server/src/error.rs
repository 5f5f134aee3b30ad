use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use mlwr_protocol::ErrorBody;
use mlwr_search::SearchError;
use mlwr_store::StoreError;
use mlwr_sync::{RemoteError, SyncError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("authentication failed: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RemoteError> for ServerError {
    fn from(e: RemoteError) -> Self {
        Self::Sync(SyncError::Remote(e))
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

fn remote_status(e: &RemoteError) -> StatusCode {
    match e {
        RemoteError::UnknownRemote(_) | RemoteError::NotFound => StatusCode::NOT_FOUND,
        RemoteError::Forbidden => StatusCode::FORBIDDEN,
        RemoteError::Conflict => StatusCode::CONFLICT,
        RemoteError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
        RemoteError::Status(_) | RemoteError::Transport(_) | RemoteError::Decode(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

fn sync_status(e: &SyncError) -> StatusCode {
    match e {
        SyncError::Remote(remote) => remote_status(remote),
        SyncError::ObjectNotFound { .. }
        | SyncError::BlobNotFound(_)
        | SyncError::GroupNotFound(_) => StatusCode::NOT_FOUND,
        SyncError::BadRequest(_) => StatusCode::BAD_REQUEST,
        SyncError::Forbidden(_) => StatusCode::FORBIDDEN,
        SyncError::Conflict { .. } => StatusCode::CONFLICT,
        SyncError::Hook(_) | SyncError::Store(_) | SyncError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::TypeConflict { .. } => StatusCode::CONFLICT,
        StoreError::InvalidObject(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Search(SearchError::Store(e)) => store_status(e),
            Self::Search(_) => StatusCode::BAD_REQUEST,
            Self::Sync(e) => sync_status(e),
            Self::Store(e) => store_status(e),
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "request rejected");
        }
        let body = ErrorBody {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
