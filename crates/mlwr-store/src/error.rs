use mlwr_types::{Dhash, ObjectKind};

/// Errors from object repository operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(Dhash),

    /// The content hash is already bound to an object of another kind.
    #[error("object {dhash} already exists as {existing}, cannot store it as {requested}")]
    TypeConflict {
        dhash: Dhash,
        existing: ObjectKind,
        requested: ObjectKind,
    },

    /// The object to be created is malformed.
    #[error("invalid object: {0}")]
    InvalidObject(String),

    /// An upload marker was released more often than it was taken.
    #[error("no pending upload for {0}")]
    NoPendingUpload(Dhash),

}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
