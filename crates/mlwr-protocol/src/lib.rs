//! Wire protocol for MLWR.
//!
//! Defines the endpoint paths, item representations and request bodies
//! shared by the HTTP server and the remote client, plus the `in-blob`
//! reference forms found inside config documents.

pub mod auth;
pub mod endpoint;
pub mod error;
pub mod in_blob;
pub mod item;
pub mod request;

pub use auth::AuthMethod;
pub use endpoint::{
    create_path, download_path, endpoints, object_path, HealthResponse, InfoResponse,
};
pub use error::{ProtocolError, ProtocolResult};
pub use in_blob::{collect_refs, rewrite_refs, BlobRef, InlineBlob, IN_BLOB};
pub use item::{BlobItem, ConfigItem, FileItem, ObjectItem};
pub use request::{
    BlobCreateRequest, ConfigCreateRequest, ErrorBody, RemoteOptions, RemotesResponse,
    SearchRequest, UploadOptions, UPLOAD_AS_ALL, UPLOAD_AS_PRIVATE,
};
