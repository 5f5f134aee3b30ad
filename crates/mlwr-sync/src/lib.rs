//! Federation between MLWR nodes.
//!
//! Pulls objects from configured peers into the local repository and
//! pushes local objects to them. Config documents travel with their
//! `in-blob` references expanded to inline content and are stored with
//! compact references pointing at local blobs.

pub mod error;
pub mod federation;
pub mod guard;
pub mod hooks;
pub mod references;
pub mod remote;
pub mod shares;
pub mod transport;
pub mod upload;

pub use error::{RemoteError, RemoteResult, SyncError, SyncResult};
pub use federation::{Federation, SPOOL_THRESHOLD};
pub use guard::UploadGuard;
pub use hooks::{NoOpHooks, ObjectHooks};
pub use references::{expand_references, ReferencePlan};
pub use remote::{HttpRemote, RemoteConfig, DEFAULT_TIMEOUT, USER_AGENT};
pub use shares::{resolve_share_groups, upload_context};
pub use transport::{RemoteTransport, DOWNLOAD_CHUNK_SIZE};
pub use upload::Uploader;
