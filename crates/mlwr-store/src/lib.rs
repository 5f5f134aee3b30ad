//! Object model and repository backend for MLWR.
//!
//! Every object is identified by its [`Dhash`](mlwr_types::Dhash), derived
//! from canonical content, so uploading the same content twice under the
//! same kind resolves to the same object.
//!
//! # Object Types
//!
//! - [`File`] -- binary sample with derived hashes and alternate names
//! - [`Config`] -- semi-structured configuration document
//! - [`TextBlob`] -- textual content, usually referenced from configs
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectRepository`] trait:
//!
//! - [`InMemoryRepository`] -- `HashMap`-based repository for tests and embedding
//!
//! # Design Rules
//!
//! 1. Identifying attributes are immutable once written; only metadata grows.
//! 2. Writes are applied as a [`WriteBatch`]: the whole batch is validated
//!    before anything is written, so a failed batch leaves no trace.
//! 3. Create-or-reuse: materializing existing content returns the existing
//!    object with `is_new == false`.
//! 4. Every materialized object carries an upload marker until released.

pub mod batch;
pub mod error;
pub mod memory;
pub mod object;
pub mod traits;

pub use batch::{Annotation, Link, Materialized, NewFile, NewObject, UploadContext, WriteBatch};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryRepository;
pub use object::{
    detect_file_type, Comment, Config, File, ObjectBody, ObjectMeta, Share, StoredObject, TextBlob,
};
pub use traits::ObjectRepository;
