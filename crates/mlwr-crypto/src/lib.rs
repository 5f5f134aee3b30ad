//! Digest computation for MLWR.
//!
//! Provides the derived file hashes (md5/sha1/sha256/sha512/crc32) and the
//! content-derived identifiers ([`Dhash`](mlwr_types::Dhash)) for every
//! object kind. All digests wrap established libraries.

pub mod hasher;

pub use hasher::{ContentHasher, FileDigests};
