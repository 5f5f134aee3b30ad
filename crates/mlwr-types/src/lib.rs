//! Foundation types for MLWR.
//!
//! Every other MLWR crate depends on `mlwr-types`.
//!
//! # Key Types
//!
//! - [`Dhash`]: content-derived object identifier (SHA-256)
//! - [`ObjectKind`]: File / Config / TextBlob discriminator
//! - [`Capability`]: privileged operations granted to an identity
//! - [`Identity`]: an authenticated caller with its groups

pub mod capability;
pub mod error;
pub mod identity;
pub mod kind;
pub mod object;

pub use capability::Capability;
pub use error::TypeError;
pub use identity::Identity;
pub use kind::ObjectKind;
pub use object::Dhash;
