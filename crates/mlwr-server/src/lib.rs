//! HTTP server for MLWR.
//!
//! Serves the object resources of a repository node (items, downloads,
//! uploads, search) and the remote endpoints that pull objects from or push
//! them to configured peers.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use auth::{AuthProvider, Caller, TokenAuth};
pub use config::{ServerConfig, UserConfig};
pub use error::{ServerError, ServerResult};
pub use server::MlwrServer;
pub use state::AppState;
