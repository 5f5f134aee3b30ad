use mlwr_types::{Dhash, ObjectKind};
use serde::{Deserialize, Serialize};

/// HTTP endpoint paths of the MLWR API.
pub mod endpoints {
    /// Every route lives under this prefix.
    pub const API_PREFIX: &str = "/api";
    pub const HEALTH: &str = "/api/health";
    pub const INFO: &str = "/api/info";
    pub const REMOTES: &str = "/api/remote";
    pub const REMOTE_PULL: &str = "/api/remote/:name/pull/:kind/:id";
    pub const REMOTE_PUSH: &str = "/api/remote/:name/push/:kind/:id";

    // Relative to a type prefix such as `/api/config`.
    pub const CREATE: &str = "/";
    pub const OBJECT: &str = "/:id";
    pub const DOWNLOAD: &str = "/:id/download";
    pub const SEARCH: &str = "/search";

    /// Prefix of the routes of a type, e.g. `/api/blob`.
    pub fn type_prefix(type_name: &str) -> String {
        format!("{API_PREFIX}/{type_name}")
    }
}

/// Peer-relative path of an object's metadata, e.g. `config/<id>`.
pub fn object_path(kind: ObjectKind, id: &Dhash) -> String {
    format!("{}/{id}", kind.endpoint())
}

/// Peer-relative path of a file's raw content.
pub fn download_path(id: &Dhash) -> String {
    format!("{}/{id}/download", ObjectKind::File.endpoint())
}

/// Peer-relative path of a kind's creation endpoint.
pub fn create_path(kind: ObjectKind) -> String {
    kind.endpoint().to_string()
}

/// Health check response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// Server information.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoResponse {
    pub server_version: String,
    pub instance_name: String,
    /// Registered search type names.
    pub object_types: Vec<String>,
}
