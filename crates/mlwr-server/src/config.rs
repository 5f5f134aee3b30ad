use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use mlwr_sync::RemoteConfig;
use mlwr_types::Capability;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_max_upload_size() -> usize {
    100 * 1024 * 1024
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_instance_name() -> String {
    "mlwr".to_string()
}

/// Server configuration, usually loaded from a TOML file.
///
/// ```toml
/// bind_addr = "0.0.0.0:8080"
///
/// [[remotes]]
/// name = "rbox"
/// url = "https://mwdb.example"
/// api_key = "..."
///
/// [[users]]
/// login = "alice"
/// api_key = "..."
/// groups = ["public"]
/// capabilities = ["adding_files", "access_remotes"]
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
    /// Largest accepted request body in bytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,
    /// Deadline of each request made to a remote.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub remotes: Vec<RemoteConfig>,
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            instance_name: default_instance_name(),
            max_upload_size: default_max_upload_size(),
            request_timeout_secs: default_request_timeout_secs(),
            remotes: Vec::new(),
            users: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn remote_names(&self) -> Vec<String> {
        self.remotes.iter().map(|r| r.name.clone()).collect()
    }
}

/// An API user and the token it authenticates with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    pub login: String,
    pub api_key: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(c.max_upload_size, 100 * 1024 * 1024);
        assert_eq!(c.request_timeout(), Duration::from_secs(60));
        assert!(c.remotes.is_empty());
    }

    #[test]
    fn parses_toml() {
        let c = ServerConfig::from_toml_str(
            r#"
            bind_addr = "0.0.0.0:9000"
            request_timeout_secs = 5

            [[remotes]]
            name = "rbox"
            url = "https://mwdb.example"
            api_key = "k1"

            [[users]]
            login = "alice"
            api_key = "t1"
            groups = ["public"]
            capabilities = ["adding_files", "access_remotes"]
            "#,
        )
        .unwrap();
        assert_eq!(c.bind_addr.port(), 9000);
        assert_eq!(c.request_timeout(), Duration::from_secs(5));
        assert_eq!(c.remote_names(), vec!["rbox"]);
        assert_eq!(c.users[0].capabilities, vec![Capability::AddingFiles, Capability::AccessRemotes]);
        assert_eq!(c.instance_name, "mlwr");
    }

    #[test]
    fn rejects_unknown_capability() {
        let err = ServerConfig::from_toml_str(
            r#"
            [[users]]
            login = "alice"
            api_key = "t1"
            capabilities = ["root"]
            "#,
        );
        assert!(matches!(err, Err(ServerError::Config(_))));
    }
}
