//! Request and response bodies of the object and remote endpoints.

use mlwr_search::QueryNode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Share with every group of the uploader.
pub const UPLOAD_AS_ALL: &str = "*";
/// Share only with the uploader's private group.
pub const UPLOAD_AS_PRIVATE: &str = "private";

fn default_upload_as() -> String {
    UPLOAD_AS_ALL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_config_type() -> String {
    "static".to_string()
}

/// Body of the remote pull/push endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOptions {
    #[serde(default = "default_upload_as")]
    pub upload_as: String,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            upload_as: default_upload_as(),
        }
    }
}

/// `options` part of a multipart file upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOptions {
    #[serde(default = "default_upload_as")]
    pub upload_as: String,
    #[serde(default = "default_true")]
    pub share_3rd_party: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            upload_as: default_upload_as(),
            share_3rd_party: true,
        }
    }
}

/// `POST config` body. `cfg` may hold compact or inline `in-blob`
/// references.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigCreateRequest {
    pub family: String,
    #[serde(default = "default_config_type")]
    pub config_type: String,
    pub cfg: Value,
    #[serde(default = "default_upload_as")]
    pub upload_as: String,
    #[serde(default = "default_true")]
    pub share_3rd_party: bool,
}

/// `POST blob` body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobCreateRequest {
    pub blob_name: String,
    pub blob_type: String,
    pub content: String,
    #[serde(default = "default_upload_as")]
    pub upload_as: String,
    #[serde(default = "default_true")]
    pub share_3rd_party: bool,
}

/// `POST {kind}/search` body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: QueryNode,
}

/// `GET remote` response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotesResponse {
    pub remotes: Vec<String>,
}

/// Body of every error response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}
