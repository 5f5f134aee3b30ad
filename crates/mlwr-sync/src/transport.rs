use std::io::Write;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RemoteResult;

/// Fixed size of the pieces a download is written in.
pub const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Request interface to a peer MLWR node.
///
/// Paths are relative to the peer's `/api/` prefix, e.g. `config/<id>`.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Configured name of the peer.
    fn name(&self) -> &str;

    async fn get_json(&self, path: &str) -> RemoteResult<Value>;

    /// Stream a raw body into `sink`, returning the number of bytes written.
    async fn download(&self, path: &str, sink: &mut (dyn Write + Send)) -> RemoteResult<u64>;

    async fn post_json(&self, path: &str, body: &Value) -> RemoteResult<Value>;

    /// Multipart upload with a `file` part and an `options` JSON part.
    async fn post_file(
        &self,
        path: &str,
        file_name: &str,
        data: Vec<u8>,
        options: &Value,
    ) -> RemoteResult<Value>;
}
