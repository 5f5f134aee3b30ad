//! HTTP client for a named peer.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use mlwr_protocol::AuthMethod;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RemoteError, RemoteResult};
use crate::transport::{RemoteTransport, DOWNLOAD_CHUNK_SIZE};

pub const USER_AGENT: &str = concat!("mlwr/", env!("CARGO_PKG_VERSION"));

/// Deadline applied to every outbound request unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A configured peer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub name: String,
    /// Base URL, without the `/api` suffix.
    pub url: String,
    pub api_key: String,
}

/// [`RemoteTransport`] over HTTP with bearer authentication.
pub struct HttpRemote {
    config: RemoteConfig,
    client: Client,
}

impl HttpRemote {
    pub fn new(config: RemoteConfig, timeout: Duration) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { config, client })
    }

    /// Look `name` up among the configured remotes.
    pub fn connect(remotes: &[RemoteConfig], name: &str, timeout: Duration) -> RemoteResult<Self> {
        let config = remotes
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .ok_or_else(|| RemoteError::UnknownRemote(name.to_string()))?;
        Self::new(config, timeout)
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/api/{}",
            self.config.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Credentials sent with every request. An empty key sends none.
    pub fn auth(&self) -> AuthMethod {
        if self.config.api_key.is_empty() {
            AuthMethod::Anonymous
        } else {
            AuthMethod::Bearer(self.config.api_key.clone())
        }
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let request = match self.auth().header_value() {
            Some(value) => request.header(AUTHORIZATION, value),
            None => request,
        };
        check_status(request.send().await?)
    }
}

impl std::fmt::Debug for HttpRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRemote")
            .field("name", &self.config.name)
            .field("url", &self.config.url)
            .finish()
    }
}

fn check_status(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    tracing::debug!(status = status.as_u16(), url = %response.url(), "remote request rejected");
    Err(match status {
        StatusCode::NOT_FOUND => RemoteError::NotFound,
        StatusCode::FORBIDDEN => RemoteError::Forbidden,
        StatusCode::CONFLICT => RemoteError::Conflict,
        other => RemoteError::Status(other.as_u16()),
    })
}

#[async_trait]
impl RemoteTransport for HttpRemote {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn get_json(&self, path: &str) -> RemoteResult<Value> {
        let response = self.send(self.client.get(self.url(path))).await?;
        Ok(response.json().await?)
    }

    async fn download(&self, path: &str, sink: &mut (dyn Write + Send)) -> RemoteResult<u64> {
        let mut response = self.send(self.client.get(self.url(path))).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            for piece in chunk.chunks(DOWNLOAD_CHUNK_SIZE) {
                sink.write_all(piece)
                    .map_err(|e| RemoteError::Transport(e.to_string()))?;
                written += piece.len() as u64;
            }
        }
        Ok(written)
    }

    async fn post_json(&self, path: &str, body: &Value) -> RemoteResult<Value> {
        let response = self
            .send(self.client.post(self.url(path)).json(body))
            .await?;
        Ok(response.json().await?)
    }

    async fn post_file(
        &self,
        path: &str,
        file_name: &str,
        data: Vec<u8>,
        options: &Value,
    ) -> RemoteResult<Value> {
        let form = Form::new()
            .part("file", Part::bytes(data).file_name(file_name.to_string()))
            .text("options", options.to_string());
        let response = self
            .send(self.client.post(self.url(path)).multipart(form))
            .await?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn remote(server: &MockServer) -> HttpRemote {
        HttpRemote::new(
            RemoteConfig {
                name: "rbox".into(),
                url: server.uri(),
                api_key: "secret-key".into(),
            },
            DEFAULT_TIMEOUT,
        )
        .unwrap()
    }

    // ── Construction ────────────────────────────────────────────────

    #[test]
    fn connect_unknown_remote() {
        let remotes = vec![RemoteConfig {
            name: "rbox".into(),
            url: "http://localhost:1".into(),
            api_key: "k".into(),
        }];
        assert!(HttpRemote::connect(&remotes, "rbox", DEFAULT_TIMEOUT).is_ok());
        assert!(matches!(
            HttpRemote::connect(&remotes, "other", DEFAULT_TIMEOUT),
            Err(RemoteError::UnknownRemote(name)) if name == "other"
        ));
    }

    #[test]
    fn url_joins_api_prefix() {
        let remote = HttpRemote::new(
            RemoteConfig {
                name: "r".into(),
                url: "https://mwdb.example/".into(),
                api_key: "k".into(),
            },
            DEFAULT_TIMEOUT,
        )
        .unwrap();
        assert_eq!(remote.url("config/ab12"), "https://mwdb.example/api/config/ab12");
        assert_eq!(remote.url("/blob"), "https://mwdb.example/api/blob");
    }

    // ── Requests ────────────────────────────────────────────────────

    #[tokio::test]
    async fn get_json_sends_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/config/ab12"))
            .and(header("authorization", "Bearer secret-key"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"family": "emotet"})))
            .expect(1)
            .mount(&server)
            .await;

        let body = remote(&server).get_json("config/ab12").await.unwrap();
        assert_eq!(body["family"], "emotet");
    }

    #[tokio::test]
    async fn empty_key_sends_no_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        let remote = HttpRemote::new(
            RemoteConfig {
                name: "open".into(),
                url: server.uri(),
                api_key: String::new(),
            },
            DEFAULT_TIMEOUT,
        )
        .unwrap();
        assert_eq!(remote.auth(), AuthMethod::Anonymous);

        remote.get_json("info").await.unwrap();
        let received = server.received_requests().await.unwrap();
        assert!(received[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn status_codes_map_to_errors() {
        let server = MockServer::start().await;
        for (code, p) in [(404, "/api/a"), (403, "/api/b"), (409, "/api/c"), (500, "/api/d")] {
            Mock::given(method("GET"))
                .and(path(p))
                .respond_with(ResponseTemplate::new(code))
                .mount(&server)
                .await;
        }
        let remote = remote(&server);
        assert!(matches!(remote.get_json("a").await, Err(RemoteError::NotFound)));
        assert!(matches!(remote.get_json("b").await, Err(RemoteError::Forbidden)));
        assert!(matches!(remote.get_json("c").await, Err(RemoteError::Conflict)));
        assert!(matches!(remote.get_json("d").await, Err(RemoteError::Status(500))));
    }

    #[tokio::test]
    async fn invalid_json_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        assert!(matches!(
            remote(&server).get_json("x").await,
            Err(RemoteError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn slow_peer_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;
        let remote = HttpRemote::new(
            RemoteConfig {
                name: "slow".into(),
                url: server.uri(),
                api_key: "k".into(),
            },
            Duration::from_millis(50),
        )
        .unwrap();
        assert!(matches!(remote.get_json("x").await, Err(RemoteError::Timeout)));
    }

    #[tokio::test]
    async fn download_streams_whole_body() {
        let server = MockServer::start().await;
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        Mock::given(method("GET"))
            .and(path("/api/file/ab12/download"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(content.clone()))
            .mount(&server)
            .await;

        let mut sink = Vec::new();
        let written = remote(&server)
            .download("file/ab12/download", &mut sink)
            .await
            .unwrap();
        assert_eq!(written, content.len() as u64);
        assert_eq!(sink, content);
    }

    #[tokio::test]
    async fn post_json_returns_peer_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/blob"))
            .and(body_string_contains("\"upload_as\":\"*\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "x"})))
            .expect(1)
            .mount(&server)
            .await;

        let body = remote(&server)
            .post_json("blob", &json!({"content": "c", "upload_as": "*"}))
            .await
            .unwrap();
        assert_eq!(body, json!({"id": "x"}));
    }

    #[tokio::test]
    async fn post_file_sends_multipart_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/file"))
            .and(body_string_contains("name=\"file\"; filename=\"a.exe\""))
            .and(body_string_contains("name=\"options\""))
            .and(body_string_contains("MZ-payload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"file_name": "a.exe"})))
            .expect(1)
            .mount(&server)
            .await;

        let body = remote(&server)
            .post_file("file", "a.exe", b"MZ-payload".to_vec(), &json!({"upload_as": "*"}))
            .await
            .unwrap();
        assert_eq!(body["file_name"], "a.exe");
    }
}
