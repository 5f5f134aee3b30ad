use std::collections::HashMap;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use mlwr_protocol::AuthMethod;
use mlwr_types::Identity;

use crate::config::UserConfig;
use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, method: &AuthMethod) -> ServerResult<Identity>;
}

/// Bearer-token authentication against the configured users.
pub struct TokenAuth {
    by_token: HashMap<String, Identity>,
}

impl TokenAuth {
    pub fn new(users: &[UserConfig]) -> Self {
        let by_token = users
            .iter()
            .map(|u| {
                let identity = Identity::new(
                    u.login.clone(),
                    u.groups.iter().cloned(),
                    u.capabilities.iter().copied(),
                );
                (u.api_key.clone(), identity)
            })
            .collect();
        Self { by_token }
    }
}

#[async_trait]
impl AuthProvider for TokenAuth {
    async fn authenticate(&self, method: &AuthMethod) -> ServerResult<Identity> {
        match method {
            AuthMethod::Bearer(token) => self
                .by_token
                .get(token)
                .cloned()
                .ok_or_else(|| ServerError::Unauthorized("invalid token".into())),
            AuthMethod::Anonymous => Err(ServerError::Unauthorized(
                "missing bearer token".into(),
            )),
        }
    }
}

/// The authenticated caller of a request.
pub struct Caller(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let method = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(AuthMethod::from_header)
            .unwrap_or_default();
        let identity = match state.auth.authenticate(&method).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(method = method.display_name(), error = %e, "authentication rejected");
                return Err(e);
            }
        };
        tracing::debug!(login = %identity.login, method = method.display_name(), "authenticated");
        Ok(Caller(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlwr_types::Capability;

    fn users() -> Vec<UserConfig> {
        vec![UserConfig {
            login: "alice".into(),
            api_key: "t-alice".into(),
            groups: vec!["public".into()],
            capabilities: vec![Capability::AccessRemotes],
        }]
    }

    #[tokio::test]
    async fn known_token_authenticates() {
        let auth = TokenAuth::new(&users());
        let id = auth
            .authenticate(&AuthMethod::Bearer("t-alice".into()))
            .await
            .unwrap();
        assert_eq!(id.login, "alice");
        assert_eq!(id.groups, vec!["alice", "public"]);
        assert!(id.has(Capability::AccessRemotes));
    }

    #[tokio::test]
    async fn unknown_or_missing_token_rejected() {
        let auth = TokenAuth::new(&users());
        assert!(matches!(
            auth.authenticate(&AuthMethod::Bearer("nope".into())).await,
            Err(ServerError::Unauthorized(_))
        ));
        assert!(matches!(
            auth.authenticate(&AuthMethod::Anonymous).await,
            Err(ServerError::Unauthorized(_))
        ));
    }
}
