use std::sync::Arc;

use mlwr_search::FieldRegistry;
use mlwr_store::{InMemoryRepository, ObjectRepository};
use mlwr_sync::{Federation, NoOpHooks, ObjectHooks, Uploader};

use crate::auth::{AuthProvider, TokenAuth};
use crate::config::ServerConfig;

/// State shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub repo: Arc<dyn ObjectRepository>,
    pub registry: Arc<FieldRegistry>,
    pub hooks: Arc<dyn ObjectHooks>,
    pub auth: Arc<dyn AuthProvider>,
}

impl AppState {
    /// In-memory repository, default search fields, token auth from the
    /// configured users, and no hooks.
    pub fn new(config: ServerConfig) -> Self {
        let auth = TokenAuth::new(&config.users);
        Self {
            config: Arc::new(config),
            repo: Arc::new(InMemoryRepository::new()),
            registry: Arc::new(FieldRegistry::with_defaults()),
            hooks: Arc::new(NoOpHooks),
            auth: Arc::new(auth),
        }
    }

    pub fn with_repository(mut self, repo: Arc<dyn ObjectRepository>) -> Self {
        self.repo = repo;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ObjectHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = auth;
        self
    }

    pub fn uploader(&self) -> Uploader<'_, dyn ObjectRepository> {
        Uploader::new(self.repo.as_ref(), self.hooks.as_ref())
    }

    pub fn federation(&self) -> Federation<'_, dyn ObjectRepository> {
        Federation::new(self.repo.as_ref(), self.hooks.as_ref())
    }
}
