use async_trait::async_trait;
use mlwr_store::{Materialized, ObjectBody, StoredObject};

use crate::error::SyncResult;

/// Notifications fired after an object is materialized.
///
/// The generic hook runs first, then the one for the object's kind. All
/// methods default to doing nothing.
#[async_trait]
pub trait ObjectHooks: Send + Sync {
    async fn on_created_object(&self, _object: &StoredObject) -> SyncResult<()> {
        Ok(())
    }

    async fn on_reuploaded_object(&self, _object: &StoredObject) -> SyncResult<()> {
        Ok(())
    }

    async fn on_created_file(&self, _object: &StoredObject) -> SyncResult<()> {
        Ok(())
    }

    async fn on_reuploaded_file(&self, _object: &StoredObject) -> SyncResult<()> {
        Ok(())
    }

    async fn on_created_config(&self, _object: &StoredObject) -> SyncResult<()> {
        Ok(())
    }

    async fn on_reuploaded_config(&self, _object: &StoredObject) -> SyncResult<()> {
        Ok(())
    }

    async fn on_created_text_blob(&self, _object: &StoredObject) -> SyncResult<()> {
        Ok(())
    }

    async fn on_reuploaded_text_blob(&self, _object: &StoredObject) -> SyncResult<()> {
        Ok(())
    }
}

pub struct NoOpHooks;

impl ObjectHooks for NoOpHooks {}

/// Fire the created or reuploaded hooks for `materialized`.
pub async fn fire(hooks: &dyn ObjectHooks, materialized: &Materialized) -> SyncResult<()> {
    let object = &materialized.object;
    if materialized.is_new {
        hooks.on_created_object(object).await?;
        match &object.body {
            ObjectBody::File(_) => hooks.on_created_file(object).await,
            ObjectBody::Config(_) => hooks.on_created_config(object).await,
            ObjectBody::TextBlob(_) => hooks.on_created_text_blob(object).await,
        }
    } else {
        hooks.on_reuploaded_object(object).await?;
        match &object.body {
            ObjectBody::File(_) => hooks.on_reuploaded_file(object).await,
            ObjectBody::Config(_) => hooks.on_reuploaded_config(object).await,
            ObjectBody::TextBlob(_) => hooks.on_reuploaded_text_blob(object).await,
        }
    }
}
