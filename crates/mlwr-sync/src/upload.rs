//! Create-or-reuse of uploaded objects.

use mlwr_protocol::{BlobCreateRequest, ConfigCreateRequest, ObjectItem, UploadOptions};
use mlwr_store::{NewObject, ObjectRepository, UploadContext, WriteBatch};
use mlwr_types::{Capability, Dhash, Identity};
use serde_json::Value;

use crate::error::{SyncError, SyncResult};
use crate::guard::UploadGuard;
use crate::hooks::{self, ObjectHooks};
use crate::references::ReferencePlan;
use crate::shares::upload_context;

pub(crate) fn require(identity: &Identity, capability: Capability) -> SyncResult<()> {
    if identity.has(capability) {
        Ok(())
    } else {
        tracing::warn!(login = %identity.login, %capability, "missing capability");
        Err(SyncError::Forbidden(capability))
    }
}

/// Materializes uploads into a repository and fires the object hooks.
pub struct Uploader<'a, R: ObjectRepository + ?Sized> {
    repo: &'a R,
    hooks: &'a dyn ObjectHooks,
}

impl<'a, R: ObjectRepository + ?Sized> Uploader<'a, R> {
    pub fn new(repo: &'a R, hooks: &'a dyn ObjectHooks) -> Self {
        Self { repo, hooks }
    }

    pub fn repo(&self) -> &'a R {
        self.repo
    }

    /// Apply `batch` and fire the hooks of its top-level object `top`.
    ///
    /// Upload markers of every materialized object are released once the
    /// hooks have run, whatever their outcome.
    pub async fn commit(
        &self,
        batch: WriteBatch,
        top: Dhash,
        origin: Option<&str>,
    ) -> SyncResult<ObjectItem> {
        let materialized = self.repo.apply(batch)?;
        let _guard = UploadGuard::new(self.repo, materialized.iter().map(|m| m.object.dhash()));
        let item = materialized
            .iter()
            .rev()
            .find(|m| m.object.dhash() == top)
            .ok_or(SyncError::Store(mlwr_store::StoreError::NotFound(top)))?;
        tracing::debug!(dhash = %top, is_new = item.is_new, objects = materialized.len(), "materialized");

        hooks::fire(self.hooks, item).await?;

        let remote_name = origin.unwrap_or("local");
        let kind = item.object.kind();
        if item.is_new {
            tracing::info!(dhash = %top, is_new = true, remote_name, "{kind} added");
        } else {
            tracing::info!(dhash = %top, is_new = false, remote_name, "{kind} reuploaded");
        }
        Ok(ObjectItem::from(&item.object))
    }

    /// Batch holding a config, the blobs its references stage, and the
    /// blob->config links. Returns the config's identifier as well.
    ///
    /// Fails with `BlobNotFound` while the plan still has missing blobs,
    /// and with `Forbidden` when a blob would be created without the
    /// `adding_blobs` capability.
    pub fn config_batch(
        &self,
        identity: &Identity,
        context: UploadContext,
        family: String,
        config_type: String,
        cfg: &Value,
        plan: ReferencePlan,
    ) -> SyncResult<(WriteBatch, Dhash)> {
        if let Some(missing) = plan.missing().first() {
            return Err(SyncError::BlobNotFound(*missing));
        }
        if plan.creates_blobs(self.repo)? {
            require(identity, Capability::AddingBlobs)?;
        }
        let rewritten = plan.rewrite(cfg)?;
        let config = NewObject::config(family, config_type, rewritten);
        config.validate()?;
        let top = config.dhash();

        let mut batch = WriteBatch::new(context);
        plan.stage_into(&mut batch, top);
        batch.add_object(config);
        Ok((batch, top))
    }

    pub async fn upload_file(
        &self,
        identity: &Identity,
        file_name: &str,
        data: Vec<u8>,
        options: &UploadOptions,
    ) -> SyncResult<ObjectItem> {
        require(identity, Capability::AddingFiles)?;
        let context = upload_context(identity, &options.upload_as, options.share_3rd_party)?;
        let mut batch = WriteBatch::new(context);
        let top = batch.add_object(NewObject::file(file_name, data));
        self.commit(batch, top, None).await
    }

    /// Compact references must name local blobs; inline ones are created.
    pub async fn upload_config(
        &self,
        identity: &Identity,
        request: &ConfigCreateRequest,
    ) -> SyncResult<ObjectItem> {
        require(identity, Capability::AddingConfigs)?;
        let context = upload_context(identity, &request.upload_as, request.share_3rd_party)?;
        let plan = ReferencePlan::collect(self.repo, &request.cfg)?;
        let (batch, top) = self.config_batch(
            identity,
            context,
            request.family.clone(),
            request.config_type.clone(),
            &request.cfg,
            plan,
        )?;
        self.commit(batch, top, None).await
    }

    pub async fn upload_blob(
        &self,
        identity: &Identity,
        request: &BlobCreateRequest,
    ) -> SyncResult<ObjectItem> {
        require(identity, Capability::AddingBlobs)?;
        let context = upload_context(identity, &request.upload_as, request.share_3rd_party)?;
        let mut batch = WriteBatch::new(context);
        let top = batch.add_object(NewObject::text_blob(
            &request.blob_name,
            &request.blob_type,
            &request.content,
        ));
        self.commit(batch, top, None).await
    }
}
