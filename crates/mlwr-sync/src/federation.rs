//! Pull and push of objects between this node and a remote peer.
//!
//! A pull moves through `initiated -> validated -> content transferred ->
//! dependencies resolved -> materialized -> completed`; a push through
//! `initiated -> validated -> submitted -> completed`. Any step may abort to
//! `failed`. Nothing is written locally before the final batch apply, so an
//! aborted pull leaves the repository untouched.

use std::io::{Read, Seek, SeekFrom};

use mlwr_protocol::{create_path, download_path, object_path, InlineBlob, ObjectItem, RemoteOptions};
use mlwr_store::{NewObject, ObjectBody, ObjectRepository, WriteBatch};
use mlwr_types::{Capability, Dhash, Identity, ObjectKind};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tempfile::SpooledTempFile;

use crate::error::{RemoteError, SyncError, SyncResult};
use crate::hooks::ObjectHooks;
use crate::references::{expand_references, ReferencePlan};
use crate::shares::upload_context;
use crate::transport::RemoteTransport;
use crate::upload::{require, Uploader};

/// Downloads larger than this spill from memory to a temporary file.
pub const SPOOL_THRESHOLD: usize = 8 * 1024 * 1024;

fn default_true() -> bool {
    true
}

fn default_config_type() -> String {
    "static".to_string()
}

/// The parts of a peer's file item a pull needs.
#[derive(Debug, Deserialize)]
struct PeerFile {
    file_name: String,
    #[serde(default = "default_true")]
    share_3rd_party: bool,
}

#[derive(Debug, Deserialize)]
struct PeerConfig {
    family: String,
    #[serde(default = "default_config_type")]
    config_type: String,
    cfg: Value,
    #[serde(default = "default_true")]
    share_3rd_party: bool,
}

#[derive(Debug, Deserialize)]
struct PeerBlob {
    blob_name: String,
    blob_type: String,
    content: String,
    #[serde(default = "default_true")]
    share_3rd_party: bool,
}

fn decode<T: DeserializeOwned>(value: Value) -> SyncResult<T> {
    Ok(serde_json::from_value(value).map_err(RemoteError::from)?)
}

pub struct Federation<'a, R: ObjectRepository + ?Sized> {
    uploader: Uploader<'a, R>,
}

impl<'a, R: ObjectRepository + ?Sized> Federation<'a, R> {
    pub fn new(repo: &'a R, hooks: &'a dyn ObjectHooks) -> Self {
        Self {
            uploader: Uploader::new(repo, hooks),
        }
    }

    /// Copy object `id` of `kind` from `remote` into the local repository.
    pub async fn pull(
        &self,
        remote: &dyn RemoteTransport,
        identity: &Identity,
        kind: ObjectKind,
        id: &Dhash,
        options: &RemoteOptions,
    ) -> SyncResult<ObjectItem> {
        let remote_name = remote.name();
        tracing::debug!(remote_name, %kind, %id, "pull initiated");
        let result = match kind {
            ObjectKind::File => self.pull_file(remote, identity, id, options).await,
            ObjectKind::Config => self.pull_config(remote, identity, id, options).await,
            ObjectKind::TextBlob => self.pull_blob(remote, identity, id, options).await,
        };
        match &result {
            Ok(item) => tracing::debug!(remote_name, %kind, dhash = %item.id(), "pull completed"),
            Err(e) => tracing::debug!(remote_name, %kind, %id, error = %e, "pull failed"),
        }
        result
    }

    async fn pull_file(
        &self,
        remote: &dyn RemoteTransport,
        identity: &Identity,
        id: &Dhash,
        options: &RemoteOptions,
    ) -> SyncResult<ObjectItem> {
        require(identity, Capability::AccessRemotes)?;
        let meta: PeerFile = decode(remote.get_json(&object_path(ObjectKind::File, id)).await?)?;
        let context = upload_context(identity, &options.upload_as, meta.share_3rd_party)?;
        tracing::debug!(%id, "pull validated");

        let mut spool = SpooledTempFile::new(SPOOL_THRESHOLD);
        let size = remote.download(&download_path(id), &mut spool).await?;
        spool.seek(SeekFrom::Start(0))?;
        // Repository backends take owned content; the spool only bounds
        // memory while the transfer is in flight.
        let mut data = Vec::with_capacity(usize::try_from(size).unwrap_or_default());
        spool.read_to_end(&mut data)?;
        tracing::debug!(%id, size, "content transferred");

        let mut batch = WriteBatch::new(context);
        let top = batch.add_object(NewObject::file(meta.file_name, data));
        self.uploader.commit(batch, top, Some(remote.name())).await
    }

    async fn pull_config(
        &self,
        remote: &dyn RemoteTransport,
        identity: &Identity,
        id: &Dhash,
        options: &RemoteOptions,
    ) -> SyncResult<ObjectItem> {
        require(identity, Capability::AccessRemotes)?;
        let meta: PeerConfig =
            decode(remote.get_json(&object_path(ObjectKind::Config, id)).await?)?;
        let context = upload_context(identity, &options.upload_as, meta.share_3rd_party)?;
        let mut plan = ReferencePlan::collect(self.uploader.repo(), &meta.cfg)?;
        tracing::debug!(%id, "pull validated");

        for blob_id in plan.missing().to_vec() {
            let blob: PeerBlob =
                decode(remote.get_json(&object_path(ObjectKind::TextBlob, &blob_id)).await?)?;
            tracing::debug!(%id, %blob_id, "referenced blob fetched");
            plan.supply(
                blob_id,
                InlineBlob {
                    content: blob.content,
                    blob_name: blob.blob_name,
                    blob_type: blob.blob_type,
                },
            )?;
        }
        tracing::debug!(%id, blobs = plan.children().len(), "dependencies resolved");

        let (batch, top) = self.uploader.config_batch(
            identity,
            context,
            meta.family,
            meta.config_type,
            &meta.cfg,
            plan,
        )?;
        self.uploader.commit(batch, top, Some(remote.name())).await
    }

    async fn pull_blob(
        &self,
        remote: &dyn RemoteTransport,
        identity: &Identity,
        id: &Dhash,
        options: &RemoteOptions,
    ) -> SyncResult<ObjectItem> {
        require(identity, Capability::AccessRemotes)?;
        let meta: PeerBlob =
            decode(remote.get_json(&object_path(ObjectKind::TextBlob, id)).await?)?;
        let context = upload_context(identity, &options.upload_as, meta.share_3rd_party)?;
        tracing::debug!(%id, "pull validated");

        let mut batch = WriteBatch::new(context);
        let top = batch.add_object(NewObject::text_blob(
            meta.blob_name,
            meta.blob_type,
            meta.content,
        ));
        self.uploader.commit(batch, top, Some(remote.name())).await
    }

    /// Submit local object `id` of `kind` to `remote`, returning the peer's
    /// response verbatim.
    pub async fn push(
        &self,
        remote: &dyn RemoteTransport,
        identity: &Identity,
        kind: ObjectKind,
        id: &Dhash,
        options: &RemoteOptions,
    ) -> SyncResult<Value> {
        let remote_name = remote.name();
        tracing::debug!(remote_name, %kind, %id, "push initiated");
        let result = self.submit(remote, identity, kind, id, options).await;
        match &result {
            Ok(_) => tracing::info!(dhash = %id, remote_name, "{kind} pushed remote"),
            Err(e) => tracing::debug!(remote_name, %kind, %id, error = %e, "push failed"),
        }
        result
    }

    async fn submit(
        &self,
        remote: &dyn RemoteTransport,
        identity: &Identity,
        kind: ObjectKind,
        id: &Dhash,
        options: &RemoteOptions,
    ) -> SyncResult<Value> {
        require(identity, Capability::AccessRemotes)?;
        let repo = self.uploader.repo();
        let object = repo
            .access(kind, id)?
            .ok_or(SyncError::ObjectNotFound { kind, id: *id })?;

        match &object.body {
            ObjectBody::File(file) => {
                let data = repo
                    .read_content(id)?
                    .ok_or(SyncError::ObjectNotFound { kind, id: *id })?;
                tracing::debug!(%id, size = data.len(), "push validated");
                let upload = json!({"upload_as": options.upload_as});
                Ok(remote
                    .post_file(&create_path(kind), &file.file_name, data, &upload)
                    .await?)
            }
            ObjectBody::Config(config) => {
                let cfg = expand_references(repo, &config.cfg)?;
                tracing::debug!(%id, "push validated");
                let body = json!({
                    "family": config.family,
                    "cfg": cfg,
                    "config_type": config.config_type,
                    "upload_as": options.upload_as,
                });
                Ok(remote.post_json(&create_path(kind), &body).await?)
            }
            ObjectBody::TextBlob(blob) => {
                tracing::debug!(%id, "push validated");
                let body = json!({
                    "blob_name": blob.blob_name,
                    "blob_type": blob.blob_type,
                    "content": blob.content,
                    "upload_as": options.upload_as,
                });
                Ok(remote.post_json(&create_path(kind), &body).await?)
            }
        }
    }
}
