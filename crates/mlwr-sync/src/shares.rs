use mlwr_protocol::{UPLOAD_AS_ALL, UPLOAD_AS_PRIVATE};
use mlwr_store::UploadContext;
use mlwr_types::{Capability, Identity};

use crate::error::{SyncError, SyncResult};

/// Groups an upload is shared with, from an `upload_as` directive.
///
/// `*` shares with all of the caller's groups and `private` with the
/// caller's private group only. A named group must be one of the caller's
/// groups unless they hold [`Capability::SharingWithAll`].
pub fn resolve_share_groups(identity: &Identity, upload_as: &str) -> SyncResult<Vec<String>> {
    match upload_as {
        UPLOAD_AS_ALL => Ok(identity.groups.clone()),
        UPLOAD_AS_PRIVATE => Ok(vec![identity.login.clone()]),
        group if identity.is_member(group) => Ok(vec![group.to_string()]),
        group if !group.is_empty() && identity.has(Capability::SharingWithAll) => {
            Ok(vec![group.to_string()])
        }
        group => Err(SyncError::GroupNotFound(group.to_string())),
    }
}

pub fn upload_context(
    identity: &Identity,
    upload_as: &str,
    share_3rd_party: bool,
) -> SyncResult<UploadContext> {
    let groups = resolve_share_groups(identity, upload_as)?;
    Ok(UploadContext::new(identity.login.clone(), groups).with_share_3rd_party(share_3rd_party))
}
