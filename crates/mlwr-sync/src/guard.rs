use mlwr_store::ObjectRepository;
use mlwr_types::Dhash;

/// Releases the upload markers of freshly materialized objects when dropped.
///
/// Every object returned by a batch apply carries one marker; the guard
/// owns them from that point on, so hook failures and early returns still
/// release exactly once.
pub struct UploadGuard<'a, R: ObjectRepository + ?Sized> {
    repo: &'a R,
    pending: Vec<Dhash>,
}

impl<'a, R: ObjectRepository + ?Sized> UploadGuard<'a, R> {
    pub fn new(repo: &'a R, pending: impl IntoIterator<Item = Dhash>) -> Self {
        Self {
            repo,
            pending: pending.into_iter().collect(),
        }
    }

    pub fn pending(&self) -> &[Dhash] {
        &self.pending
    }
}

impl<R: ObjectRepository + ?Sized> Drop for UploadGuard<'_, R> {
    fn drop(&mut self) {
        for dhash in self.pending.drain(..) {
            if let Err(e) = self.repo.release_upload(&dhash) {
                tracing::warn!(%dhash, error = %e, "failed to release upload marker");
            }
        }
    }
}
