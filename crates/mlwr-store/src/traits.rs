use mlwr_types::{Dhash, ObjectKind};

use crate::batch::{Annotation, Materialized, WriteBatch};
use crate::error::StoreResult;
use crate::object::StoredObject;

/// Repository of typed, content-addressed objects.
///
/// All implementations must satisfy these invariants:
/// - Identifying attributes are immutable; the same content under the same
///   kind always maps to the same object.
/// - [`apply`](Self::apply) validates the whole batch before writing; on
///   error nothing is written.
/// - Creation is at-most-once per dhash: when two batches race on the same
///   content, the loser reuses the winner's object (`is_new == false`).
/// - Every materialized object gains one upload marker, released through
///   [`release_upload`](Self::release_upload).
pub trait ObjectRepository: Send + Sync {
    /// Read an object by identifier, whatever its kind.
    fn get(&self, dhash: &Dhash) -> StoreResult<Option<StoredObject>>;

    /// Read an object only if it is of the requested kind.
    fn access(&self, kind: ObjectKind, dhash: &Dhash) -> StoreResult<Option<StoredObject>> {
        Ok(self.get(dhash)?.filter(|obj| obj.kind() == kind))
    }

    /// All objects, optionally restricted to one kind, ordered by dhash.
    fn list(&self, kind: Option<ObjectKind>) -> StoreResult<Vec<StoredObject>>;

    /// Identifiers of objects that have `dhash` as a parent.
    fn children(&self, dhash: &Dhash) -> StoreResult<Vec<Dhash>>;

    /// Raw content of a file object.
    fn read_content(&self, dhash: &Dhash) -> StoreResult<Option<Vec<u8>>>;

    /// Create-or-reuse every object of the batch and write its edges.
    ///
    /// Returns one entry per staged object, in staging order.
    fn apply(&self, batch: WriteBatch) -> StoreResult<Vec<Materialized>>;

    /// Attach metadata to an existing object.
    fn annotate(&self, dhash: &Dhash, annotation: Annotation) -> StoreResult<()>;

    /// Release one upload marker taken by [`apply`](Self::apply).
    fn release_upload(&self, dhash: &Dhash) -> StoreResult<()>;

    /// Number of upload markers currently held on an object.
    fn pending_uploads(&self, dhash: &Dhash) -> StoreResult<usize>;
}
