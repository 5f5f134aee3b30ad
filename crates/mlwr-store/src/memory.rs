use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use mlwr_types::{Dhash, ObjectKind};

use crate::batch::{Annotation, Materialized, NewObject, WriteBatch};
use crate::error::{StoreError, StoreResult};
use crate::object::{Comment, ObjectBody, ObjectMeta, StoredObject};
use crate::traits::ObjectRepository;

#[derive(Default)]
struct Inner {
    objects: HashMap<Dhash, StoredObject>,
    contents: HashMap<Dhash, Vec<u8>>,
    upload_markers: HashMap<Dhash, usize>,
}

/// In-memory, HashMap-based object repository.
///
/// Intended for tests and embedding. All state sits behind one `RwLock`;
/// a batch is applied under a single write lock, which gives the
/// at-most-once creation guarantee the federation layer relies on.
pub struct InMemoryRepository {
    inner: RwLock<Inner>,
}

impl InMemoryRepository {
    /// Create a new empty repository.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.inner.read().expect("lock poisoned").objects.len()
    }

    /// Returns `true` if the repository is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes of stored file content.
    pub fn content_bytes(&self) -> u64 {
        self.inner
            .read()
            .expect("lock poisoned")
            .contents
            .values()
            .map(|c| c.len() as u64)
            .sum()
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectRepository for InMemoryRepository {
    fn get(&self, dhash: &Dhash) -> StoreResult<Option<StoredObject>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.objects.get(dhash).cloned())
    }

    fn list(&self, kind: Option<ObjectKind>) -> StoreResult<Vec<StoredObject>> {
        let inner = self.inner.read().expect("lock poisoned");
        let mut objects: Vec<StoredObject> = inner
            .objects
            .values()
            .filter(|obj| kind.map_or(true, |k| obj.kind() == k))
            .cloned()
            .collect();
        objects.sort_by_key(|obj| obj.dhash());
        Ok(objects)
    }

    fn children(&self, dhash: &Dhash) -> StoreResult<Vec<Dhash>> {
        let inner = self.inner.read().expect("lock poisoned");
        let mut children: Vec<Dhash> = inner
            .objects
            .values()
            .filter(|obj| obj.meta.parents.contains(dhash))
            .map(|obj| obj.dhash())
            .collect();
        children.sort();
        Ok(children)
    }

    fn read_content(&self, dhash: &Dhash) -> StoreResult<Option<Vec<u8>>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.contents.get(dhash).cloned())
    }

    fn apply(&self, batch: WriteBatch) -> StoreResult<Vec<Materialized>> {
        for object in &batch.objects {
            object.validate()?;
        }
        let now = Utc::now();
        let mut guard = self.inner.write().expect("lock poisoned");
        let Inner {
            objects,
            contents,
            upload_markers,
        } = &mut *guard;

        // Validation pass: nothing is written unless the whole batch fits.
        let mut staged: HashMap<Dhash, ObjectKind> = HashMap::new();
        for object in &batch.objects {
            let dhash = object.dhash();
            let requested = object.kind();
            let existing = objects
                .get(&dhash)
                .map(|o| o.kind())
                .or_else(|| staged.get(&dhash).copied());
            if let Some(existing) = existing {
                if existing != requested {
                    return Err(StoreError::TypeConflict {
                        dhash,
                        existing,
                        requested,
                    });
                }
            }
            staged.insert(dhash, requested);
        }
        for link in &batch.links {
            for end in [link.parent, link.child] {
                if !objects.contains_key(&end) && !staged.contains_key(&end) {
                    return Err(StoreError::NotFound(end));
                }
            }
        }

        // Write pass.
        let ctx = &batch.context;
        let mut outcomes = Vec::with_capacity(batch.objects.len());
        for object in &batch.objects {
            let dhash = object.dhash();
            let (stored, is_new) = match objects.entry(dhash) {
                Entry::Occupied(e) => {
                    let stored = e.into_mut();
                    match (&mut stored.body, object) {
                        (ObjectBody::File(file), NewObject::File(new)) => {
                            file.add_alt_name(&new.file_name);
                        }
                        (ObjectBody::TextBlob(blob), NewObject::TextBlob { .. }) => {
                            blob.last_seen = now;
                        }
                        _ => {}
                    }
                    (stored, false)
                }
                Entry::Vacant(e) => {
                    if let NewObject::File(new) = object {
                        contents.insert(dhash, new.data.clone());
                    }
                    let stored = e.insert(StoredObject {
                        meta: ObjectMeta::new(dhash, now),
                        body: object.to_body(now),
                    });
                    (stored, true)
                }
            };
            stored
                .meta
                .record_upload(&ctx.uploader, &ctx.share_with, ctx.share_3rd_party, now);
            *upload_markers.entry(dhash).or_insert(0) += 1;
            tracing::debug!(dhash = %dhash, kind = %object.kind(), is_new, "object materialized");
            outcomes.push((dhash, is_new));
        }

        for link in &batch.links {
            if let Some(child) = objects.get_mut(&link.child) {
                child.meta.parents.insert(link.parent);
            }
        }

        Ok(outcomes
            .into_iter()
            .filter_map(|(dhash, is_new)| {
                objects.get(&dhash).map(|object| Materialized {
                    object: object.clone(),
                    is_new,
                })
            })
            .collect())
    }

    fn annotate(&self, dhash: &Dhash, annotation: Annotation) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");
        let object = inner
            .objects
            .get_mut(dhash)
            .ok_or(StoreError::NotFound(*dhash))?;
        match annotation {
            Annotation::Tag(tag) => {
                object.meta.tags.insert(tag);
            }
            Annotation::Comment { author, comment } => object.meta.comments.push(Comment {
                author,
                comment,
                timestamp: Utc::now(),
            }),
            Annotation::Attribute { key, value } => {
                let values = object.meta.attributes.entry(key).or_default();
                if !values.contains(&value) {
                    values.push(value);
                }
            }
        }
        Ok(())
    }

    fn release_upload(&self, dhash: &Dhash) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");
        match inner.upload_markers.get_mut(dhash) {
            Some(count) if *count > 1 => {
                *count -= 1;
                Ok(())
            }
            Some(_) => {
                inner.upload_markers.remove(dhash);
                Ok(())
            }
            None => Err(StoreError::NoPendingUpload(*dhash)),
        }
    }

    fn pending_uploads(&self, dhash: &Dhash) -> StoreResult<usize> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.upload_markers.get(dhash).copied().unwrap_or(0))
    }
}

impl std::fmt::Debug for InMemoryRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRepository")
            .field("object_count", &self.len())
            .finish()
    }
}
