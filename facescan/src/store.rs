use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::codec::{decode_embedding, encode_embedding};
use crate::types::{
    BoundingBox, FaceId, FaceRecord, NewFace, NewPhoto, PersonId, PersonIdentity, PersonUpdate, Photo,
    PhotoId,
};
use crate::{ScanError, ScanResult};

/// Persistence for photos, faces, identities and their links.
///
/// Implementations must keep referential integrity: deleting a photo
/// deletes its faces and their links; deleting an identity deletes only
/// its links; a face links to at most one identity.
///
/// Implementations must be safe for concurrent use.
/// Use [`MemoryStore`] for in-memory storage (testing/ephemeral).
pub trait GalleryStore: Send + Sync {
    /// Looks up a photo by its path.
    fn photo_by_path(&self, path: &Path) -> ScanResult<Option<Photo>>;

    /// Inserts a photo, or refreshes hash and size of the photo at the
    /// same path. Returns the photo's id either way.
    fn upsert_photo(&self, photo: NewPhoto) -> ScanResult<PhotoId>;

    /// Deletes a photo with its faces and their links.
    fn delete_photo(&self, id: PhotoId) -> ScanResult<()>;

    /// Stores a face on an existing photo.
    fn insert_face(&self, face: NewFace) -> ScanResult<FaceId>;

    fn face(&self, id: FaceId) -> ScanResult<Option<FaceRecord>>;

    fn faces_for_photo(&self, photo: PhotoId) -> ScanResult<Vec<FaceRecord>>;

    /// Deletes every face of a photo. Returns how many were removed.
    fn delete_faces_for_photo(&self, photo: PhotoId) -> ScanResult<usize>;

    /// Deletes a face and its link.
    fn delete_face(&self, id: FaceId) -> ScanResult<()>;

    /// Faces with no identity link, in id order.
    fn unassigned_faces(&self) -> ScanResult<Vec<FaceRecord>>;

    fn create_person(
        &self,
        name: &str,
        notes: Option<&str>,
        representative: Option<FaceId>,
    ) -> ScanResult<PersonId>;

    fn update_person(&self, id: PersonId, update: PersonUpdate) -> ScanResult<()>;

    /// Deletes an identity and its links. Its faces stay, unassigned.
    fn delete_person(&self, id: PersonId) -> ScanResult<()>;

    fn person(&self, id: PersonId) -> ScanResult<Option<PersonIdentity>>;

    /// All identities ordered by name, then id.
    fn persons(&self) -> ScanResult<Vec<PersonIdentity>>;

    /// Links a face to an identity, replacing any previous link.
    fn assign_face(&self, face: FaceId, person: PersonId) -> ScanResult<()>;

    /// Removes a face's link. No error if it had none.
    fn unassign_face(&self, face: FaceId) -> ScanResult<()>;

    /// Faces linked to an identity, in id order.
    fn faces_for_person(&self, person: PersonId) -> ScanResult<Vec<FaceRecord>>;

    fn person_for_face(&self, face: FaceId) -> ScanResult<Option<PersonIdentity>>;

    fn mark_folder_scanned(&self, folder: &Path, at: DateTime<Utc>) -> ScanResult<()>;

    fn folder_scanned_at(&self, folder: &Path) -> ScanResult<Option<DateTime<Utc>>>;

    /// Every `(identity, embedding)` pair across all identities. Faces
    /// without an embedding are left out.
    fn known_embeddings(&self) -> ScanResult<Vec<(PersonId, Vec<f32>)>> {
        let mut known = Vec::new();
        for person in self.persons()? {
            for face in self.faces_for_person(person.id)? {
                if let Some(emb) = face.embedding {
                    known.push((person.id, emb));
                }
            }
        }
        Ok(known)
    }
}

/// In-memory [`GalleryStore`] implementation.
/// Data is lost on restart. Suitable for testing or ephemeral use.
///
/// Embeddings are kept as encoded blobs, the way a database column would
/// hold them.
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

struct FaceRow {
    photo_id: PhotoId,
    bbox: BoundingBox,
    embedding: Option<Vec<u8>>,
    confidence: f32,
    thumbnail: Option<Vec<u8>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    photos: BTreeMap<PhotoId, Photo>,
    faces: BTreeMap<FaceId, FaceRow>,
    persons: BTreeMap<PersonId, PersonIdentity>,
    links: BTreeMap<FaceId, PersonId>,
    folders: HashMap<PathBuf, DateTime<Utc>>,
    seq: i64,
}

impl MemoryStoreInner {
    fn next_id(&mut self) -> i64 {
        self.seq += 1;
        self.seq
    }

    fn record(&self, id: FaceId, row: &FaceRow) -> ScanResult<FaceRecord> {
        let embedding = match &row.embedding {
            Some(blob) => Some(decode_embedding(blob)?),
            None => None,
        };
        Ok(FaceRecord {
            id,
            photo_id: row.photo_id,
            bbox: row.bbox,
            embedding,
            confidence: row.confidence,
            thumbnail: row.thumbnail.clone(),
        })
    }

    fn remove_face(&mut self, id: FaceId) {
        self.faces.remove(&id);
        self.links.remove(&id);
        for p in self.persons.values_mut() {
            if p.representative == Some(id) {
                p.representative = None;
            }
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryStoreInner::default()),
        }
    }

    fn lock(&self) -> ScanResult<MutexGuard<'_, MemoryStoreInner>> {
        self.inner.lock().map_err(|e| ScanError::Store(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GalleryStore for MemoryStore {
    fn photo_by_path(&self, path: &Path) -> ScanResult<Option<Photo>> {
        let inner = self.lock()?;
        Ok(inner.photos.values().find(|p| p.path == path).cloned())
    }

    fn upsert_photo(&self, photo: NewPhoto) -> ScanResult<PhotoId> {
        let mut inner = self.lock()?;
        let now = Utc::now();
        if let Some(existing) = inner.photos.values_mut().find(|p| p.path == photo.path) {
            existing.content_hash = photo.content_hash;
            existing.file_size = photo.file_size;
            existing.indexed_at = now;
            return Ok(existing.id);
        }
        let id = PhotoId(inner.next_id());
        inner.photos.insert(
            id,
            Photo {
                id,
                path: photo.path,
                content_hash: photo.content_hash,
                file_size: photo.file_size,
                indexed_at: now,
            },
        );
        Ok(id)
    }

    fn delete_photo(&self, id: PhotoId) -> ScanResult<()> {
        let mut inner = self.lock()?;
        inner.photos.remove(&id);
        let owned: Vec<FaceId> = inner
            .faces
            .iter()
            .filter(|(_, f)| f.photo_id == id)
            .map(|(fid, _)| *fid)
            .collect();
        for fid in owned {
            inner.remove_face(fid);
        }
        Ok(())
    }

    fn insert_face(&self, face: NewFace) -> ScanResult<FaceId> {
        let mut inner = self.lock()?;
        if !inner.photos.contains_key(&face.photo_id) {
            return Err(ScanError::Store(format!("{} does not exist", face.photo_id)));
        }
        let id = FaceId(inner.next_id());
        inner.faces.insert(
            id,
            FaceRow {
                photo_id: face.photo_id,
                bbox: face.bbox,
                embedding: face.embedding.as_deref().map(encode_embedding),
                confidence: face.confidence,
                thumbnail: face.thumbnail,
            },
        );
        Ok(id)
    }

    fn face(&self, id: FaceId) -> ScanResult<Option<FaceRecord>> {
        let inner = self.lock()?;
        match inner.faces.get(&id) {
            Some(row) => Ok(Some(inner.record(id, row)?)),
            None => Ok(None),
        }
    }

    fn faces_for_photo(&self, photo: PhotoId) -> ScanResult<Vec<FaceRecord>> {
        let inner = self.lock()?;
        inner
            .faces
            .iter()
            .filter(|(_, row)| row.photo_id == photo)
            .map(|(id, row)| inner.record(*id, row))
            .collect()
    }

    fn delete_faces_for_photo(&self, photo: PhotoId) -> ScanResult<usize> {
        let mut inner = self.lock()?;
        let owned: Vec<FaceId> = inner
            .faces
            .iter()
            .filter(|(_, f)| f.photo_id == photo)
            .map(|(fid, _)| *fid)
            .collect();
        for fid in &owned {
            inner.remove_face(*fid);
        }
        Ok(owned.len())
    }

    fn delete_face(&self, id: FaceId) -> ScanResult<()> {
        let mut inner = self.lock()?;
        inner.remove_face(id);
        Ok(())
    }

    fn unassigned_faces(&self) -> ScanResult<Vec<FaceRecord>> {
        let inner = self.lock()?;
        inner
            .faces
            .iter()
            .filter(|(id, _)| !inner.links.contains_key(*id))
            .map(|(id, row)| inner.record(*id, row))
            .collect()
    }

    fn create_person(
        &self,
        name: &str,
        notes: Option<&str>,
        representative: Option<FaceId>,
    ) -> ScanResult<PersonId> {
        let mut inner = self.lock()?;
        let id = PersonId(inner.next_id());
        inner.persons.insert(
            id,
            PersonIdentity {
                id,
                name: name.to_string(),
                notes: notes.map(str::to_string),
                representative,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    fn update_person(&self, id: PersonId, update: PersonUpdate) -> ScanResult<()> {
        let mut inner = self.lock()?;
        let person = inner
            .persons
            .get_mut(&id)
            .ok_or_else(|| ScanError::Store(format!("{id} does not exist")))?;
        if let Some(name) = update.name {
            person.name = name;
        }
        if let Some(notes) = update.notes {
            person.notes = Some(notes);
        }
        if let Some(face) = update.representative {
            person.representative = Some(face);
        }
        Ok(())
    }

    fn delete_person(&self, id: PersonId) -> ScanResult<()> {
        let mut inner = self.lock()?;
        inner.persons.remove(&id);
        inner.links.retain(|_, p| *p != id);
        Ok(())
    }

    fn person(&self, id: PersonId) -> ScanResult<Option<PersonIdentity>> {
        let inner = self.lock()?;
        Ok(inner.persons.get(&id).cloned())
    }

    fn persons(&self) -> ScanResult<Vec<PersonIdentity>> {
        let inner = self.lock()?;
        let mut all: Vec<PersonIdentity> = inner.persons.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    fn assign_face(&self, face: FaceId, person: PersonId) -> ScanResult<()> {
        let mut inner = self.lock()?;
        if !inner.faces.contains_key(&face) {
            return Err(ScanError::Store(format!("{face} does not exist")));
        }
        if !inner.persons.contains_key(&person) {
            return Err(ScanError::Store(format!("{person} does not exist")));
        }
        inner.links.insert(face, person);
        Ok(())
    }

    fn unassign_face(&self, face: FaceId) -> ScanResult<()> {
        let mut inner = self.lock()?;
        inner.links.remove(&face);
        Ok(())
    }

    fn faces_for_person(&self, person: PersonId) -> ScanResult<Vec<FaceRecord>> {
        let inner = self.lock()?;
        inner
            .links
            .iter()
            .filter(|(_, p)| **p == person)
            .filter_map(|(fid, _)| inner.faces.get(fid).map(|row| (fid, row)))
            .map(|(fid, row)| inner.record(*fid, row))
            .collect()
    }

    fn person_for_face(&self, face: FaceId) -> ScanResult<Option<PersonIdentity>> {
        let inner = self.lock()?;
        Ok(inner
            .links
            .get(&face)
            .and_then(|p| inner.persons.get(p))
            .cloned())
    }

    fn mark_folder_scanned(&self, folder: &Path, at: DateTime<Utc>) -> ScanResult<()> {
        let mut inner = self.lock()?;
        inner.folders.insert(folder.to_path_buf(), at);
        Ok(())
    }

    fn folder_scanned_at(&self, folder: &Path) -> ScanResult<Option<DateTime<Utc>>> {
        let inner = self.lock()?;
        Ok(inner.folders.get(folder).copied())
    }
}
