use std::sync::Arc;

use facegallery_faceid::vecops::{centroid, check_dim};
use facegallery_faceid::{Clusterer, Matcher};
use tracing::{debug, info};

use crate::config::ScanConfig;
use crate::detector::Capabilities;
use crate::store::GalleryStore;
use crate::types::{FaceCluster, FaceId, PersonId, PersonUpdate};
use crate::{ScanError, ScanResult};

/// Review and assignment operations over a [`GalleryStore`].
///
/// Matching always runs against every stored sample of every identity, so
/// the per-identity vote in [`Matcher::best_match`] applies here the same
/// way it does during a scan.
pub struct Gallery {
    store: Arc<dyn GalleryStore>,
    matcher: Matcher,
    clusterer: Clusterer,
    dim: usize,
}

impl Gallery {
    pub fn new(store: Arc<dyn GalleryStore>, dim: usize, matcher: Matcher, clusterer: Clusterer) -> Self {
        Self {
            store,
            matcher,
            clusterer,
            dim,
        }
    }

    /// Builds a gallery calibrated for the detector described by `caps`.
    pub fn from_config(store: Arc<dyn GalleryStore>, cfg: &ScanConfig, caps: &Capabilities) -> ScanResult<Self> {
        let dim = cfg.resolve_dim(caps.embedding_dim)?;
        let matcher = cfg.matcher(&caps.name, dim)?;
        let clusterer = cfg.clusterer(&caps.name, dim)?;
        Ok(Self::new(store, dim, matcher, clusterer))
    }

    pub fn store(&self) -> &Arc<dyn GalleryStore> {
        &self.store
    }

    fn known(&self) -> ScanResult<Vec<(PersonId, Vec<f32>)>> {
        let known = self.store.known_embeddings()?;
        for (_, emb) in &known {
            check_dim(self.dim, emb)?;
        }
        Ok(known)
    }

    /// Groups the unassigned faces for review.
    ///
    /// Faces with embeddings are clustered at `threshold` (the configured
    /// cluster threshold when `None`), and each cluster's centroid is
    /// matched against the known samples at the same threshold to suggest
    /// an identity. Faces without embeddings follow as singleton clusters
    /// with no suggestion.
    pub fn cluster_unknown_faces(&self, threshold: Option<f32>) -> ScanResult<Vec<FaceCluster>> {
        let (clusterer, matcher) = match threshold {
            Some(t) => (
                Clusterer::new(self.dim, t, self.clusterer.leader_policy())?,
                Matcher::new(self.dim, t)?,
            ),
            None => (
                self.clusterer.clone(),
                Matcher::new(self.dim, self.clusterer.threshold())?,
            ),
        };

        let mut ids = Vec::new();
        let mut embeddings = Vec::new();
        let mut bare = Vec::new();
        for face in self.store.unassigned_faces()? {
            match face.embedding {
                Some(emb) => {
                    ids.push(face.id);
                    embeddings.push(emb);
                }
                None => bare.push(face.id),
            }
        }

        let mut out = Vec::new();
        if !embeddings.is_empty() {
            let known = self.known()?;
            for group in clusterer.cluster(&embeddings)? {
                let members: Vec<&[f32]> = group.iter().map(|&i| embeddings[i].as_slice()).collect();
                let suggestion = match centroid(&members)? {
                    Some(c) => matcher.best_match(&c, &known)?.map(|m| m.id),
                    None => None,
                };
                out.push(FaceCluster {
                    face_ids: group.iter().map(|&i| ids[i]).collect(),
                    suggestion,
                });
            }
        }
        out.extend(bare.into_iter().map(|id| FaceCluster {
            face_ids: vec![id],
            suggestion: None,
        }));

        debug!(clusters = out.len(), "clustered unassigned faces");
        Ok(out)
    }

    /// Suggests an identity for one face without linking it. `None` when
    /// the face is missing, has no embedding, or matches nobody.
    pub fn auto_assign_face(&self, face: FaceId) -> ScanResult<Option<PersonId>> {
        let Some(record) = self.store.face(face)? else {
            return Ok(None);
        };
        let Some(emb) = record.embedding else {
            return Ok(None);
        };
        let known = self.known()?;
        Ok(self.matcher.best_match(&emb, &known)?.map(|m| m.id))
    }

    /// Fails without writing anything if any of `faces` does not exist.
    fn check_faces(&self, faces: &[FaceId]) -> ScanResult<()> {
        for &face in faces {
            if self.store.face(face)?.is_none() {
                return Err(ScanError::Store(format!("{face} does not exist")));
            }
        }
        Ok(())
    }

    fn set_representative(&self, person: PersonId, faces: &[FaceId]) -> ScanResult<()> {
        let Some(&first) = faces.first() else {
            return Ok(());
        };
        self.store.update_person(
            person,
            PersonUpdate {
                representative: Some(first),
                ..Default::default()
            },
        )
    }

    /// Links `faces` to `person`, replacing earlier links, and makes the
    /// first face the identity's representative.
    ///
    /// All ids are checked before the first write.
    pub fn assign_faces_to_person(&self, faces: &[FaceId], person: PersonId) -> ScanResult<()> {
        if self.store.person(person)?.is_none() {
            return Err(ScanError::Store(format!("{person} does not exist")));
        }
        self.check_faces(faces)?;
        for &face in faces {
            self.store.assign_face(face, person)?;
        }
        self.set_representative(person, faces)?;
        info!(person = %person, faces = faces.len(), "assigned faces");
        Ok(())
    }

    /// Creates an identity from `faces`, the first one as representative.
    ///
    /// No identity is created if any of `faces` does not exist.
    pub fn create_person_from_faces(&self, faces: &[FaceId], name: &str, notes: Option<&str>) -> ScanResult<PersonId> {
        self.check_faces(faces)?;
        let person = self.store.create_person(name, notes, None)?;
        for &face in faces {
            self.store.assign_face(face, person)?;
        }
        self.set_representative(person, faces)?;
        info!(person = %person, name, faces = faces.len(), "created person");
        Ok(person)
    }

    pub fn unassign_faces(&self, faces: &[FaceId]) -> ScanResult<()> {
        for &face in faces {
            self.store.unassign_face(face)?;
        }
        Ok(())
    }

    /// Matches every unassigned face against the known samples and links
    /// the matches. Returns how many faces were linked.
    ///
    /// The known set is loaded once, so faces linked here do not vote for
    /// later faces in the same pass.
    pub fn auto_match_all_unassigned(&self) -> ScanResult<usize> {
        let unassigned = self.store.unassigned_faces()?;
        if unassigned.is_empty() {
            return Ok(0);
        }
        let known = self.known()?;
        if known.is_empty() {
            return Ok(0);
        }

        let mut linked = 0;
        for face in unassigned {
            let Some(emb) = face.embedding else {
                continue;
            };
            if let Some(m) = self.matcher.best_match(&emb, &known)? {
                self.store.assign_face(face.id, m.id)?;
                linked += 1;
            }
        }
        if linked > 0 {
            info!(linked, "auto-assigned faces to known persons");
        }
        Ok(linked)
    }

    /// Deletes face records that are not real faces.
    pub fn remove_false_positives(&self, faces: &[FaceId]) -> ScanResult<()> {
        for &face in faces {
            self.store.delete_face(face)?;
        }
        debug!(faces = faces.len(), "removed false positives");
        Ok(())
    }

    /// One L2-normalized mean embedding per identity with at least one
    /// embedded face, in identity order.
    pub fn known_centroids(&self) -> ScanResult<Vec<(PersonId, Vec<f32>)>> {
        let mut out = Vec::new();
        for person in self.store.persons()? {
            let embs: Vec<Vec<f32>> = self
                .store
                .faces_for_person(person.id)?
                .into_iter()
                .filter_map(|f| f.embedding)
                .collect();
            if let Some(c) = centroid(&embs)? {
                out.push((person.id, c));
            }
        }
        out.sort_by_key(|(id, _)| *id);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use facegallery_faceid::LeaderPolicy;

    use crate::store::MemoryStore;
    use crate::types::{BoundingBox, NewFace, NewPhoto, PhotoId};

    struct Setup {
        store: Arc<MemoryStore>,
        gallery: Gallery,
        photo: PhotoId,
    }

    fn setup() -> Setup {
        let store = Arc::new(MemoryStore::new());
        let gallery = Gallery::new(
            store.clone(),
            2,
            Matcher::new(2, 0.4).unwrap(),
            Clusterer::new(2, 0.4, LeaderPolicy::Running).unwrap(),
        );
        let photo = store
            .upsert_photo(NewPhoto {
                path: PathBuf::from("/photos/a.jpg"),
                content_hash: "h".into(),
                file_size: 1,
            })
            .unwrap();
        Setup { store, gallery, photo }
    }

    impl Setup {
        fn face(&self, emb: Option<Vec<f32>>) -> FaceId {
            self.store
                .insert_face(NewFace {
                    photo_id: self.photo,
                    bbox: BoundingBox::new(0, 0, 50, 50),
                    embedding: emb,
                    confidence: 0.9,
                    thumbnail: None,
                })
                .unwrap()
        }
    }

    #[test]
    fn clusters_with_suggestions() {
        let s = setup();
        let known = s.face(Some(vec![1.0, 0.0]));
        let alice = s.gallery.create_person_from_faces(&[known], "Alice", None).unwrap();

        let a1 = s.face(Some(vec![0.99, 0.1]));
        let b1 = s.face(Some(vec![0.0, 1.0]));
        let a2 = s.face(Some(vec![0.98, 0.15]));
        let bare = s.face(None);

        let clusters = s.gallery.cluster_unknown_faces(None).unwrap();
        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters[0].face_ids, vec![a1, a2]);
        assert_eq!(clusters[0].suggestion, Some(alice));
        assert_eq!(clusters[1].face_ids, vec![b1]);
        assert_eq!(clusters[1].suggestion, None);
        assert_eq!(clusters[2].face_ids, vec![bare]);
        assert_eq!(clusters[2].suggestion, None);
    }

    #[test]
    fn cluster_threshold_override() {
        let s = setup();
        s.face(Some(vec![1.0, 0.0]));
        s.face(Some(vec![0.0, 1.0]));
        assert_eq!(s.gallery.cluster_unknown_faces(None).unwrap().len(), 2);
        assert_eq!(s.gallery.cluster_unknown_faces(Some(1.5)).unwrap().len(), 1);
        assert!(matches!(
            s.gallery.cluster_unknown_faces(Some(-1.0)),
            Err(ScanError::FaceId(_))
        ));
    }

    #[test]
    fn no_unassigned_faces() {
        let s = setup();
        assert!(s.gallery.cluster_unknown_faces(None).unwrap().is_empty());
        assert_eq!(s.gallery.auto_match_all_unassigned().unwrap(), 0);
    }

    #[test]
    fn auto_assign_is_read_only() {
        let s = setup();
        let known = s.face(Some(vec![1.0, 0.0]));
        let alice = s.gallery.create_person_from_faces(&[known], "Alice", None).unwrap();
        let q = s.face(Some(vec![0.95, 0.05]));
        let bare = s.face(None);

        assert_eq!(s.gallery.auto_assign_face(q).unwrap(), Some(alice));
        assert!(s.store.person_for_face(q).unwrap().is_none(), "no link written");
        assert_eq!(s.gallery.auto_assign_face(bare).unwrap(), None);
        assert_eq!(s.gallery.auto_assign_face(FaceId(999)).unwrap(), None);
    }

    #[test]
    fn assign_replaces_and_sets_representative() {
        let s = setup();
        let f1 = s.face(Some(vec![1.0, 0.0]));
        let f2 = s.face(Some(vec![0.0, 1.0]));
        let alice = s.gallery.create_person_from_faces(&[f1, f2], "Alice", Some("team")).unwrap();
        let bob = s.gallery.create_person_from_faces(&[], "Bob", None).unwrap();
        assert_eq!(s.store.person(bob).unwrap().unwrap().representative, None);

        s.gallery.assign_faces_to_person(&[f2], bob).unwrap();
        assert_eq!(s.store.person_for_face(f2).unwrap().unwrap().id, bob);
        assert_eq!(s.store.faces_for_person(alice).unwrap().len(), 1);
        assert_eq!(s.store.person(bob).unwrap().unwrap().representative, Some(f2));
        assert_eq!(s.store.person(alice).unwrap().unwrap().notes.as_deref(), Some("team"));

        assert!(s.gallery.assign_faces_to_person(&[f1], PersonId(999)).is_err());
    }

    #[test]
    fn create_with_missing_face_writes_nothing() {
        let s = setup();
        let f = s.face(Some(vec![1.0, 0.0]));
        let err = s.gallery.create_person_from_faces(&[f, FaceId(77)], "Ghost", None);
        assert!(matches!(err, Err(ScanError::Store(_))));
        assert!(s.store.persons().unwrap().is_empty());
        assert!(s.store.person_for_face(f).unwrap().is_none());
    }

    #[test]
    fn assign_with_missing_face_keeps_links() {
        let s = setup();
        let f1 = s.face(Some(vec![1.0, 0.0]));
        let f2 = s.face(Some(vec![0.0, 1.0]));
        let alice = s.gallery.create_person_from_faces(&[f1], "Alice", None).unwrap();
        let bob = s.gallery.create_person_from_faces(&[f2], "Bob", None).unwrap();

        let err = s.gallery.assign_faces_to_person(&[f1, FaceId(77)], bob);
        assert!(matches!(err, Err(ScanError::Store(_))));
        assert_eq!(s.store.person_for_face(f1).unwrap().unwrap().id, alice);
        assert_eq!(s.store.person(bob).unwrap().unwrap().representative, Some(f2));
    }

    #[test]
    fn unassign_returns_faces_to_review() {
        let s = setup();
        let f = s.face(Some(vec![1.0, 0.0]));
        s.gallery.create_person_from_faces(&[f], "Alice", None).unwrap();
        assert!(s.store.unassigned_faces().unwrap().is_empty());
        s.gallery.unassign_faces(&[f]).unwrap();
        assert_eq!(s.store.unassigned_faces().unwrap().len(), 1);
    }

    #[test]
    fn auto_match_links_matches_only() {
        let s = setup();
        let k = s.face(Some(vec![1.0, 0.0]));
        let alice = s.gallery.create_person_from_faces(&[k], "Alice", None).unwrap();
        let near = s.face(Some(vec![0.97, 0.1]));
        let far = s.face(Some(vec![0.0, 1.0]));
        s.face(None);

        assert_eq!(s.gallery.auto_match_all_unassigned().unwrap(), 1);
        assert_eq!(s.store.person_for_face(near).unwrap().unwrap().id, alice);
        assert!(s.store.person_for_face(far).unwrap().is_none());
    }

    #[test]
    fn false_positives_are_deleted() {
        let s = setup();
        let f = s.face(Some(vec![1.0, 0.0]));
        let alice = s.gallery.create_person_from_faces(&[f], "Alice", None).unwrap();
        s.gallery.remove_false_positives(&[f]).unwrap();
        assert!(s.store.face(f).unwrap().is_none());
        assert!(s.store.faces_for_person(alice).unwrap().is_empty());
        assert_eq!(s.store.person(alice).unwrap().unwrap().representative, None);
    }

    #[test]
    fn centroids_skip_identities_without_embeddings() {
        let s = setup();
        let f1 = s.face(Some(vec![2.0, 0.0]));
        let f2 = s.face(Some(vec![0.0, 2.0]));
        let bare = s.face(None);
        let zed = s.gallery.create_person_from_faces(&[f1, f2], "Zed", None).unwrap();
        s.gallery.create_person_from_faces(&[bare], "Ann", None).unwrap();

        let centroids = s.gallery.known_centroids().unwrap();
        assert_eq!(centroids.len(), 1);
        assert_eq!(centroids[0].0, zed);
        let c = &centroids[0].1;
        let h = std::f32::consts::FRAC_1_SQRT_2;
        assert!((c[0] - h).abs() < 1e-5 && (c[1] - h).abs() < 1e-5, "got {c:?}");
    }

    #[test]
    fn from_config_uses_capabilities() {
        let store: Arc<dyn GalleryStore> = Arc::new(MemoryStore::new());
        let caps = Capabilities {
            name: "face_recognition".into(),
            embedding_dim: Some(128),
        };
        let g = Gallery::from_config(store, &ScanConfig::default(), &caps).unwrap();
        assert_eq!(g.matcher.threshold(), 0.55);
        assert_eq!(g.dim, 128);
    }
}
