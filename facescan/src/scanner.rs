use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use facegallery_faceid::Matcher;
use facegallery_faceid::vecops::check_dim;
use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::detector::{DetectorRegistry, FaceDetector};
use crate::filter::DetectionFilter;
use crate::source::{FsImageSource, ImageSource, content_hash};
use crate::store::GalleryStore;
use crate::types::{NewFace, NewPhoto, PersonId, ScanProgress, ScanSummary};
use crate::ScanResult;

/// Labelled embeddings loaded once per scan run.
type KnownSet = Vec<(PersonId, Vec<f32>)>;

/// Faces stored and auto-assigned for one processed file.
struct FileOutcome {
    faces: usize,
    assigned: usize,
}

/// Indexes photos, runs face detection and auto-assigns recognized faces.
///
/// A scanner keeps no state between runs. Runs on one instance must not
/// overlap; [`crate::ScanWorker`] enforces that for background use.
pub struct Scanner {
    store: Arc<dyn GalleryStore>,
    detector: Arc<dyn FaceDetector>,
    source: Arc<dyn ImageSource>,
    matcher: Matcher,
    filter: DetectionFilter,
    dim: usize,
}

impl Scanner {
    /// Creates a scanner for an already selected detector.
    ///
    /// Fails if the configured embedding length disagrees with the
    /// detector, or the resolved threshold is invalid.
    pub fn new(
        cfg: &ScanConfig,
        store: Arc<dyn GalleryStore>,
        detector: Arc<dyn FaceDetector>,
        source: Arc<dyn ImageSource>,
    ) -> ScanResult<Self> {
        let caps = detector.capabilities();
        let dim = cfg.resolve_dim(caps.embedding_dim)?;
        let matcher = cfg.matcher(&caps.name, dim)?;
        info!(
            detector = %caps.name,
            dim,
            threshold = matcher.threshold(),
            "scanner configured"
        );
        Ok(Self {
            store,
            detector,
            source,
            matcher,
            filter: cfg.filter,
            dim,
        })
    }

    /// Creates a scanner using the detector named in `cfg` and the local
    /// filesystem as image source.
    pub fn from_registry(
        cfg: &ScanConfig,
        store: Arc<dyn GalleryStore>,
        registry: &DetectorRegistry,
    ) -> ScanResult<Self> {
        let detector = registry.select(&cfg.detector)?;
        let source = Arc::new(FsImageSource::new(&cfg.extensions));
        Self::new(cfg, store, detector, source)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Scans `folders` for images, indexes them and detects faces.
    ///
    /// A file is re-detected when it is new, its content hash changed, it
    /// has no stored faces, or `force_rescan` is set; otherwise it counts
    /// as skipped. Each new face is matched against the identities known
    /// at the start of the run and linked on a match.
    ///
    /// `cancelled` is polled before each file. `progress` is called on the
    /// scanning thread before each file. Per-file failures are logged and
    /// counted as skipped. Configuration errors (embedding length
    /// mismatches) abort the run.
    ///
    /// Folders are marked scanned only when the run was not cancelled, and
    /// only those that could be listed.
    pub fn scan<P, C>(
        &self,
        folders: &[PathBuf],
        force_rescan: bool,
        mut progress: P,
        cancelled: C,
    ) -> ScanResult<ScanSummary>
    where
        P: FnMut(&ScanProgress),
        C: Fn() -> bool,
    {
        let mut images = Vec::new();
        let mut listed = Vec::with_capacity(folders.len());
        for folder in folders {
            match self.source.list_images(folder) {
                Ok(found) => {
                    images.extend(found);
                    listed.push(folder);
                }
                Err(e) if e.is_transient() => {
                    warn!(folder = %folder.display(), error = %e, "cannot list folder");
                }
                Err(e) => return Err(e),
            }
        }

        let mut summary = ScanSummary {
            total: images.len(),
            ..Default::default()
        };
        info!(
            total = summary.total,
            folders = folders.len(),
            force_rescan,
            "scan started"
        );

        let known = self.load_known()?;

        for (idx, path) in images.iter().enumerate() {
            if cancelled() {
                info!(at = idx, total = summary.total, "scan cancelled");
                summary.cancelled = true;
                break;
            }

            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            progress(&ScanProgress {
                current: idx + 1,
                total: summary.total,
                message: format!("Indexing {name}"),
            });

            match self.process_file(path, force_rescan, &known) {
                Ok(Some(outcome)) => {
                    summary.added += 1;
                    summary.faces_found += outcome.faces;
                    summary.auto_assigned += outcome.assigned;
                }
                Ok(None) => summary.skipped += 1,
                Err(e) if e.is_transient() => {
                    warn!(path = %path.display(), error = %e, "skipping file");
                    summary.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        if !summary.cancelled {
            let now = Utc::now();
            for folder in listed {
                if let Err(e) = self.store.mark_folder_scanned(folder, now) {
                    warn!(folder = %folder.display(), error = %e, "cannot mark folder scanned");
                }
            }
        }

        info!(
            total = summary.total,
            added = summary.added,
            skipped = summary.skipped,
            faces = summary.faces_found,
            assigned = summary.auto_assigned,
            cancelled = summary.cancelled,
            "scan finished"
        );
        Ok(summary)
    }

    fn load_known(&self) -> ScanResult<KnownSet> {
        let known = self.store.known_embeddings()?;
        for (_, emb) in &known {
            check_dim(self.dim, emb)?;
        }
        debug!(samples = known.len(), "loaded known embeddings");
        Ok(known)
    }

    /// Returns `None` when the file is unchanged and needs no detection.
    fn process_file(&self, path: &Path, force_rescan: bool, known: &KnownSet) -> ScanResult<Option<FileOutcome>> {
        let hash = content_hash(path)?;
        let photo_id = match self.store.photo_by_path(path)? {
            Some(photo) if photo.content_hash == hash => {
                // Unchanged. Re-detect only on request, or when an earlier
                // run left the photo without faces.
                if !force_rescan && !self.store.faces_for_photo(photo.id)?.is_empty() {
                    return Ok(None);
                }
                photo.id
            }
            _ => {
                let file_size = std::fs::metadata(path)
                    .map_err(|e| crate::ScanError::io(path, e))?
                    .len();
                self.store.upsert_photo(NewPhoto {
                    path: path.to_path_buf(),
                    content_hash: hash,
                    file_size,
                })?
            }
        };

        // Stale faces go first so a failed detection leaves the photo empty
        // and the next run retries it.
        self.store.delete_faces_for_photo(photo_id)?;

        let detection = self.detector.detect(path)?;
        let faces = self.filter.apply(detection);
        for face in &faces {
            if let Some(emb) = &face.embedding {
                check_dim(self.dim, emb)?;
            }
        }

        let mut outcome = FileOutcome {
            faces: 0,
            assigned: 0,
        };
        for face in &faces {
            let face_id = self.store.insert_face(NewFace::from_detection(photo_id, face))?;
            outcome.faces += 1;

            let Some(emb) = &face.embedding else {
                continue;
            };
            if let Some(m) = self.matcher.best_match(emb, known)? {
                match self.store.assign_face(face_id, m.id) {
                    Ok(()) => {
                        outcome.assigned += 1;
                        debug!(face = %face_id, person = %m.id, distance = m.distance, "auto-assigned face");
                    }
                    Err(e) if e.is_transient() => {
                        warn!(face = %face_id, person = %m.id, error = %e, "cannot link face, left unassigned");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(Some(outcome))
    }
}
