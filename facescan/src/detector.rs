use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::Detection;
use crate::{ScanError, ScanResult};

/// What a detector backend can do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Backend name used for selection and threshold calibration
    /// (e.g. "insightface").
    pub name: String,

    /// Length of the embeddings it produces, or `None` if it only
    /// localizes faces.
    #[serde(default)]
    pub embedding_dim: Option<usize>,
}

impl Capabilities {
    pub fn produces_embeddings(&self) -> bool {
        self.embedding_dim.is_some()
    }
}

/// Finds faces in an image file.
///
/// # Thread Safety
///
/// Implementations must be safe for concurrent use.
pub trait FaceDetector: Send + Sync {
    /// Detects faces in the image at `path`. An image with no faces yields
    /// an empty [`Detection`], not an error. Unreadable or corrupt images
    /// return [`ScanError::Io`] or [`ScanError::Detector`].
    fn detect(&self, path: &Path) -> ScanResult<Detection>;

    fn capabilities(&self) -> &Capabilities;
}

impl fmt::Debug for dyn FaceDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FaceDetector {{ name: {:?} }}", self.capabilities().name)
    }
}

/// Ordered list of available detector backends, most preferred first.
///
/// Resolve once at startup with [`DetectorRegistry::select`] and hand the
/// result to the scanner.
#[derive(Default)]
pub struct DetectorRegistry {
    detectors: Vec<Arc<dyn FaceDetector>>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a backend with lower preference than those already added.
    pub fn register(&mut self, detector: Arc<dyn FaceDetector>) {
        self.detectors.push(detector);
    }

    /// Capabilities of every registered backend, in preference order.
    pub fn capabilities(&self) -> Vec<Capabilities> {
        self.detectors.iter().map(|d| d.capabilities().clone()).collect()
    }

    /// Picks the backend called `name`, or the most preferred one when
    /// `name` is empty.
    pub fn select(&self, name: &str) -> ScanResult<Arc<dyn FaceDetector>> {
        if name.is_empty() {
            return self
                .detectors
                .first()
                .cloned()
                .ok_or_else(|| ScanError::NoDetector("registry is empty".into()));
        }
        self.detectors
            .iter()
            .find(|d| d.capabilities().name == name)
            .cloned()
            .ok_or_else(|| {
                let names: Vec<String> = self.capabilities().into_iter().map(|c| c.name).collect();
                ScanError::NoDetector(format!("{name:?} not among {names:?}"))
            })
    }
}
