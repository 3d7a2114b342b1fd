use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of an indexed photo.
    PhotoId,
    "photo"
);
id_type!(
    /// Identifier of a stored face detection.
    FaceId,
    "face"
);
id_type!(
    /// Identifier of a user-curated identity.
    PersonId,
    "person"
);

/// Face bounding box in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> i64 {
        self.w.max(0) as i64 * self.h.max(0) as i64
    }
}

/// A face as reported by a detector, before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub bbox: BoundingBox,

    /// Absent when the backend only localizes faces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    pub confidence: f32,
}

/// Everything a detector found in one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub faces: Vec<DetectedFace>,

    /// Image `(width, height)` in pixels, when the backend knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<(u32, u32)>,
}

/// An indexed photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: PhotoId,
    pub path: PathBuf,

    /// Hex digest of the file contents at the time of indexing.
    pub content_hash: String,

    pub file_size: u64,
    pub indexed_at: DateTime<Utc>,
}

/// Input for [`crate::GalleryStore::upsert_photo`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewPhoto {
    pub path: PathBuf,
    pub content_hash: String,
    pub file_size: u64,
}

/// A stored face detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRecord {
    pub id: FaceId,
    pub photo_id: PhotoId,
    pub bbox: BoundingBox,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    pub confidence: f32,

    /// Encoded crop, opaque to this crate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Vec<u8>>,
}

/// Input for [`crate::GalleryStore::insert_face`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewFace {
    pub photo_id: PhotoId,
    pub bbox: BoundingBox,
    pub embedding: Option<Vec<f32>>,
    pub confidence: f32,
    pub thumbnail: Option<Vec<u8>>,
}

impl NewFace {
    pub fn from_detection(photo_id: PhotoId, face: &DetectedFace) -> Self {
        Self {
            photo_id,
            bbox: face.bbox,
            embedding: face.embedding.clone(),
            confidence: face.confidence,
            thumbnail: None,
        }
    }
}

/// A named identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonIdentity {
    pub id: PersonId,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Face shown for this identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub representative: Option<FaceId>,

    pub created_at: DateTime<Utc>,
}

/// Partial update for [`crate::GalleryStore::update_person`]; `None`
/// fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonUpdate {
    pub name: Option<String>,
    pub notes: Option<String>,
    pub representative: Option<FaceId>,
}

/// Outcome of one scan run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Image files found across all folders.
    pub total: usize,
    /// Files that went through face detection.
    pub added: usize,
    /// Unchanged files plus files that failed.
    pub skipped: usize,
    pub faces_found: usize,
    pub auto_assigned: usize,
    /// True when the run stopped early on request.
    pub cancelled: bool,
}

/// Progress report emitted before each file is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanProgress {
    /// 1-based index of the file about to be processed.
    pub current: usize,
    pub total: usize,
    pub message: String,
}

/// Unlabelled faces believed to share one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceCluster {
    pub face_ids: Vec<FaceId>,

    /// Existing identity whose samples match the cluster centroid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<PersonId>,
}
