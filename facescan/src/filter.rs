use serde::{Deserialize, Serialize};

use crate::types::{DetectedFace, Detection};

/// Drops detections that are unlikely to be real faces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionFilter {
    /// Minimum detector confidence (default: 0.7).
    pub min_confidence: f32,

    /// Minimum face area as a fraction of the image area (default: 0.0004).
    /// Only applied when the detector reports the image size.
    pub min_area_fraction: f64,

    /// Maximum `max(w/h, h/w)` (default: 2.0).
    pub max_aspect_ratio: f32,
}

impl Default for DetectionFilter {
    fn default() -> Self {
        Self {
            min_confidence: 0.7,
            min_area_fraction: 0.0004,
            max_aspect_ratio: 2.0,
        }
    }
}

impl DetectionFilter {
    /// Accepts everything with a non-empty box.
    pub fn permissive() -> Self {
        Self {
            min_confidence: 0.0,
            min_area_fraction: 0.0,
            max_aspect_ratio: f32::INFINITY,
        }
    }

    pub fn accepts(&self, face: &DetectedFace, image_size: Option<(u32, u32)>) -> bool {
        let (w, h) = (face.bbox.w, face.bbox.h);
        if w <= 0 || h <= 0 {
            return false;
        }
        if let Some((iw, ih)) = image_size {
            let image_area = iw as f64 * ih as f64;
            if (face.bbox.area() as f64) < image_area * self.min_area_fraction {
                return false;
            }
        }
        if face.confidence < self.min_confidence {
            return false;
        }
        let (w, h) = (w as f32, h as f32);
        (w / h).max(h / w) <= self.max_aspect_ratio
    }

    /// Returns the faces of `detection` that pass the filter.
    pub fn apply(&self, detection: Detection) -> Vec<DetectedFace> {
        let size = detection.image_size;
        detection.faces.into_iter().filter(|f| self.accepts(f, size)).collect()
    }
}
