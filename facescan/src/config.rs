//! Scan configuration, loadable from YAML.
//!
//! ```yaml
//! detector: insightface
//! dim: 512
//! leader: running
//! profiles:
//!   - name: insightface
//!     threshold: 0.40
//! filter:
//!   min_confidence: 0.7
//! ```

use std::path::Path;

use facegallery_faceid::{Clusterer, LeaderPolicy, Matcher};
use serde::{Deserialize, Serialize};

use crate::filter::DetectionFilter;
use crate::source::DEFAULT_EXTENSIONS;
use crate::{ScanError, ScanResult};

/// Match threshold for backends without a calibration profile.
pub const FALLBACK_THRESHOLD: f32 = 0.60;

/// Cosine-distance calibration for one detector backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub threshold: f32,
}

/// Calibration shipped by default. ArcFace-style embeddings separate
/// identities tightly; dlib and Facenet512 embeddings are noisier.
pub fn default_profiles() -> Vec<Profile> {
    vec![
        Profile {
            name: "insightface".into(),
            threshold: 0.40,
        },
        Profile {
            name: "face_recognition".into(),
            threshold: 0.55,
        },
        Profile {
            name: "deepface".into(),
            threshold: 0.60,
        },
    ]
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

/// Configuration for [`crate::Scanner`] and [`crate::Gallery`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Detector backend to use; empty selects the most preferred one.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub detector: String,

    /// Embedding length. 0 takes it from the selected detector.
    pub dim: usize,

    /// Match threshold override. Otherwise the detector's profile applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,

    /// Review clustering threshold. Defaults to the match threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_threshold: Option<f32>,

    pub leader: LeaderPolicy,

    pub profiles: Vec<Profile>,

    /// Image file extensions to scan.
    pub extensions: Vec<String>,

    pub filter: DetectionFilter,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            detector: String::new(),
            dim: 0,
            threshold: None,
            cluster_threshold: None,
            leader: LeaderPolicy::Running,
            profiles: default_profiles(),
            extensions: default_extensions(),
            filter: DetectionFilter::default(),
        }
    }
}

impl ScanConfig {
    /// Parses a YAML document. Missing fields take their defaults.
    pub fn from_yaml(s: &str) -> ScanResult<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Loads a YAML file.
    pub fn load(path: &Path) -> ScanResult<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| ScanError::io(path, e))?;
        Self::from_yaml(&data)
    }

    /// Match threshold for `backend`: explicit override, then the
    /// backend's profile, then [`FALLBACK_THRESHOLD`].
    pub fn match_threshold(&self, backend: &str) -> f32 {
        self.threshold
            .or_else(|| self.profiles.iter().find(|p| p.name == backend).map(|p| p.threshold))
            .unwrap_or(FALLBACK_THRESHOLD)
    }

    /// Review clustering threshold for `backend`.
    pub fn cluster_threshold(&self, backend: &str) -> f32 {
        self.cluster_threshold.unwrap_or_else(|| self.match_threshold(backend))
    }

    /// Embedding length: the configured `dim`, or the detector's when 0.
    /// A detector reporting a different length is a configuration error.
    pub fn resolve_dim(&self, detector_dim: Option<usize>) -> ScanResult<usize> {
        match (self.dim, detector_dim) {
            (0, Some(d)) if d > 0 => Ok(d),
            (0, _) => Err(ScanError::Config(
                "dim is unset and the detector does not report an embedding length".into(),
            )),
            (d, Some(got)) if got != d => Err(ScanError::Config(format!(
                "dim is {d} but the detector produces {got}-d embeddings"
            ))),
            (d, _) => Ok(d),
        }
    }

    /// Builds a validated matcher for `backend`.
    pub fn matcher(&self, backend: &str, dim: usize) -> ScanResult<Matcher> {
        Ok(Matcher::new(dim, self.match_threshold(backend))?)
    }

    /// Builds a validated review clusterer for `backend`.
    pub fn clusterer(&self, backend: &str, dim: usize) -> ScanResult<Clusterer> {
        Ok(Clusterer::new(dim, self.cluster_threshold(backend), self.leader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facegallery_faceid::FaceIdError;

    #[test]
    fn yaml_defaults() {
        let cfg = ScanConfig::from_yaml("detector: insightface\ndim: 512\n").unwrap();
        assert_eq!(cfg.detector, "insightface");
        assert_eq!(cfg.dim, 512);
        assert_eq!(cfg.leader, LeaderPolicy::Running);
        assert_eq!(cfg.profiles, default_profiles());
        assert!(cfg.extensions.iter().any(|e| e == "jpg"));
        assert_eq!(cfg.filter, DetectionFilter::default());
    }

    #[test]
    fn yaml_full() {
        let cfg = ScanConfig::from_yaml(
            r#"
detector: custom
dim: 128
threshold: 0.3
cluster_threshold: 0.25
leader: fixed
profiles:
  - name: custom
    threshold: 0.5
extensions: [png]
filter:
  min_confidence: 0.5
"#,
        )
        .unwrap();
        assert_eq!(cfg.leader, LeaderPolicy::Fixed);
        assert_eq!(cfg.match_threshold("custom"), 0.3);
        assert_eq!(cfg.cluster_threshold("custom"), 0.25);
        assert_eq!(cfg.extensions, vec!["png"]);
        assert_eq!(cfg.filter.min_confidence, 0.5);
        assert_eq!(cfg.filter.max_aspect_ratio, 2.0, "unset filter fields keep defaults");
    }

    #[test]
    fn threshold_resolution_order() {
        let mut cfg = ScanConfig::default();
        assert_eq!(cfg.match_threshold("insightface"), 0.40);
        assert_eq!(cfg.match_threshold("face_recognition"), 0.55);
        assert_eq!(cfg.match_threshold("mystery"), FALLBACK_THRESHOLD);
        assert_eq!(cfg.cluster_threshold("insightface"), 0.40);

        cfg.threshold = Some(0.2);
        assert_eq!(cfg.match_threshold("insightface"), 0.2);
    }

    #[test]
    fn resolve_dim_cases() {
        let mut cfg = ScanConfig::default();
        assert_eq!(cfg.resolve_dim(Some(512)).unwrap(), 512);
        assert!(matches!(cfg.resolve_dim(None), Err(ScanError::Config(_))));

        cfg.dim = 128;
        assert_eq!(cfg.resolve_dim(None).unwrap(), 128);
        assert_eq!(cfg.resolve_dim(Some(128)).unwrap(), 128);
        assert!(matches!(cfg.resolve_dim(Some(512)), Err(ScanError::Config(_))));
    }

    #[test]
    fn invalid_threshold_surfaces() {
        let cfg = ScanConfig {
            threshold: Some(4.0),
            ..Default::default()
        };
        let err = cfg.matcher("insightface", 512).unwrap_err();
        assert!(matches!(err, ScanError::FaceId(FaceIdError::InvalidThreshold(_))));
    }

    #[test]
    fn bad_yaml() {
        assert!(matches!(ScanConfig::from_yaml("dim: [1, 2"), Err(ScanError::Yaml(_))));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facescan.yaml");
        std::fs::write(&path, "dim: 64\n").unwrap();
        assert_eq!(ScanConfig::load(&path).unwrap().dim, 64);
        assert!(ScanConfig::load(&dir.path().join("missing.yaml")).is_err());
    }
}
