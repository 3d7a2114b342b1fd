use serde::{Deserialize, Serialize};

use crate::cluster::{Clusterer, LeaderPolicy};
use crate::matcher::Matcher;
use crate::vecops::check_threshold;
use crate::FaceIdError;

/// Engine configuration shared by clustering and matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Embedding length produced by the detector backend (e.g. 512).
    pub dim: usize,

    /// Cosine-distance cutoff. Lower = stricter (more unknowns),
    /// higher = more lenient (more merges).
    pub threshold: f32,

    /// Leader update rule used while clustering.
    #[serde(default)]
    pub leader: LeaderPolicy,
}

impl Config {
    /// Checks `dim` and `threshold`.
    pub fn validate(&self) -> Result<(), FaceIdError> {
        if self.dim == 0 {
            return Err(FaceIdError::InvalidDimension);
        }
        check_threshold(self.threshold)
    }

    /// Builds a validated [`Clusterer`].
    pub fn clusterer(&self) -> Result<Clusterer, FaceIdError> {
        Clusterer::new(self.dim, self.threshold, self.leader)
    }

    /// Builds a validated [`Matcher`].
    pub fn matcher(&self) -> Result<Matcher, FaceIdError> {
        Matcher::new(self.dim, self.threshold)
    }
}
