use serde::{Deserialize, Serialize};

use crate::vecops::{check_dim, check_threshold, normalize, running_centroid, unit_distance};
use crate::FaceIdError;

/// How a cluster leader evolves as members join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderPolicy {
    /// The leader is the running normalized centroid of all members.
    #[default]
    Running,
    /// The leader stays the first member's embedding.
    Fixed,
}

/// Groups embeddings into identity clusters with greedy leader assignment
/// and the default [`LeaderPolicy::Running`].
///
/// Each returned group holds zero-based indices into `embeddings`, in
/// input order. Groups appear in the order they were formed. An embedding
/// joins the nearest leader when its cosine distance is strictly below
/// `threshold`, otherwise it starts a new group.
///
/// Runs in O(N·C) distance evaluations, where C is the number of groups.
///
/// The embedding length is taken from the first embedding; a zero-length
/// first embedding is [`FaceIdError::InvalidDimension`].
pub fn cluster<V: AsRef<[f32]>>(embeddings: &[V], threshold: f32) -> Result<Vec<Vec<usize>>, FaceIdError> {
    let Some(first) = embeddings.first() else {
        check_threshold(threshold)?;
        return Ok(Vec::new());
    };
    Clusterer::new(first.as_ref().len(), threshold, LeaderPolicy::Running)?.cluster(embeddings)
}

/// Leader-based greedy clusterer bound to a fixed embedding length.
#[derive(Debug, Clone)]
pub struct Clusterer {
    pub(crate) dim: usize,
    pub(crate) threshold: f32,
    pub(crate) leader: LeaderPolicy,
}

/// A cluster under construction: its normalized leader and member indices.
struct Group {
    leader: Vec<f32>,
    members: Vec<usize>,
}

impl Clusterer {
    /// Creates a clusterer. Fails on an invalid threshold or a zero `dim`.
    pub fn new(dim: usize, threshold: f32, leader: LeaderPolicy) -> Result<Self, FaceIdError> {
        if dim == 0 {
            return Err(FaceIdError::InvalidDimension);
        }
        check_threshold(threshold)?;
        Ok(Self {
            dim,
            threshold,
            leader,
        })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn leader_policy(&self) -> LeaderPolicy {
        self.leader
    }

    /// Partitions `embeddings` into groups of indices. Empty input yields
    /// no groups.
    pub fn cluster<V: AsRef<[f32]>>(&self, embeddings: &[V]) -> Result<Vec<Vec<usize>>, FaceIdError> {
        check_threshold(self.threshold)?;
        if embeddings.is_empty() {
            return Ok(Vec::new());
        }

        // Validate everything before doing any work.
        let mut normed = Vec::with_capacity(embeddings.len());
        for e in embeddings {
            let e = e.as_ref();
            check_dim(self.dim, e)?;
            normed.push(normalize(e));
        }

        let mut groups: Vec<Group> = Vec::new();
        for (idx, current) in normed.into_iter().enumerate() {
            let mut best: Option<(usize, f32)> = None;
            for (g, group) in groups.iter().enumerate() {
                let d = unit_distance(&group.leader, &current);
                if best.is_none_or(|(_, bd)| d < bd) {
                    best = Some((g, d));
                }
            }

            match best {
                Some((g, d)) if d < self.threshold => {
                    let group = &mut groups[g];
                    group.members.push(idx);
                    if self.leader == LeaderPolicy::Running {
                        group.leader = running_centroid(&group.leader, &current, group.members.len())?;
                    }
                }
                _ => groups.push(Group {
                    leader: current,
                    members: vec![idx],
                }),
            }
        }

        Ok(groups.into_iter().map(|g| g.members).collect())
    }
}
