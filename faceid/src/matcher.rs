use std::collections::BTreeMap;

use crate::vecops::{check_dim, check_threshold, norm, normalize, unit_distance};
use crate::FaceIdError;

/// Identities with at least this many reference samples must pass the
/// close-sample vote.
pub const VOTE_MIN_SAMPLES: usize = 3;

/// Minimum fraction of an identity's samples that must be close to the query.
pub const VOTE_MIN_FRACTION: f32 = 0.30;

/// A sample is "close" when within `min(threshold * VOTE_RADIUS_FACTOR, VOTE_RADIUS_CAP)`.
pub const VOTE_RADIUS_FACTOR: f32 = 2.0;
pub const VOTE_RADIUS_CAP: f32 = 0.80;

/// Winning identity of a match, with the evidence behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct Match<I> {
    pub id: I,
    /// Smallest cosine distance from the query to any of the identity's samples.
    pub distance: f32,
    /// Number of reference samples the identity has.
    pub samples: usize,
    /// How many of those samples fell inside the vote radius.
    pub close: usize,
}

/// Returns the identity in `known` that best supports `query`, or `None`.
///
/// See [`Matcher::best_match`] for the voting rules. The embedding length
/// is taken from `query`; every known sample must share it. An empty
/// `query` is [`FaceIdError::InvalidDimension`] unless `known` is empty.
pub fn find_best_match<I, V>(query: &[f32], known: &[(I, V)], threshold: f32) -> Result<Option<I>, FaceIdError>
where
    I: Copy + Ord,
    V: AsRef<[f32]>,
{
    if known.is_empty() {
        check_threshold(threshold)?;
        return Ok(None);
    }
    let matcher = Matcher::new(query.len(), threshold)?;
    Ok(matcher.best_match(query, known)?.map(|m| m.id))
}

/// Per-identity voting matcher bound to a fixed embedding length.
#[derive(Debug, Clone)]
pub struct Matcher {
    pub(crate) dim: usize,
    pub(crate) threshold: f32,
}

impl Matcher {
    /// Creates a matcher. Fails on an invalid threshold or a zero `dim`.
    pub fn new(dim: usize, threshold: f32) -> Result<Self, FaceIdError> {
        if dim == 0 {
            return Err(FaceIdError::InvalidDimension);
        }
        check_threshold(threshold)?;
        Ok(Self { dim, threshold })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Cosine-distance radius used by the close-sample vote.
    pub fn vote_radius(&self) -> f32 {
        (self.threshold * VOTE_RADIUS_FACTOR).min(VOTE_RADIUS_CAP)
    }

    /// Matches `query` against labelled samples `(identity, embedding)`.
    ///
    /// Distances are grouped per identity and each identity is scored by
    /// its closest sample. Identities with [`VOTE_MIN_SAMPLES`] or more
    /// samples are dropped unless at least [`VOTE_MIN_FRACTION`] of them
    /// lie within [`Matcher::vote_radius`], which keeps one stray sample
    /// from carrying an otherwise dissimilar identity. The surviving
    /// identity with the smallest distance wins if that distance is below
    /// the threshold.
    ///
    /// Identities are visited in ascending order and only a strictly
    /// smaller distance replaces the leader, so ties go to the lowest id.
    ///
    /// Returns `None` for empty `known` or a zero query.
    pub fn best_match<I, V>(&self, query: &[f32], known: &[(I, V)]) -> Result<Option<Match<I>>, FaceIdError>
    where
        I: Copy + Ord,
        V: AsRef<[f32]>,
    {
        check_threshold(self.threshold)?;
        if known.is_empty() {
            return Ok(None);
        }
        check_dim(self.dim, query)?;
        for (_, emb) in known {
            check_dim(self.dim, emb.as_ref())?;
        }
        if norm(query) == 0.0 {
            return Ok(None);
        }

        let q = normalize(query);
        let mut per_identity: BTreeMap<I, Vec<f32>> = BTreeMap::new();
        for (id, emb) in known {
            let d = unit_distance(&q, &normalize(emb.as_ref()));
            per_identity.entry(*id).or_default().push(d);
        }

        let radius = self.vote_radius();
        let mut best: Option<Match<I>> = None;
        for (id, dists) in per_identity {
            let min = dists.iter().copied().fold(f32::INFINITY, f32::min);
            let close = dists.iter().filter(|&&d| d < radius).count();
            let samples = dists.len();

            if samples >= VOTE_MIN_SAMPLES && (close as f32 / samples as f32) < VOTE_MIN_FRACTION {
                continue;
            }
            if best.as_ref().is_none_or(|b| min < b.distance) {
                best = Some(Match {
                    id,
                    distance: min,
                    samples,
                    close,
                });
            }
        }

        Ok(best.filter(|m| m.distance < self.threshold))
    }
}
