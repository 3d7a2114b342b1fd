//! Numeric primitives over embedding vectors.
//!
//! All accumulation happens in f64 and in index order, so results are
//! reproducible for identical inputs.

use crate::FaceIdError;

/// Returns a unit-length copy of `v`.
///
/// A zero vector has no direction and is returned unchanged.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let mut out = v.to_vec();
    l2_normalize(&mut out);
    out
}

/// Normalizes a vector to unit length in-place. Zero vectors are left as-is.
pub fn l2_normalize(v: &mut [f32]) {
    let mut sum: f64 = 0.0;
    for &x in v.iter() {
        sum += (x as f64) * (x as f64);
    }
    let norm = sum.sqrt();
    if norm > 0.0 {
        let scale = (1.0 / norm) as f32;
        for x in v.iter_mut() {
            *x *= scale;
        }
    }
}

/// Euclidean norm of `v`.
pub fn norm(v: &[f32]) -> f32 {
    let mut sum: f64 = 0.0;
    for &x in v {
        sum += (x as f64) * (x as f64);
    }
    sum.sqrt() as f32
}

/// Cosine distance `1 - dot(normalize(a), normalize(b))`, in `[0, 2]`.
///
/// Inputs need not be normalized. A zero vector is orthogonal to
/// everything (distance 1). Vectors of different lengths are a
/// configuration error.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Result<f32, FaceIdError> {
    check_dim(a.len(), b)?;
    Ok(unit_distance(&normalize(a), &normalize(b)))
}

/// Arithmetic mean of `vectors`, re-normalized to unit length.
///
/// Returns `None` for an empty slice. All vectors must share the length
/// of the first one.
pub fn centroid<V: AsRef<[f32]>>(vectors: &[V]) -> Result<Option<Vec<f32>>, FaceIdError> {
    let Some(first) = vectors.first() else {
        return Ok(None);
    };
    let dim = first.as_ref().len();

    let mut sum = vec![0.0f64; dim];
    for v in vectors {
        let v = v.as_ref();
        check_dim(dim, v)?;
        for (acc, &x) in sum.iter_mut().zip(v) {
            *acc += x as f64;
        }
    }

    let n = vectors.len() as f64;
    let mut mean: Vec<f32> = sum.into_iter().map(|s| (s / n) as f32).collect();
    l2_normalize(&mut mean);
    Ok(Some(mean))
}

/// Folds `current` into a leader that already summarizes `n - 1` members,
/// producing `normalize((leader * (n - 1) + current) / n)`.
///
/// `n` is the member count after insertion. `n <= 1` yields the normalized
/// `current`.
pub fn running_centroid(leader: &[f32], current: &[f32], n: usize) -> Result<Vec<f32>, FaceIdError> {
    check_dim(leader.len(), current)?;
    if n <= 1 {
        return Ok(normalize(current));
    }

    let prev = (n - 1) as f64;
    let n = n as f64;
    let mut out: Vec<f32> = leader
        .iter()
        .zip(current)
        .map(|(&l, &c)| ((l as f64 * prev + c as f64) / n) as f32)
        .collect();
    l2_normalize(&mut out);
    Ok(out)
}

/// Rejects thresholds that are not finite cosine distances.
pub fn check_threshold(threshold: f32) -> Result<(), FaceIdError> {
    if threshold.is_finite() && (0.0..=2.0).contains(&threshold) {
        Ok(())
    } else {
        Err(FaceIdError::InvalidThreshold(threshold))
    }
}

/// Rejects a vector whose length differs from `expected`.
pub fn check_dim(expected: usize, v: &[f32]) -> Result<(), FaceIdError> {
    if v.len() == expected {
        Ok(())
    } else {
        Err(FaceIdError::DimensionMismatch {
            expected,
            got: v.len(),
        })
    }
}

/// Cosine distance between two already-normalized vectors of equal length.
pub(crate) fn unit_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot: f64 = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        dot += (x as f64) * (y as f64);
    }
    // Clamp to [-1, 1] to absorb rounding.
    let sim = dot.clamp(-1.0, 1.0);
    (1.0 - sim) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_unit() {
        let v = normalize(&[3.0, 4.0]);
        assert!((norm(&v) - 1.0).abs() < 1e-6, "should be unit length, got {v:?}");
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn normalize_zero_unchanged() {
        assert_eq!(normalize(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn distance_to_self_is_zero() {
        for v in [vec![1.0, 0.0, 0.0], vec![0.3, -2.0, 5.5], vec![1e-3, 1e-3, 1e-3]] {
            let d = cosine_distance(&v, &v).unwrap();
            assert!(d.abs() < 1e-6, "self distance should be 0, got {d}");
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let a = [0.2, 0.9, -0.4];
        let b = [1.5, -0.3, 0.7];
        let ab = cosine_distance(&a, &b).unwrap();
        let ba = cosine_distance(&b, &a).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn distance_orthogonal_and_opposite() {
        let d = cosine_distance(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!((d - 1.0).abs() < 1e-6, "orthogonal: got {d}");
        let d = cosine_distance(&[1.0, 0.0], &[-3.0, 0.0]).unwrap();
        assert!((d - 2.0).abs() < 1e-6, "opposite: got {d}");
    }

    #[test]
    fn distance_ignores_magnitude() {
        let d = cosine_distance(&[1.0, 1.0], &[10.0, 10.0]).unwrap();
        assert!(d.abs() < 1e-6, "scaled copy should be identical, got {d}");
    }

    #[test]
    fn distance_zero_vector_is_orthogonal() {
        let d = cosine_distance(&[0.0, 0.0], &[1.0, 0.0]).unwrap();
        assert!((d - 1.0).abs() < 1e-6, "got {d}");
    }

    #[test]
    fn distance_dimension_mismatch() {
        let err = cosine_distance(&[1.0, 0.0], &[1.0, 0.0, 0.0]).unwrap_err();
        assert_eq!(err, FaceIdError::DimensionMismatch { expected: 2, got: 3 });
    }

    #[test]
    fn centroid_of_opposite_corners() {
        let c = centroid(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap().unwrap();
        let h = std::f32::consts::FRAC_1_SQRT_2;
        assert!((c[0] - h).abs() < 1e-6 && (c[1] - h).abs() < 1e-6, "got {c:?}");
    }

    #[test]
    fn centroid_empty_is_none() {
        let empty: [Vec<f32>; 0] = [];
        assert_eq!(centroid(&empty).unwrap(), None);
    }

    #[test]
    fn centroid_rejects_mixed_lengths() {
        let err = centroid(&[vec![1.0, 0.0], vec![1.0]]).unwrap_err();
        assert_eq!(err, FaceIdError::DimensionMismatch { expected: 2, got: 1 });
    }

    #[test]
    fn running_centroid_matches_batch_mean() {
        let a = normalize(&[1.0, 0.2, 0.0]);
        let b = normalize(&[0.8, 0.5, 0.1]);
        let c = normalize(&[0.9, 0.1, 0.3]);

        let mut leader = a.clone();
        leader = running_centroid(&leader, &b, 2).unwrap();
        leader = running_centroid(&leader, &c, 3).unwrap();

        // After the first fold the leader is renormalized, so it only
        // approximates the batch mean; the direction must stay close.
        let batch = centroid(&[a, b, c]).unwrap().unwrap();
        let d = cosine_distance(&leader, &batch).unwrap();
        assert!(d < 1e-3, "running leader drifted from batch mean: {d}");
    }

    #[test]
    fn running_centroid_first_member() {
        let out = running_centroid(&[0.0, 0.0], &[0.0, 2.0], 1).unwrap();
        assert_eq!(out, vec![0.0, 1.0]);
    }

    #[test]
    fn threshold_bounds() {
        assert!(check_threshold(0.0).is_ok());
        assert!(check_threshold(2.0).is_ok());
        assert!(check_threshold(0.4).is_ok());
        assert_eq!(check_threshold(-0.1), Err(FaceIdError::InvalidThreshold(-0.1)));
        assert!(check_threshold(2.5).is_err());
        assert!(check_threshold(f32::NAN).is_err());
    }
}
