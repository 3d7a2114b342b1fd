//! Identity clustering and matching over face embeddings.
//!
//! Embeddings come from an external face model; this crate only compares
//! them. Everything here is synchronous, allocation-light and free of
//! shared state, so it can be called from any thread.
//!
//! # Usage
//!
//! ```
//! use facegallery_faceid::{cluster, find_best_match};
//!
//! let faces = vec![vec![1.0, 0.0], vec![0.99, 0.05], vec![0.0, 1.0]];
//! let groups = cluster(&faces, 0.1).unwrap();
//! assert_eq!(groups, vec![vec![0, 1], vec![2]]);
//!
//! let known = vec![(1u32, vec![1.0, 0.0]), (2u32, vec![0.0, 1.0])];
//! assert_eq!(find_best_match(&[0.98, 0.1], &known, 0.4).unwrap(), Some(1));
//! ```
//!
//! # Design
//!
//! [`cluster`] is a greedy leader clusterer: each embedding joins the
//! nearest leader if it is closer than the threshold, otherwise it starts
//! a new cluster. With [`LeaderPolicy::Running`] the leader tracks the
//! normalized mean of its members, so an outlier first sample does not
//! pin the cluster.
//!
//! [`find_best_match`] scores identities, not samples: an identity wins by
//! its closest sample, but identities with several samples must also have
//! a minimum share of them near the query. This keeps identities with many
//! references from winning on a single lucky hit.

mod cluster;
mod config;
mod error;
mod matcher;
pub mod vecops;

pub use cluster::{Clusterer, LeaderPolicy, cluster};
pub use config::Config;
pub use error::FaceIdError;
pub use matcher::{
    Match, Matcher, VOTE_MIN_FRACTION, VOTE_MIN_SAMPLES, VOTE_RADIUS_CAP, VOTE_RADIUS_FACTOR,
    find_best_match,
};
pub use vecops::{centroid, cosine_distance, normalize};
