//! Photo ingestion and identity review for a face gallery.
//!
//! A [`Scanner`] walks folders through an [`ImageSource`], hashes each
//! image, asks a [`FaceDetector`] for faces and stores them in a
//! [`GalleryStore`]. New faces are matched against the identities already
//! labelled in the store and linked when one matches. [`Gallery`] offers
//! the review side: clustering unassigned faces, creating identities and
//! bulk re-matching.
//!
//! # Usage
//!
//! ```no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! use facegallery_facescan::{DetectorRegistry, MemoryStore, ScanConfig, Scanner};
//!
//! # fn register(_: &mut DetectorRegistry) {}
//! let cfg = ScanConfig::load("facescan.yaml".as_ref())?;
//! let mut registry = DetectorRegistry::new();
//! register(&mut registry);
//!
//! let scanner = Scanner::from_registry(&cfg, Arc::new(MemoryStore::new()), &registry)?;
//! let summary = scanner.scan(&[PathBuf::from("/photos")], false, |p| println!("{}", p.message), || false)?;
//! println!("{} new, {} faces", summary.added, summary.faces_found);
//! # Ok::<(), facegallery_facescan::ScanError>(())
//! ```
//!
//! # Errors
//!
//! Per-file failures ([`ScanError::is_transient`]) are logged and counted
//! as skipped. Configuration errors, such as embeddings whose length
//! differs from the configured one, abort the scan.

mod codec;
mod config;
mod detector;
mod error;
mod filter;
mod gallery;
mod scanner;
mod source;
mod store;
mod types;
mod worker;

pub use codec::{decode_embedding, encode_embedding};
pub use config::{FALLBACK_THRESHOLD, Profile, ScanConfig, default_profiles};
pub use detector::{Capabilities, DetectorRegistry, FaceDetector};
pub use error::{ScanError, ScanResult};
pub use filter::DetectionFilter;
pub use gallery::Gallery;
pub use scanner::Scanner;
pub use source::{DEFAULT_EXTENSIONS, FsImageSource, ImageSource, content_hash};
pub use store::{GalleryStore, MemoryStore};
pub use types::{
    BoundingBox, DetectedFace, Detection, FaceCluster, FaceId, FaceRecord, NewFace, NewPhoto, Photo, PhotoId,
    PersonId, PersonIdentity, PersonUpdate, ScanProgress, ScanSummary,
};
pub use worker::{ScanHandle, ScanWorker};
