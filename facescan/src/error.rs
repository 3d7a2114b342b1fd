use std::path::PathBuf;

use facegallery_faceid::FaceIdError;
use thiserror::Error;

/// Errors returned by facescan operations.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("facescan: io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("facescan: detector error: {0}")]
    Detector(String),

    #[error("facescan: store error: {0}")]
    Store(String),

    #[error("facescan: codec error: {0}")]
    Codec(String),

    #[error("facescan: config error: {0}")]
    Config(String),

    #[error("facescan: yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("facescan: {0}")]
    FaceId(#[from] FaceIdError),

    #[error("facescan: no detector available: {0}")]
    NoDetector(String),

    #[error("facescan: a scan is already running")]
    Busy,

    #[error("facescan: scan worker failed: {0}")]
    Join(String),
}

impl ScanError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScanError::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true for failures confined to one unit of work (an
    /// unreadable file, a detector crash, a store hiccup). A scan counts
    /// these as skipped and moves on; anything else aborts it.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ScanError::Io { .. } | ScanError::Detector(_) | ScanError::Store(_) | ScanError::Codec(_)
        )
    }
}

/// Result type for facescan operations.
pub type ScanResult<T> = Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        let io = ScanError::io("/x.jpg", std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io.is_transient());
        assert!(ScanError::Detector("bad image".into()).is_transient());
        assert!(ScanError::Store("locked".into()).is_transient());

        let dim = ScanError::from(FaceIdError::DimensionMismatch { expected: 512, got: 128 });
        assert!(!dim.is_transient());
        assert!(!ScanError::Config("dim".into()).is_transient());
        assert!(!ScanError::Busy.is_transient());
    }

    #[test]
    fn io_message_names_path() {
        let err = ScanError::io("/photos/a.jpg", std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert_eq!(err.to_string(), "facescan: io error on /photos/a.jpg: boom");
    }
}
