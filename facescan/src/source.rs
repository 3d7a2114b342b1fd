use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::{ScanError, ScanResult};

/// Image extensions accepted by default (compared case-insensitively).
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp", "heic", "heif", "gif",
];

/// Lists the image files under a folder.
pub trait ImageSource: Send + Sync {
    /// Returns image paths under `folder`, recursively, in a stable order.
    fn list_images(&self, folder: &Path) -> ScanResult<Vec<PathBuf>>;
}

/// [`ImageSource`] backed by the local filesystem.
#[derive(Debug, Clone)]
pub struct FsImageSource {
    extensions: Vec<String>,
}

impl FsImageSource {
    /// Accepts the given extensions (without the dot, any case).
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Self {
        Self {
            extensions: extensions.iter().map(|e| e.as_ref().to_ascii_lowercase()).collect(),
        }
    }

    pub fn is_image(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    fn walk(&self, dir: &Path, out: &mut Vec<PathBuf>) -> ScanResult<()> {
        let entries = std::fs::read_dir(dir).map_err(|e| ScanError::io(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| ScanError::io(dir, e))?;
            let path = entry.path();
            // file_type() does not follow symlinks. Linked directories are skipped.
            let file_type = entry.file_type().map_err(|e| ScanError::io(&path, e))?;
            if file_type.is_dir() {
                self.walk(&path, out)?;
            } else if file_type.is_symlink() && path.is_dir() {
                continue;
            } else if self.is_image(&path) {
                out.push(path);
            }
        }
        Ok(())
    }
}

impl Default for FsImageSource {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS)
    }
}

impl ImageSource for FsImageSource {
    fn list_images(&self, folder: &Path) -> ScanResult<Vec<PathBuf>> {
        let mut out = Vec::new();
        self.walk(folder, &mut out)?;
        out.sort();
        Ok(out)
    }
}

/// Hex-encoded BLAKE3 digest of the file contents.
pub fn content_hash(path: &Path) -> ScanResult<String> {
    let mut file = File::open(path).map_err(|e| ScanError::io(path, e))?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(|e| ScanError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}
