//! Storage for meter photos attached to readings.
//!
//! A photo is named after its reading's timestamp (`YYYYMMDD_HHMMSS`), so two
//! uploads within the same second share a path and the later one replaces
//! the earlier. The overwrite is logged but not prevented.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use meter_core::time_utils::image_token;
use meter_core::{MeterError, Result};
use tracing::{debug, warn};

/// Directory name for stored photos inside the data directory.
pub const UPLOADS_DIR: &str = "uploads";

/// Extension used when the upload does not carry a usable one.
pub const DEFAULT_EXTENSION: &str = "png";

/// Raw image payload supplied alongside a reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub extension: String,
}

impl ImageUpload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Use `extension` (without the dot) for the stored file name.
    ///
    /// Anything that is not a short alphanumeric token falls back to
    /// [`DEFAULT_EXTENSION`].
    pub fn with_extension(mut self, extension: &str) -> Self {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        let usable = !ext.is_empty()
            && ext.len() <= 8
            && ext.chars().all(|c| c.is_ascii_alphanumeric());
        self.extension = if usable {
            ext
        } else {
            DEFAULT_EXTENSION.to_string()
        };
        self
    }

    /// Load an upload from a file, keeping its extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| MeterError::Storage {
            path: path.to_path_buf(),
            source,
        })?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or(DEFAULT_EXTENSION);
        Ok(Self::new(bytes).with_extension(extension))
    }
}

/// Writes photos into a single directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    /// Create the store, creating `dir` if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| MeterError::Storage {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Path a photo taken at `timestamp` is stored under.
    pub fn path_for(&self, timestamp: &DateTime<Utc>, extension: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", image_token(timestamp), extension))
    }

    /// Store `upload` for the reading at `timestamp` and return its path.
    ///
    /// The bytes go to a temporary file first and are renamed into place, so
    /// a reader never sees a half-written photo.
    pub fn save(&self, timestamp: &DateTime<Utc>, upload: &ImageUpload) -> Result<PathBuf> {
        if upload.bytes.is_empty() {
            return Err(MeterError::validation("image", "image payload is empty"));
        }

        let path = self.path_for(timestamp, &upload.extension);
        if path.exists() {
            warn!(
                "Overwriting stored image {} (another reading in the same second)",
                path.display()
            );
        }

        let storage_error = |source| MeterError::Storage {
            path: path.clone(),
            source,
        };
        let tmp = path.with_extension(format!("{}.tmp", upload.extension));
        std::fs::write(&tmp, &upload.bytes).map_err(storage_error)?;
        std::fs::rename(&tmp, &path).map_err(storage_error)?;

        debug!("Stored {} byte image at {}", upload.bytes.len(), path.display());
        Ok(path)
    }

    /// Delete a photo written by [`save`](Self::save) whose reading was
    /// never stored. Failures are logged, not returned.
    pub fn discard(&self, path: &Path) {
        match std::fs::remove_file(path) {
            Ok(()) => debug!("Removed orphaned image {}", path.display()),
            Err(e) => warn!("Could not remove orphaned image {}: {}", path.display(), e),
        }
    }
}
