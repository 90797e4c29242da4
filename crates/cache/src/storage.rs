//! Polymorphic image storage. [`LocalStorage`] is the only working backend;
//! the remote backends exist as named extension points and refuse to be
//! constructed.

use std::io::{Cursor, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use campaign_core::config::StorageBackendKind;
use campaign_core::{CampaignError, CampaignResult};
use image::{DynamicImage, ImageFormat};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage path '{0}'")]
    InvalidPath(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode image for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{0} storage backend is not implemented")]
    Unsupported(&'static str),
}

impl From<StorageError> for CampaignError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unsupported(_) => CampaignError::Config(err.to_string()),
            other => CampaignError::Storage(other.to_string()),
        }
    }
}

/// Key/value blob store over images. Paths are relative, `/`-separated keys.
pub trait AssetStorage: Send + Sync {
    /// Persist `image` under `path` and return where it landed.
    fn save(&self, path: &str, image: &DynamicImage) -> Result<PathBuf, StorageError>;

    /// Load the image under `path`; `None` when absent or undecodable.
    fn load(&self, path: &str) -> Result<Option<DynamicImage>, StorageError>;

    fn exists(&self, path: &str) -> bool;

    /// Backend name for metrics/logging.
    fn backend_name(&self) -> &'static str;
}

/// Filesystem storage rooted at a base directory. Images are written as PNG
/// through a temp file and renamed into place, so readers never observe a
/// partially written asset.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path).map_err(|source| StorageError::Io {
            path: base_path.clone(),
            source,
        })?;
        debug!(base = %base_path.display(), "local storage ready");
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.base_path.join(relative))
    }
}

impl AssetStorage for LocalStorage {
    fn save(&self, path: &str, image: &DynamicImage) -> Result<PathBuf, StorageError> {
        let full_path = self.resolve(path)?;
        let parent = full_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.base_path.clone());
        std::fs::create_dir_all(&parent).map_err(|source| StorageError::Io {
            path: parent.clone(),
            source,
        })?;

        let mut encoded = Cursor::new(Vec::new());
        image
            .write_to(&mut encoded, ImageFormat::Png)
            .map_err(|source| StorageError::Encode {
                path: full_path.clone(),
                source,
            })?;

        let io_err = |source| StorageError::Io {
            path: full_path.clone(),
            source,
        };
        let mut staging = tempfile::NamedTempFile::new_in(&parent).map_err(io_err)?;
        staging.write_all(encoded.get_ref()).map_err(io_err)?;
        staging
            .persist(&full_path)
            .map_err(|e| io_err(e.error))?;

        metrics::counter!("storage.local.saved").increment(1);
        debug!(path = %full_path.display(), "image saved");
        Ok(full_path)
    }

    fn load(&self, path: &str) -> Result<Option<DynamicImage>, StorageError> {
        let full_path = self.resolve(path)?;
        let bytes = match std::fs::read(&full_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StorageError::Io {
                    path: full_path,
                    source,
                })
            }
        };

        match image::load_from_memory(&bytes) {
            Ok(img) => Ok(Some(img)),
            Err(e) => {
                warn!(path = %full_path.display(), error = %e, "stored image is unreadable, treating as absent");
                Ok(None)
            }
        }
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

/// AWS S3 extension point. Construction always fails.
#[derive(Debug)]
pub struct S3Storage {
    _bucket: String,
    _region: String,
}

impl S3Storage {
    pub fn connect(bucket: &str, region: &str) -> Result<Self, StorageError> {
        warn!(bucket, region, "S3 storage requested but not implemented");
        Err(StorageError::Unsupported("s3"))
    }
}

/// Azure Blob Storage extension point. Construction always fails.
#[derive(Debug)]
pub struct AzureBlobStorage {
    _container: String,
}

impl AzureBlobStorage {
    pub fn connect(container: &str) -> Result<Self, StorageError> {
        warn!(container, "Azure Blob storage requested but not implemented");
        Err(StorageError::Unsupported("azure_blob"))
    }
}

/// Build the configured backend rooted at `base`. Unimplemented backends fail
/// here, before any work starts.
pub fn build_storage(kind: StorageBackendKind, base: &Path) -> CampaignResult<Arc<dyn AssetStorage>> {
    match kind {
        StorageBackendKind::Local => {
            let storage = LocalStorage::new(base)?;
            info!(base = %base.display(), "using local storage backend");
            Ok(Arc::new(storage))
        }
        StorageBackendKind::S3 => {
            S3Storage::connect(&base.display().to_string(), "default")?;
            Err(CampaignError::Config("s3 storage backend is not implemented".to_string()))
        }
        StorageBackendKind::AzureBlob => {
            AzureBlobStorage::connect(&base.display().to_string())?;
            Err(CampaignError::Config(
                "azure_blob storage backend is not implemented".to_string(),
            ))
        }
    }
}
