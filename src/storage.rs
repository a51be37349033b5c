//! Artifact storage: originals, cropped tissue samples, and saliency
//! heatmaps, each in its own bucket under a common root.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use image::RgbImage;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create artifact directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write image {path}: {source}")]
    WriteImage {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Artifact category, mapped to a subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Originals,
    Cropped,
    Heatmaps,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Originals => "originals",
            Bucket::Cropped => "cropped",
            Bucket::Heatmaps => "heatmaps",
        }
    }
}

/// Where screening artifacts are persisted. Trait object so tests and
/// reduced deployments can swap the backend.
pub trait ArtifactStore: Send + Sync {
    fn save(&self, bucket: Bucket, prefix: &str, image: &RgbImage)
        -> Result<PathBuf, StorageError>;
}

/// Filesystem-backed artifact store. Buckets are created lazily.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactStore for FsArtifactStore {
    fn save(
        &self,
        bucket: Bucket,
        prefix: &str,
        image: &RgbImage,
    ) -> Result<PathBuf, StorageError> {
        let dir = self.root.join(bucket.as_str());
        fs::create_dir_all(&dir).map_err(|source| StorageError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        let path = dir.join(artifact_filename(prefix, "png"));
        image.save(&path).map_err(|source| StorageError::WriteImage {
            path: path.clone(),
            source,
        })?;

        debug!(path = %path.display(), "artifact saved");
        Ok(path)
    }
}

/// Unique artifact filename: `{prefix}_{timestamp}_{short-uuid}.{ext}`.
pub fn artifact_filename(prefix: &str, extension: &str) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let unique = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{timestamp}_{}.{extension}", &unique[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn filename_has_prefix_and_extension() {
        let name = artifact_filename("cropped_left", "png");
        assert!(name.starts_with("cropped_left_"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn filenames_are_unique() {
        let a = artifact_filename("original", "png");
        let b = artifact_filename("original", "png");
        assert_ne!(a, b);
    }

    #[test]
    fn save_creates_bucket_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let image = RgbImage::from_pixel(8, 8, Rgb([200, 120, 130]));

        let path = store.save(Bucket::Cropped, "cropped_left", &image).unwrap();
        assert!(path.exists());
        assert!(path.starts_with(dir.path().join("cropped")));

        let reloaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(reloaded.dimensions(), (8, 8));
    }

    #[test]
    fn buckets_are_separate_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let image = RgbImage::new(4, 4);

        let original = store.save(Bucket::Originals, "original", &image).unwrap();
        let heatmap = store.save(Bucket::Heatmaps, "heatmap", &image).unwrap();
        assert_ne!(original.parent(), heatmap.parent());
    }
}
