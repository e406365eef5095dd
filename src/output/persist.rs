//! Sample persistence.
//!
//! Saved samples are a debugging aid. Writes run off the request path and
//! their failures are logged, never surfaced to the client.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use image::{DynamicImage, ImageFormat};
use tracing::{info, warn};

use crate::error::PersistError;

/// How saved files are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleNaming {
    /// `{unix_secs}_{index}.png`, for batches
    Indexed,
    /// `{unix_secs}.png`, for single results
    Single,
}

/// File name for sample `index` written at `timestamp`.
pub fn sample_filename(timestamp: u64, index: usize, naming: SampleNaming) -> String {
    match naming {
        SampleNaming::Indexed => format!("{}_{}.png", timestamp, index),
        SampleNaming::Single => format!("{}.png", timestamp),
    }
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Writes sample images into a directory.
#[derive(Debug, Clone)]
pub struct SampleWriter {
    dir: PathBuf,
}

impl SampleWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `images` as PNG files, creating the directory if needed.
    pub fn write_all(
        &self,
        images: &[DynamicImage],
        naming: SampleNaming,
    ) -> Result<Vec<PathBuf>, PersistError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| PersistError::CreateDir {
            path: self.dir.display().to_string(),
            source,
        })?;

        let timestamp = unix_timestamp();
        images
            .iter()
            .enumerate()
            .map(|(i, image)| {
                let path = self.dir.join(sample_filename(timestamp, i, naming));
                image
                    .save_with_format(&path, ImageFormat::Png)
                    .map_err(|e| PersistError::Write {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    })?;
                Ok(path)
            })
            .collect()
    }

    /// Write `images` on a blocking task without waiting for it.
    ///
    /// Outside a Tokio runtime the write happens inline.
    pub fn save_in_background(&self, images: Vec<DynamicImage>, naming: SampleNaming) {
        let writer = self.clone();
        let job = move || match writer.write_all(&images, naming) {
            Ok(paths) => info!(count = paths.len(), "Saved samples: {:?}", paths),
            Err(e) => warn!(dir = %writer.dir.display(), "Failed to save samples: {}", e),
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(job);
            }
            Err(_) => job(),
        }
    }
}
