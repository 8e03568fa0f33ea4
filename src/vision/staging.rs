//! Temporary staging of uploaded screenshots

use super::ScreenshotImage;
use crate::error::DetoxError;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// File extensions accepted as screenshots (compared case-insensitively)
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Screenshots staged in a private temporary directory for one request.
///
/// The directory and everything in it is removed when this value is dropped,
/// whether or not the request succeeded.
#[derive(Debug)]
pub struct StagedUploads {
    dir: TempDir,
    files: Vec<PathBuf>,
}

impl StagedUploads {
    pub fn new() -> Result<Self, DetoxError> {
        let dir = tempfile::Builder::new().prefix("detox-uploads-").tempdir()?;
        Ok(Self {
            dir,
            files: Vec::new(),
        })
    }

    /// Stage every supported image in `uploads`, sorted by file name.
    ///
    /// With `consume`, the originals are moved out of `uploads`.
    pub fn from_dir(uploads: &Path, consume: bool) -> Result<Self, DetoxError> {
        let mut sources: Vec<PathBuf> = fs::read_dir(uploads)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_supported_image(path))
            .collect();
        sources.sort();

        let mut staged = Self::new()?;
        for source in &sources {
            staged.add_file(source, consume)?;
        }
        Ok(staged)
    }

    /// Stage in-memory image bytes
    pub fn add_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<PathBuf, DetoxError> {
        let target = self.next_path(name);
        fs::write(&target, bytes)?;
        self.files.push(target.clone());
        Ok(target)
    }

    /// Stage a file from disk, copying it or (with `consume`) moving it
    pub fn add_file(&mut self, source: &Path, consume: bool) -> Result<PathBuf, DetoxError> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("screenshot");
        let target = self.next_path(name);

        if consume {
            if fs::rename(source, &target).is_err() {
                // Across filesystems a rename fails; copy then delete
                fs::copy(source, &target)?;
                fs::remove_file(source)?;
            }
        } else {
            fs::copy(source, &target)?;
        }

        debug!(source = %source.display(), consume, "staged screenshot");
        self.files.push(target.clone());
        Ok(target)
    }

    fn next_path(&self, name: &str) -> PathBuf {
        let safe: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir
            .path()
            .join(format!("{:03}-{}", self.files.len(), safe))
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Read every staged file into memory
    pub fn load_images(&self) -> Result<Vec<ScreenshotImage>, DetoxError> {
        self.files
            .iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default()
                    .to_string();
                Ok(ScreenshotImage::new(name, fs::read(path)?))
            })
            .collect()
    }
}
