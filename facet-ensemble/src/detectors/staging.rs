//! Transient image staging
//!
//! Some backends choke on user-supplied file names (spaces, unicode, odd
//! extensions). [`StagedImage`] copies the input to a generated name in the
//! system temp directory and removes the copy when dropped, on success and
//! failure paths alike.

use std::ffi::OsStr;
use std::io;
use std::path::Path;
use tempfile::TempPath;
use tracing::debug;

/// Temporary copy of an input image under a generated file name
#[derive(Debug)]
pub struct StagedImage {
    path: TempPath,
}

impl StagedImage {
    /// Copy `source` into the temp directory as `<prefix><random>.<ext>`
    pub fn stage(source: &Path, prefix: &str) -> io::Result<Self> {
        let extension = source
            .extension()
            .and_then(OsStr::to_str)
            .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| format!(".{}", ext.to_lowercase()))
            .unwrap_or_else(|| ".jpg".to_string());

        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(&extension)
            .tempfile()?;
        let path = file.into_temp_path();

        std::fs::copy(source, &path)?;
        debug!(
            source = %source.display(),
            staged = %path.display(),
            "Staged image copy"
        );

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
