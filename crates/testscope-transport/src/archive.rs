//! Archive codec boundary
//!
//! The transport only needs two operations from an archive format: pack a
//! directory into a single file and unpack that file into a directory. The
//! default codec delegates both to the system `tar` binary.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::TransportError;
use crate::Result;

/// Pack/unpack capability used by connectors.
pub trait ArchiveCodec: Send + Sync {
    /// Compress `source_dir` into `archive_path` and return the archive path.
    fn compress(&self, source_dir: &Path, archive_path: &Path) -> Result<PathBuf>;

    /// Extract `archive_path` into `dest_dir` and return the extraction root.
    fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<PathBuf>;
}

/// Gzip-compressed tarball codec backed by the `tar` binary.
#[derive(Debug, Clone)]
pub struct TarGzCodec {
    tar_binary: String,
}

impl Default for TarGzCodec {
    fn default() -> Self {
        Self {
            tar_binary: "tar".to_string(),
        }
    }
}

impl TarGzCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific `tar` executable instead of the one on `PATH`.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            tar_binary: binary.into(),
        }
    }

    fn run(&self, args: &[&OsStr]) -> Result<()> {
        let output = Command::new(&self.tar_binary)
            .args(args)
            .output()
            .map_err(|e| {
                TransportError::Archive(format!("failed to run {}: {e}", self.tar_binary))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransportError::Archive(format!(
                "{} exited with {}: {}",
                self.tar_binary,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl ArchiveCodec for TarGzCodec {
    fn compress(&self, source_dir: &Path, archive_path: &Path) -> Result<PathBuf> {
        if !source_dir.is_dir() {
            return Err(TransportError::Archive(format!(
                "source is not a directory: {}",
                source_dir.display()
            )));
        }
        if let Some(parent) = archive_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        debug!("Compressing {:?} into {:?}", source_dir, archive_path);
        self.run(&[
            OsStr::new("-czf"),
            archive_path.as_os_str(),
            OsStr::new("-C"),
            source_dir.as_os_str(),
            OsStr::new("."),
        ])?;
        Ok(archive_path.to_path_buf())
    }

    fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dest_dir)?;

        debug!("Extracting {:?} into {:?}", archive_path, dest_dir);
        self.run(&[
            OsStr::new("-xzf"),
            archive_path.as_os_str(),
            OsStr::new("-C"),
            dest_dir.as_os_str(),
        ])?;
        Ok(dest_dir.to_path_buf())
    }
}
