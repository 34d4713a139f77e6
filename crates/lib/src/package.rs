//! Deployable application packages.
//!
//! A package is a zip archive of a local directory (`wwwroot` by default).
//! Archives are deterministic: entries are sorted by path, timestamps are
//! fixed and permissions normalized, so the same content always produces the
//! same bytes and the same digest.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::util::hash::{ContentHash, hash_bytes};

/// Default package directory, relative to the project directory.
pub const DEFAULT_PACKAGE_DIR: &str = "wwwroot";

#[derive(Debug, Error)]
pub enum PackageError {
  #[error("package directory not found: {0}")]
  NotFound(PathBuf),

  #[error("package directory is not a directory: {0}")]
  NotADirectory(PathBuf),

  #[error("failed to walk {path}: {source}")]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write archive entry {entry}: {source}")]
  Archive {
    entry: String,
    #[source]
    source: zip::result::ZipError,
  },
}

/// What the blob resource records about its source archive.
///
/// Only content-derived fields belong here: the descriptor feeds the blob's
/// input hash, so it must not change when the package directory moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveDescriptor {
  pub sha256: ContentHash,
  /// Archive size in bytes.
  pub size: u64,
  /// Number of files in the archive.
  pub files: usize,
}

/// An in-memory zip archive of a directory.
#[derive(Debug, Clone)]
pub struct FileArchive {
  path: PathBuf,
  bytes: Vec<u8>,
  sha256: ContentHash,
  files: usize,
}

impl FileArchive {
  pub fn from_dir(dir: &Path) -> Result<Self, PackageError> {
    if !dir.exists() {
      return Err(PackageError::NotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
      return Err(PackageError::NotADirectory(dir.to_path_buf()));
    }

    let options = SimpleFileOptions::default()
      .compression_method(CompressionMethod::Deflated)
      .last_modified_time(DateTime::default())
      .unix_permissions(0o644);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut files = 0;

    for entry in WalkDir::new(dir).sort_by_file_name() {
      let entry = entry.map_err(|source| PackageError::Walk {
        path: dir.to_path_buf(),
        source,
      })?;
      let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
      if relative.as_os_str().is_empty() {
        continue;
      }

      // Zip entry names always use forward slashes.
      let name = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

      if entry.file_type().is_dir() {
        writer
          .add_directory(format!("{name}/"), options)
          .map_err(|source| PackageError::Archive { entry: name, source })?;
        continue;
      }

      // Symlinks are followed; special files are skipped.
      if !entry.path().is_file() {
        continue;
      }

      let content = std::fs::read(entry.path()).map_err(|source| PackageError::Read {
        path: entry.path().to_path_buf(),
        source,
      })?;
      writer
        .start_file(name.clone(), options)
        .map_err(|source| PackageError::Archive {
          entry: name.clone(),
          source,
        })?;
      writer.write_all(&content).map_err(|source| PackageError::Archive {
        entry: name,
        source: source.into(),
      })?;
      files += 1;
    }

    let bytes = writer
      .finish()
      .map_err(|source| PackageError::Archive {
        entry: String::new(),
        source,
      })?
      .into_inner();
    let sha256 = hash_bytes(&bytes);
    debug!(path = %dir.display(), files, size = bytes.len(), sha256 = %sha256, "packaged directory");

    Ok(Self {
      path: dir.to_path_buf(),
      bytes,
      sha256,
      files,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn bytes(&self) -> &[u8] {
    &self.bytes
  }

  pub fn sha256(&self) -> &ContentHash {
    &self.sha256
  }

  pub fn size(&self) -> u64 {
    self.bytes.len() as u64
  }

  pub fn file_count(&self) -> usize {
    self.files
  }

  pub fn descriptor(&self) -> ArchiveDescriptor {
    ArchiveDescriptor {
      sha256: self.sha256.clone(),
      size: self.size(),
      files: self.files,
    }
  }
}
