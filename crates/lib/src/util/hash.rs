//! Content hashing for directory trees.
//!
//! Stash entries record a [`ContentHash`] of their stored tree so a later pop
//! can detect entries that were modified or truncated on disk.

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// A full 64-character SHA-256 over file contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, thiserror::Error)]
pub enum TreeHashError {
  #[error("failed to walk {path}: {message}")]
  Walk { path: String, message: String },

  #[error("failed to read {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

/// Hash a directory tree.
///
/// Covers relative paths, file contents and symlink targets; timestamps and
/// permissions are ignored. Entries are visited in file-name order so the
/// result does not depend on the filesystem's listing order.
pub fn hash_tree(root: &Path) -> Result<ContentHash, TreeHashError> {
  let mut hasher = Sha256::new();

  for entry in WalkDir::new(root).sort_by_file_name() {
    let entry = entry.map_err(|e| TreeHashError::Walk {
      path: root.display().to_string(),
      message: e.to_string(),
    })?;

    let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
    if rel.as_os_str().is_empty() {
      continue;
    }
    let rel = rel.to_string_lossy().replace('\\', "/");

    let file_type = entry.file_type();
    let line = if file_type.is_symlink() {
      let target = fs::read_link(entry.path()).map_err(|source| TreeHashError::Read {
        path: entry.path().display().to_string(),
        source,
      })?;
      format!("L:{}:{}", rel, hash_bytes(target.to_string_lossy().as_bytes()))
    } else if file_type.is_dir() {
      format!("D:{}", rel)
    } else if file_type.is_file() {
      format!("F:{}:{}", rel, hash_file(entry.path())?)
    } else {
      // sockets, devices
      continue;
    };

    hasher.update(line.as_bytes());
    hasher.update(b"\n");
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash one file's contents.
pub fn hash_file(path: &Path) -> Result<ContentHash, TreeHashError> {
  let read_err = |source| TreeHashError::Read {
    path: path.display().to_string(),
    source,
  };

  let mut file = fs::File::open(path).map_err(read_err)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let n = file.read(&mut buffer).map_err(read_err)?;
    if n == 0 {
      break;
    }
    hasher.update(&buffer[..n]);
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

pub fn hash_bytes(data: &[u8]) -> ContentHash {
  ContentHash(hex::encode(Sha256::digest(data)))
}
