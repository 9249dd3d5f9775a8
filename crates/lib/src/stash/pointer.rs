//! Build directories remember the stash they were linked to.
//!
//! `flowgen stash link` writes a small JSON pointer into the build directory
//! so later stash commands run there find the stash without flags.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Stash, StashError};
use crate::consts::STASH_POINTER_FILENAME;
use crate::platform::fs::write_atomic;

#[derive(Debug, Serialize, Deserialize)]
struct StashPointer {
  stash: PathBuf,
}

/// Record `stash` as the stash for `build_dir`.
pub fn write_pointer(build_dir: &Path, stash: &Stash) -> Result<PathBuf, StashError> {
  let path = build_dir.join(STASH_POINTER_FILENAME);
  let content = serde_json::to_vec_pretty(&StashPointer {
    stash: stash.root().to_path_buf(),
  })
  .map_err(|source| StashError::Metadata {
    hash: STASH_POINTER_FILENAME.into(),
    source,
  })?;

  let write_err = |source| StashError::Write {
    hash: STASH_POINTER_FILENAME.into(),
    source,
  };
  fs::create_dir_all(build_dir).map_err(write_err)?;
  write_atomic(&path, &content).map_err(write_err)?;

  debug!(build_dir = %build_dir.display(), stash = %stash.root().display(), "wrote stash pointer");
  Ok(path)
}

/// The stash root recorded for `build_dir`, if any.
pub fn read_pointer(build_dir: &Path) -> Result<Option<PathBuf>, StashError> {
  let content = match fs::read_to_string(build_dir.join(STASH_POINTER_FILENAME)) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(e) => return Err(StashError::Read(e)),
  };
  let pointer: StashPointer = serde_json::from_str(&content).map_err(|source| StashError::Metadata {
    hash: STASH_POINTER_FILENAME.into(),
    source,
  })?;
  Ok(Some(pointer.stash))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn pointer_round_trip() {
    let stash_dir = tempdir().unwrap();
    let build = tempdir().unwrap();
    let stash = Stash::init(stash_dir.path()).unwrap();

    assert_eq!(read_pointer(build.path()).unwrap(), None);
    write_pointer(&build.path().join("build"), &stash).unwrap();
    assert_eq!(
      read_pointer(&build.path().join("build")).unwrap().as_deref(),
      Some(stash.root())
    );
  }

  #[test]
  fn corrupt_pointer_is_reported() {
    let build = tempdir().unwrap();
    fs::write(build.path().join(STASH_POINTER_FILENAME), "not json").unwrap();
    assert!(matches!(read_pointer(build.path()), Err(StashError::Metadata { .. })));
  }
}
