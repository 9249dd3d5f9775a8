//! Filesystem helpers shared by the stash and the orchestrator.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// Replace `path` with `contents` atomically.
///
/// Writes to a temporary file in the same directory, flushes it, then renames
/// it over `path`. Readers see either the old or the new file, never a mix.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
  let dir = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };
  fs::create_dir_all(dir)?;

  let mut temp = NamedTempFile::new_in(dir)?;
  temp.write_all(contents)?;
  temp.as_file().sync_all()?;
  temp.persist(path).map_err(|e| e.error)?;
  Ok(())
}

/// Copy the tree under `src` into `dst`, creating `dst` if needed.
///
/// Regular files are copied byte for byte, symlinks are recreated with the
/// same target. Returns the number of file bytes copied.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<u64> {
  fs::create_dir_all(dst)?;
  let mut bytes = 0;

  for entry in WalkDir::new(src).sort_by_file_name() {
    let entry = entry.map_err(io::Error::other)?;
    let rel = entry.path().strip_prefix(src).map_err(io::Error::other)?;
    if rel.as_os_str().is_empty() {
      continue;
    }
    let target = dst.join(rel);
    let file_type = entry.file_type();

    if file_type.is_symlink() {
      let link_target = fs::read_link(entry.path())?;
      if fs::symlink_metadata(&target).is_ok() {
        fs::remove_file(&target)?;
      }
      copy_symlink(&link_target, &target, entry.path())?;
    } else if file_type.is_dir() {
      fs::create_dir_all(&target)?;
    } else if file_type.is_file() {
      bytes += fs::copy(entry.path(), &target)?;
    }
  }

  Ok(bytes)
}

#[cfg(unix)]
fn copy_symlink(link_target: &Path, target: &Path, _original: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(link_target, target)
}

#[cfg(windows)]
fn copy_symlink(link_target: &Path, target: &Path, original: &Path) -> io::Result<()> {
  if original.is_dir() {
    std::os::windows::fs::symlink_dir(link_target, target)
  } else {
    std::os::windows::fs::symlink_file(link_target, target)
  }
}

/// Total size of regular files under `path`.
pub fn dir_size(path: &Path) -> u64 {
  WalkDir::new(path)
    .into_iter()
    .filter_map(|e| e.ok())
    .filter(|e| e.file_type().is_file())
    .filter_map(|e| e.metadata().ok())
    .map(|m| m.len())
    .sum()
}
