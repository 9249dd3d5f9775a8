//! Directory links.
//!
//! Unix uses symlinks; Windows uses junctions, which need no elevated
//! privileges.

use std::io;
use std::path::Path;

/// Create `link` pointing at the directory `target`, creating parents of
/// `link` as needed.
pub fn link_dir(target: &Path, link: &Path) -> io::Result<()> {
  if let Some(parent) = link.parent() {
    std::fs::create_dir_all(parent)?;
  }
  create(target, link)
}

#[cfg(unix)]
fn create(target: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create(target: &Path, link: &Path) -> io::Result<()> {
  junction::create(target, link)
}

/// True if `path` itself is a symlink or junction, whether or not it resolves.
pub fn is_link(path: &Path) -> bool {
  std::fs::symlink_metadata(path)
    .map(|m| m.file_type().is_symlink() || is_junction(path))
    .unwrap_or(false)
}

#[cfg(windows)]
fn is_junction(path: &Path) -> bool {
  junction::exists(path).unwrap_or(false)
}

#[cfg(not(windows))]
fn is_junction(_path: &Path) -> bool {
  false
}

/// Remove a link without touching what it points to.
pub fn remove_link(path: &Path) -> io::Result<()> {
  #[cfg(windows)]
  if is_junction(path) {
    return junction::delete(path).and_then(|_| std::fs::remove_dir(path));
  }
  std::fs::remove_file(path)
}
