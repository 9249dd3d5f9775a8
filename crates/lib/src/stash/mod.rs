//! Content-addressed stash of step outputs.
//!
//! Entries are keyed by step fingerprint, so two pushes of the same
//! fingerprint always describe the same content and the second one is a
//! no-op apart from metadata.
//!
//! # Layout
//!
//! ```text
//! <root>/
//! ├── .flowgen-stash.json      # format marker
//! ├── .staging/                # private per-operation scratch directories
//! └── <fingerprint>/
//!     ├── entry.json           # StashEntry metadata
//!     └── outputs/             # stored tree
//! ```
//!
//! # Concurrency
//!
//! Several processes may share a stash. Every mutation is prepared inside
//! `.staging/` and becomes visible through a single `rename`:
//! - push copies into a staging directory, then renames it to `<fingerprint>`
//! - drop renames `<fingerprint>` into staging, then deletes it
//! - metadata updates replace `entry.json` through a temp file and rename
//!
//! A reader therefore only ever sees complete entries. Two concurrent pushes
//! of one fingerprint race on the final rename; the loser discards its copy.

pub mod pointer;
mod types;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::fingerprint::{Fingerprint, is_lower_hex};
use crate::platform::fs::{copy_tree, write_atomic};
use crate::platform::link::{is_link, link_dir, remove_link};
use crate::util::hash::hash_tree;

pub use types::{PopMode, PushOutcome, STASH_FORMAT_VERSION, StashEntry, StashError};
use types::StashMarker;

const MARKER_FILENAME: &str = ".flowgen-stash.json";
const STAGING_DIR: &str = ".staging";
const ENTRY_FILENAME: &str = "entry.json";
const OUTPUTS_DIR: &str = "outputs";

/// Handle on a stash root directory.
#[derive(Debug, Clone)]
pub struct Stash {
  root: PathBuf,
}

impl Stash {
  /// Create a stash at `path`, or adopt the directory if it already exists.
  pub fn init(path: &Path) -> Result<Self, StashError> {
    let not_found = |e: io::Error| StashError::NotFound {
      path: path.to_path_buf(),
      reason: e.to_string(),
    };

    fs::create_dir_all(path).map_err(not_found)?;
    let root = dunce::canonicalize(path).map_err(not_found)?;

    if root.join(MARKER_FILENAME).exists() {
      debug!(root = %root.display(), "adopting existing stash");
      return Self::open(&root);
    }

    let marker = serde_json::to_vec_pretty(&StashMarker {
      version: STASH_FORMAT_VERSION,
    })
    .map_err(|source| StashError::Metadata {
      hash: MARKER_FILENAME.into(),
      source,
    })?;
    write_atomic(&root.join(MARKER_FILENAME), &marker).map_err(|source| StashError::Write {
      hash: MARKER_FILENAME.into(),
      source,
    })?;

    info!(root = %root.display(), "initialized stash");
    Ok(Self { root })
  }

  /// Open an existing stash.
  pub fn open(path: &Path) -> Result<Self, StashError> {
    let not_found = |reason: String| StashError::NotFound {
      path: path.to_path_buf(),
      reason,
    };

    let root = dunce::canonicalize(path).map_err(|e| not_found(e.to_string()))?;
    let content = fs::read_to_string(root.join(MARKER_FILENAME))
      .map_err(|_| not_found(format!("missing {MARKER_FILENAME} marker")))?;
    let marker: StashMarker = serde_json::from_str(&content).map_err(|source| StashError::Metadata {
      hash: MARKER_FILENAME.into(),
      source,
    })?;
    if marker.version != STASH_FORMAT_VERSION {
      return Err(not_found(format!("unsupported stash format version {}", marker.version)));
    }

    Ok(Self { root })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn entry_dir(&self, hash: &Fingerprint) -> PathBuf {
    self.root.join(hash.as_str())
  }

  /// Path of the stored tree for `hash`, whether or not it exists.
  pub fn outputs_path(&self, hash: &Fingerprint) -> PathBuf {
    self.entry_dir(hash).join(OUTPUTS_DIR)
  }

  pub fn contains(&self, hash: &Fingerprint) -> bool {
    self.entry_dir(hash).join(ENTRY_FILENAME).is_file()
  }

  /// Metadata for `hash`.
  pub fn get(&self, hash: &Fingerprint) -> Result<StashEntry, StashError> {
    let path = self.entry_dir(hash).join(ENTRY_FILENAME);
    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StashError::Missing(hash.to_string())),
      Err(e) => return Err(StashError::Read(e)),
    };
    serde_json::from_str(&content).map_err(|source| StashError::Metadata {
      hash: hash.to_string(),
      source,
    })
  }

  /// Expand a hash prefix to the one stored fingerprint it names.
  pub fn resolve(&self, prefix: &str) -> Result<Fingerprint, StashError> {
    if !is_lower_hex(prefix) {
      return Err(StashError::Missing(prefix.to_string()));
    }
    if let Ok(hash) = Fingerprint::parse(prefix) {
      return if self.contains(&hash) {
        Ok(hash)
      } else {
        Err(StashError::Missing(prefix.to_string()))
      };
    }

    let mut matches: Vec<Fingerprint> = self
      .entry_hashes()?
      .into_iter()
      .filter(|hash| hash.as_str().starts_with(prefix))
      .collect();

    match matches.len() {
      0 => Err(StashError::Missing(prefix.to_string())),
      1 => Ok(matches.remove(0)),
      count => Err(StashError::Ambiguous {
        prefix: prefix.to_string(),
        count,
      }),
    }
  }

  /// Store the tree under `source_dir` as the outputs of `step`.
  ///
  /// If `hash` is already stored nothing is copied; a differing `message`
  /// replaces the recorded one and the old message moves to
  /// `previous_messages`.
  pub fn push(
    &self,
    hash: &Fingerprint,
    step: &str,
    source_dir: &Path,
    message: Option<&str>,
  ) -> Result<PushOutcome, StashError> {
    let write_err = |source: io::Error| StashError::Write {
      hash: hash.to_string(),
      source,
    };

    if !source_dir.is_dir() {
      return Err(write_err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("source directory {} does not exist", source_dir.display()),
      )));
    }

    if self.contains(hash) {
      debug!(hash = %hash.short(), step, "entry already stashed");
      return self.annotate(hash, message).map(PushOutcome::Deduplicated);
    }

    let staging = self.staging(&format!("push-{}-", hash.short()))?;
    let staged_outputs = staging.path().join(OUTPUTS_DIR);
    let bytes = copy_tree(source_dir, &staged_outputs).map_err(write_err)?;
    let content_hash = hash_tree(&staged_outputs).map_err(|e| write_err(io::Error::other(e)))?;

    let entry = StashEntry {
      hash: hash.clone(),
      step: step.to_string(),
      message: message.map(str::to_string),
      created_at: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs(),
      content_hash: content_hash.0,
      previous_messages: Vec::new(),
    };
    self.write_entry(&staging.path().join(ENTRY_FILENAME), &entry)?;

    match fs::rename(staging.path(), self.entry_dir(hash)) {
      Ok(()) => {
        info!(hash = %hash.short(), step, bytes, "stashed step outputs");
        Ok(PushOutcome::Stored(entry))
      }
      Err(_) if self.contains(hash) => {
        debug!(hash = %hash.short(), "concurrent push won the race, discarding staged copy");
        self.annotate(hash, message).map(PushOutcome::Deduplicated)
      }
      Err(e) => Err(write_err(e)),
    }
  }

  /// Materialize entry `hash` at `dest` by copy or link.
  pub fn materialize(&self, hash: &Fingerprint, dest: &Path, mode: PopMode) -> Result<StashEntry, StashError> {
    match mode {
      PopMode::Copy => self.pop(hash, dest),
      PopMode::Link => self.link(hash, dest),
    }
  }

  /// Copy entry `hash` into `dest`.
  pub fn pop(&self, hash: &Fingerprint, dest: &Path) -> Result<StashEntry, StashError> {
    let entry = self.get(hash)?;
    let stored = self.outputs_path(hash);
    self.verify(&entry, &stored)?;

    let write_err = |source: io::Error| StashError::Write {
      hash: hash.to_string(),
      source,
    };
    if is_link(dest) {
      remove_link(dest).map_err(write_err)?;
    }
    let bytes = copy_tree(&stored, dest).map_err(write_err)?;

    info!(hash = %hash.short(), dest = %dest.display(), bytes, "popped stash entry");
    Ok(entry)
  }

  /// Link `dest` to the stored tree of entry `hash`.
  ///
  /// An existing link or empty directory at `dest` is replaced; anything
  /// else is left alone and reported as `DestinationExists`.
  pub fn link(&self, hash: &Fingerprint, dest: &Path) -> Result<StashEntry, StashError> {
    let entry = self.get(hash)?;
    let stored = self.outputs_path(hash);
    self.verify(&entry, &stored)?;

    let write_err = |source: io::Error| StashError::Write {
      hash: hash.to_string(),
      source,
    };
    if is_link(dest) {
      remove_link(dest).map_err(write_err)?;
    } else if dest.exists() {
      let empty = fs::read_dir(dest).map_err(write_err)?.next().is_none();
      if !empty {
        return Err(StashError::DestinationExists(dest.to_path_buf()));
      }
      fs::remove_dir(dest).map_err(write_err)?;
    }
    link_dir(&stored, dest).map_err(write_err)?;

    info!(hash = %hash.short(), dest = %dest.display(), "linked stash entry");
    Ok(entry)
  }

  /// Remove entry `hash`.
  pub fn drop(&self, hash: &Fingerprint) -> Result<StashEntry, StashError> {
    let entry = self.get(hash)?;
    let write_err = |source: io::Error| StashError::Write {
      hash: hash.to_string(),
      source,
    };

    let graveyard = self.staging("drop-")?;
    match fs::rename(self.entry_dir(hash), graveyard.path().join(hash.as_str())) {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StashError::Missing(hash.to_string())),
      Err(e) => return Err(write_err(e)),
    }
    graveyard.close().map_err(write_err)?;

    info!(hash = %hash.short(), step = %entry.step, "dropped stash entry");
    Ok(entry)
  }

  /// All committed entries, oldest first.
  pub fn status(&self) -> Result<Vec<StashEntry>, StashError> {
    let mut entries = Vec::new();
    for hash in self.entry_hashes()? {
      match self.get(&hash) {
        Ok(entry) => entries.push(entry),
        Err(e) => warn!(hash = %hash.short(), error = %e, "skipping unreadable stash entry"),
      }
    }
    entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.hash.cmp(&b.hash)));
    Ok(entries)
  }

  fn entry_hashes(&self) -> Result<Vec<Fingerprint>, StashError> {
    let mut hashes = Vec::new();
    for dirent in fs::read_dir(&self.root).map_err(StashError::Read)?.flatten() {
      let name = dirent.file_name();
      let Some(name) = name.to_str() else {
        continue;
      };
      if name.starts_with('.') {
        continue;
      }
      match Fingerprint::parse(name) {
        Ok(hash) => hashes.push(hash),
        Err(_) => debug!(name, "ignoring foreign directory in stash root"),
      }
    }
    hashes.sort();
    Ok(hashes)
  }

  fn staging(&self, prefix: &str) -> Result<TempDir, StashError> {
    let write_err = |source: io::Error| StashError::Write {
      hash: prefix.trim_end_matches('-').to_string(),
      source,
    };
    let dir = self.root.join(STAGING_DIR);
    fs::create_dir_all(&dir).map_err(write_err)?;
    tempfile::Builder::new().prefix(prefix).tempdir_in(&dir).map_err(write_err)
  }

  fn annotate(&self, hash: &Fingerprint, message: Option<&str>) -> Result<StashEntry, StashError> {
    let mut entry = self.get(hash)?;
    if let Some(message) = message
      && entry.message.as_deref() != Some(message)
    {
      if let Some(old) = entry.message.replace(message.to_string()) {
        entry.previous_messages.push(old);
      }
      self.write_entry(&self.entry_dir(hash).join(ENTRY_FILENAME), &entry)?;
      debug!(hash = %hash.short(), "updated stash entry message");
    }
    Ok(entry)
  }

  fn write_entry(&self, path: &Path, entry: &StashEntry) -> Result<(), StashError> {
    let content = serde_json::to_vec_pretty(entry).map_err(|source| StashError::Metadata {
      hash: entry.hash.to_string(),
      source,
    })?;
    write_atomic(path, &content).map_err(|source| StashError::Write {
      hash: entry.hash.to_string(),
      source,
    })
  }

  /// Fail unless the stored tree still hashes to the value recorded at push.
  fn verify(&self, entry: &StashEntry, stored: &Path) -> Result<(), StashError> {
    let actual = hash_tree(stored).map_err(|e| StashError::Read(io::Error::other(e)))?;
    if actual.0 != entry.content_hash {
      warn!(
        hash = %entry.hash.short(),
        expected = %entry.content_hash,
        actual = %actual,
        "stash entry content does not match its recorded hash"
      );
      return Err(StashError::Corrupted {
        hash: entry.hash.to_string(),
        expected: entry.content_hash.clone(),
        actual: actual.0,
      });
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::hash::hash_tree;
  use tempfile::tempdir;
  use tracing_test::traced_test;

  fn fp(seed: &str) -> Fingerprint {
    Fingerprint::of_bytes(seed.as_bytes())
  }

  fn sample_outputs(root: &Path) -> PathBuf {
    let dir = root.join("outputs");
    fs::create_dir_all(dir.join("reports")).unwrap();
    fs::write(dir.join("netlist.v"), "module top; endmodule\n").unwrap();
    fs::write(dir.join("reports/area.rpt"), [1u8, 2, 3, 0, 255]).unwrap();
    dir
  }

  fn committed_dirs(stash: &Stash) -> usize {
    fs::read_dir(stash.root())
      .unwrap()
      .flatten()
      .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
      .count()
  }

  #[test]
  fn init_creates_missing_root() {
    let temp = tempdir().unwrap();
    let stash = Stash::init(&temp.path().join("shared/stash")).unwrap();
    assert!(stash.root().join(MARKER_FILENAME).exists());
    assert!(stash.status().unwrap().is_empty());
  }

  #[test]
  fn init_adopts_existing_stash() {
    let temp = tempdir().unwrap();
    let work = tempdir().unwrap();
    let first = Stash::init(temp.path()).unwrap();
    let source = sample_outputs(work.path());
    first.push(&fp("a"), "synth", &source, None).unwrap();

    let second = Stash::init(temp.path()).unwrap();
    assert_eq!(second.status().unwrap().len(), 1);
  }

  #[cfg(unix)]
  #[test]
  fn init_fails_when_path_cannot_be_created() {
    let temp = tempdir().unwrap();
    let file = temp.path().join("plain-file");
    fs::write(&file, "x").unwrap();
    let err = Stash::init(&file.join("stash")).unwrap_err();
    assert!(matches!(err, StashError::NotFound { .. }));
  }

  #[test]
  fn open_requires_marker() {
    let temp = tempdir().unwrap();
    assert!(matches!(Stash::open(temp.path()), Err(StashError::NotFound { .. })));
    assert!(matches!(
      Stash::open(&temp.path().join("missing")),
      Err(StashError::NotFound { .. })
    ));

    Stash::init(temp.path()).unwrap();
    Stash::open(temp.path()).unwrap();
  }

  #[test]
  fn push_then_pop_round_trips_bytes() {
    let stash_dir = tempdir().unwrap();
    let work = tempdir().unwrap();
    let stash = Stash::init(stash_dir.path()).unwrap();
    let source = sample_outputs(work.path());
    let hash = fp("synth-v1");

    let outcome = stash.push(&hash, "synth", &source, Some("golden run")).unwrap();
    assert!(outcome.is_new());
    assert_eq!(outcome.entry().step, "synth");
    assert_eq!(outcome.entry().message.as_deref(), Some("golden run"));

    let dest = work.path().join("restored");
    let entry = stash.pop(&hash, &dest).unwrap();
    assert_eq!(entry.hash, hash);
    assert_eq!(fs::read(dest.join("netlist.v")).unwrap(), fs::read(source.join("netlist.v")).unwrap());
    assert_eq!(
      fs::read(dest.join("reports/area.rpt")).unwrap(),
      vec![1u8, 2, 3, 0, 255]
    );
    assert_eq!(hash_tree(&dest).unwrap(), hash_tree(&source).unwrap());
  }

  #[test]
  fn push_is_idempotent() {
    let stash_dir = tempdir().unwrap();
    let work = tempdir().unwrap();
    let stash = Stash::init(stash_dir.path()).unwrap();
    let source = sample_outputs(work.path());
    let hash = fp("same");

    assert!(stash.push(&hash, "synth", &source, None).unwrap().is_new());
    let second = stash.push(&hash, "synth", &source, None).unwrap();
    assert!(!second.is_new());

    assert_eq!(committed_dirs(&stash), 1);
    assert_eq!(stash.status().unwrap().len(), 1);
  }

  #[test]
  fn repeated_push_updates_message_only() {
    let stash_dir = tempdir().unwrap();
    let work = tempdir().unwrap();
    let stash = Stash::init(stash_dir.path()).unwrap();
    let source = sample_outputs(work.path());
    let hash = fp("msg");

    stash.push(&hash, "synth", &source, Some("first")).unwrap();
    fs::write(source.join("netlist.v"), "changed after push").unwrap();
    let outcome = stash.push(&hash, "synth", &source, Some("second")).unwrap();

    let entry = outcome.entry();
    assert_eq!(entry.message.as_deref(), Some("second"));
    assert_eq!(entry.previous_messages, vec!["first".to_string()]);
    // content was not rewritten
    assert_eq!(
      fs::read_to_string(stash.outputs_path(&hash).join("netlist.v")).unwrap(),
      "module top; endmodule\n"
    );
    assert_eq!(stash.get(&hash).unwrap(), entry.clone());
  }

  #[test]
  fn push_missing_source_leaves_nothing() {
    let stash_dir = tempdir().unwrap();
    let stash = Stash::init(stash_dir.path()).unwrap();
    let err = stash
      .push(&fp("x"), "synth", &stash_dir.path().join("nope"), None)
      .unwrap_err();
    assert!(matches!(err, StashError::Write { .. }));
    assert_eq!(committed_dirs(&stash), 0);
    assert!(!stash.contains(&fp("x")));
  }

  #[test]
  fn staging_is_cleaned_after_push() {
    let stash_dir = tempdir().unwrap();
    let work = tempdir().unwrap();
    let stash = Stash::init(stash_dir.path()).unwrap();
    stash.push(&fp("a"), "a", &sample_outputs(work.path()), None).unwrap();

    let leftovers = fs::read_dir(stash.root().join(STAGING_DIR)).unwrap().count();
    assert_eq!(leftovers, 0);
  }

  #[test]
  fn missing_hash_fails_without_side_effects() {
    let stash_dir = tempdir().unwrap();
    let work = tempdir().unwrap();
    let stash = Stash::init(stash_dir.path()).unwrap();
    stash.push(&fp("kept"), "a", &sample_outputs(work.path()), None).unwrap();

    let absent = fp("absent");
    assert!(matches!(stash.pop(&absent, &work.path().join("d")), Err(StashError::Missing(_))));
    assert!(matches!(stash.drop(&absent), Err(StashError::Missing(_))));
    assert!(!work.path().join("d").exists());
    assert_eq!(stash.status().unwrap().len(), 1);
  }

  #[test]
  fn drop_removes_entry() {
    let stash_dir = tempdir().unwrap();
    let work = tempdir().unwrap();
    let stash = Stash::init(stash_dir.path()).unwrap();
    let hash = fp("gone");
    stash.push(&hash, "a", &sample_outputs(work.path()), None).unwrap();

    let dropped = stash.drop(&hash).unwrap();
    assert_eq!(dropped.hash, hash);
    assert!(!stash.contains(&hash));
    assert_eq!(committed_dirs(&stash), 0);
    assert!(matches!(stash.drop(&hash), Err(StashError::Missing(_))));
  }

  #[test]
  fn link_points_into_stash() {
    let stash_dir = tempdir().unwrap();
    let work = tempdir().unwrap();
    let stash = Stash::init(stash_dir.path()).unwrap();
    let hash = fp("linked");
    stash.push(&hash, "a", &sample_outputs(work.path()), None).unwrap();

    let dest = work.path().join("step/outputs");
    fs::create_dir_all(&dest).unwrap();
    stash.link(&hash, &dest).unwrap();
    assert!(is_link(&dest));
    assert!(dest.join("netlist.v").exists());

    // relinking replaces the link
    stash.link(&hash, &dest).unwrap();
    assert!(is_link(&dest));
  }

  #[test]
  fn link_refuses_populated_destination() {
    let stash_dir = tempdir().unwrap();
    let work = tempdir().unwrap();
    let stash = Stash::init(stash_dir.path()).unwrap();
    let hash = fp("busy");
    stash.push(&hash, "a", &sample_outputs(work.path()), None).unwrap();

    let dest = work.path().join("busy");
    fs::create_dir_all(&dest).unwrap();
    fs::write(dest.join("keep.txt"), "mine").unwrap();
    assert!(matches!(stash.link(&hash, &dest), Err(StashError::DestinationExists(_))));
    assert_eq!(fs::read_to_string(dest.join("keep.txt")).unwrap(), "mine");
  }

  #[test]
  #[traced_test]
  fn tampered_entry_is_not_restored() {
    let stash_dir = tempdir().unwrap();
    let work = tempdir().unwrap();
    let stash = Stash::init(stash_dir.path()).unwrap();
    let hash = fp("tampered");
    stash.push(&hash, "a", &sample_outputs(work.path()), None).unwrap();

    fs::write(stash.outputs_path(&hash).join("netlist.v"), "overwritten\n").unwrap();

    let copied = work.path().join("copied");
    assert!(matches!(stash.pop(&hash, &copied), Err(StashError::Corrupted { .. })));
    assert!(!copied.exists());

    let linked = work.path().join("linked");
    assert!(matches!(stash.link(&hash, &linked), Err(StashError::Corrupted { .. })));
    assert!(!linked.exists());
    assert!(logs_contain("does not match its recorded hash"));
  }

  #[test]
  fn status_lists_entries_and_skips_foreign_dirs() {
    let stash_dir = tempdir().unwrap();
    let work = tempdir().unwrap();
    let stash = Stash::init(stash_dir.path()).unwrap();
    let source = sample_outputs(work.path());
    stash.push(&fp("one"), "synth", &source, Some("m1")).unwrap();
    stash.push(&fp("two"), "pnr", &source, None).unwrap();
    fs::create_dir(stash.root().join("not-a-hash")).unwrap();

    let entries = stash.status().unwrap();
    assert_eq!(entries.len(), 2);
    let steps: Vec<_> = entries.iter().map(|e| e.step.as_str()).collect();
    assert!(steps.contains(&"synth"));
    assert!(steps.contains(&"pnr"));
    assert!(entries.iter().all(|e| e.created_at > 0));
  }

  #[test]
  #[traced_test]
  fn status_skips_unreadable_entries() {
    let stash_dir = tempdir().unwrap();
    let work = tempdir().unwrap();
    let stash = Stash::init(stash_dir.path()).unwrap();
    stash.push(&fp("good"), "a", &sample_outputs(work.path()), None).unwrap();

    let broken = stash.root().join(fp("broken").as_str());
    fs::create_dir_all(&broken).unwrap();
    fs::write(broken.join(ENTRY_FILENAME), "{not json").unwrap();

    let entries = stash.status().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].step, "a");
    assert!(logs_contain("skipping unreadable stash entry"));
  }

  #[test]
  fn resolve_prefix() {
    let stash_dir = tempdir().unwrap();
    let work = tempdir().unwrap();
    let stash = Stash::init(stash_dir.path()).unwrap();
    let hash = fp("resolve-me");
    stash.push(&hash, "a", &sample_outputs(work.path()), None).unwrap();

    assert_eq!(stash.resolve(hash.short()).unwrap(), hash);
    assert_eq!(stash.resolve(hash.as_str()).unwrap(), hash);
    assert!(matches!(stash.resolve("zz"), Err(StashError::Missing(_))));
    assert!(matches!(stash.resolve(&"0".repeat(64)), Err(StashError::Missing(_))));
  }

  #[test]
  fn resolve_reports_ambiguity() {
    let stash_dir = tempdir().unwrap();
    let work = tempdir().unwrap();
    let stash = Stash::init(stash_dir.path()).unwrap();
    let source = sample_outputs(work.path());

    // 17 entries guarantee two share a leading hex digit
    let hashes: Vec<_> = (0..17).map(|i| fp(&format!("entry-{i}"))).collect();
    for hash in &hashes {
      stash.push(hash, "a", &source, None).unwrap();
    }
    let mut digits: Vec<char> = hashes.iter().map(|h| h.as_str().chars().next().unwrap()).collect();
    digits.sort_unstable();
    let shared = digits.windows(2).find(|w| w[0] == w[1]).map(|w| w[0]).unwrap();

    let err = stash.resolve(&shared.to_string()).unwrap_err();
    assert!(matches!(err, StashError::Ambiguous { count, .. } if count >= 2));
  }

  #[test]
  fn concurrent_pushes_converge() {
    let stash_dir = tempdir().unwrap();
    let work = tempdir().unwrap();
    let stash = Stash::init(stash_dir.path()).unwrap();
    let source = sample_outputs(work.path());
    let hash = fp("race");

    std::thread::scope(|scope| {
      for i in 0..8 {
        let stash = stash.clone();
        let source = source.clone();
        let hash = hash.clone();
        scope.spawn(move || {
          let message = format!("worker {i}");
          stash.push(&hash, "synth", &source, Some(message.as_str())).unwrap();
        });
      }
    });

    assert_eq!(committed_dirs(&stash), 1);
    let entry = stash.get(&hash).unwrap();
    assert_eq!(hash_tree(&stash.outputs_path(&hash)).unwrap().0, entry.content_hash);
    assert_eq!(fs::read_dir(stash.root().join(STAGING_DIR)).unwrap().count(), 0);
  }
}
