use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fingerprint::Fingerprint;

/// Current on-disk format of a stash root.
pub const STASH_FORMAT_VERSION: u32 = 1;

/// Metadata for one stash entry, stored as `<root>/<hash>/entry.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StashEntry {
  pub hash: Fingerprint,

  /// Step whose outputs were pushed.
  pub step: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,

  /// Seconds since the Unix epoch.
  pub created_at: u64,

  /// Hash of the stored tree, checked on pop.
  pub content_hash: String,

  /// Messages replaced by later pushes of the same hash, oldest first.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub previous_messages: Vec<String>,
}

/// Marker written at the stash root.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StashMarker {
  pub version: u32,
}

/// What a push did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
  /// A new entry was committed.
  Stored(StashEntry),
  /// An entry for this hash already existed; only metadata may have changed.
  Deduplicated(StashEntry),
}

impl PushOutcome {
  pub fn entry(&self) -> &StashEntry {
    match self {
      PushOutcome::Stored(entry) | PushOutcome::Deduplicated(entry) => entry,
    }
  }

  pub fn is_new(&self) -> bool {
    matches!(self, PushOutcome::Stored(_))
  }
}

/// How a popped entry is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PopMode {
  /// Copy the stored tree.
  #[default]
  Copy,
  /// Link to the stored tree in place.
  Link,
}

#[derive(Debug, Error)]
pub enum StashError {
  #[error("stash not found at {path}: {reason}")]
  NotFound { path: PathBuf, reason: String },

  #[error("no stash entry for {0}")]
  Missing(String),

  #[error("hash prefix {prefix} is ambiguous ({count} entries match)")]
  Ambiguous { prefix: String, count: usize },

  #[error("failed to write stash entry {hash}: {source}")]
  Write {
    hash: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to read stash: {0}")]
  Read(#[source] io::Error),

  #[error("invalid metadata for stash entry {hash}: {source}")]
  Metadata {
    hash: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("destination {0} already exists and is not empty")]
  DestinationExists(PathBuf),

  #[error("stash entry {hash} is corrupted: stored tree hashes to {actual}, expected {expected}")]
  Corrupted {
    hash: String,
    expected: String,
    actual: String,
  },
}
