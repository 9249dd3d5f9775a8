use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::backend::{BackendError, BackendKind};
use crate::fingerprint::{Fingerprint, FingerprintError};
use crate::graph::GraphError;
use crate::plan::BuildPlan;
use crate::stash::{PopMode, StashEntry, StashError};

#[derive(Debug, Error)]
pub enum OrchestratorError {
  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error(transparent)]
  Fingerprint(#[from] FingerprintError),

  #[error("failed to emit step {step}: {source}")]
  Emit {
    step: String,
    #[source]
    source: BackendError,
  },

  #[error(transparent)]
  Backend(#[from] BackendError),

  #[error("failed to write {path}: {source}")]
  Commit {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("no step named {0}")]
  UnknownStep(String),

  #[error(transparent)]
  Stash(#[from] StashError),

  #[error("{context}: {source}")]
  Io {
    context: String,
    #[source]
    source: io::Error,
  },
}

/// Result of a successful build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
  /// The committed build description.
  pub path: PathBuf,
  pub backend: BackendKind,
  pub plan: BuildPlan,
}

/// A row of the list view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListEntry {
  pub position: usize,
  pub name: String,
  pub fingerprint: Fingerprint,
  pub upstream: Vec<String>,
}

/// Freshness of one step directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
  /// The stamp holds the current fingerprint.
  UpToDate,
  /// The stamp holds some other fingerprint.
  Stale,
  /// No stamp.
  NotBuilt,
}

impl StepState {
  pub fn is_fresh(self) -> bool {
    self == StepState::UpToDate
  }
}

impl fmt::Display for StepState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StepState::UpToDate => write!(f, "up to date"),
      StepState::Stale => write!(f, "needs rebuild"),
      StepState::NotBuilt => write!(f, "not built"),
    }
  }
}

/// A row of the status view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
  pub position: usize,
  pub name: String,
  pub fingerprint: Fingerprint,
  pub state: StepState,
  /// A stash holds outputs for the current fingerprint.
  pub stashed: bool,
}

/// Where a stash entry was materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoppedStep {
  pub step: String,
  pub outputs: PathBuf,
  pub entry: StashEntry,
  pub mode: PopMode,
}
