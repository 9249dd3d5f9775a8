//! The resolved, ordered view of a graph that backends and views consume.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::consts::{STAMP_FILENAME, STEP_INPUTS_DIR, STEP_OUTPUTS_DIR};
use crate::fingerprint::Fingerprint;
use crate::graph::CommandSpec;

/// A direct upstream step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamRef {
  pub name: String,
  pub dir: String,
}

/// One bound input port: `inputs/<port>` links to `<from_dir>/outputs/<from_port>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputLink {
  pub port: String,
  pub from_dir: String,
  pub from_port: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedStep {
  /// Zero-based position in topological order.
  pub position: usize,
  pub name: String,
  /// Step directory relative to the build directory, `<position>-<name>`.
  pub dir: String,
  pub command: CommandSpec,
  pub upstream: Vec<UpstreamRef>,
  pub inputs: Vec<InputLink>,
  pub outputs: Vec<String>,
  pub fingerprint: Fingerprint,
}

impl PlannedStep {
  pub fn dir_name(position: usize, name: &str) -> String {
    format!("{position}-{name}")
  }

  /// Stamp path relative to the build directory, with `/` separators.
  pub fn stamp(&self) -> String {
    format!("{}/{}", self.dir, STAMP_FILENAME)
  }

  pub fn dir_in(&self, build_dir: &Path) -> PathBuf {
    build_dir.join(&self.dir)
  }

  pub fn stamp_in(&self, build_dir: &Path) -> PathBuf {
    self.dir_in(build_dir).join(STAMP_FILENAME)
  }

  pub fn inputs_in(&self, build_dir: &Path) -> PathBuf {
    self.dir_in(build_dir).join(STEP_INPUTS_DIR)
  }

  pub fn outputs_in(&self, build_dir: &Path) -> PathBuf {
    self.dir_in(build_dir).join(STEP_OUTPUTS_DIR)
  }
}

/// Steps in topological order with everything needed to emit or inspect them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildPlan {
  pub steps: Vec<PlannedStep>,
}

impl BuildPlan {
  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  /// Look a step up by name, or by its position when `key` is a number.
  pub fn find(&self, key: &str) -> Option<&PlannedStep> {
    self.steps.iter().find(|s| s.name == key).or_else(|| {
      let position: usize = key.parse().ok()?;
      self.steps.get(position)
    })
  }

  pub fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Option<&PlannedStep> {
    self.steps.iter().find(|s| &s.fingerprint == fingerprint)
  }
}
