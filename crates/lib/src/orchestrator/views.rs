//! Native list and status views over a plan.

use std::fs;
use std::path::Path;

use tracing::debug;

use super::types::{ListEntry, StatusEntry, StepState};
use crate::plan::{BuildPlan, PlannedStep};
use crate::stash::Stash;

pub fn list(plan: &BuildPlan) -> Vec<ListEntry> {
  plan
    .steps
    .iter()
    .map(|step| ListEntry {
      position: step.position,
      name: step.name.clone(),
      fingerprint: step.fingerprint.clone(),
      upstream: step.upstream.iter().map(|u| u.name.clone()).collect(),
    })
    .collect()
}

/// Compare every step's stamp under `build_dir` with its current fingerprint.
pub fn status(plan: &BuildPlan, build_dir: &Path, stash: Option<&Stash>) -> Vec<StatusEntry> {
  plan
    .steps
    .iter()
    .map(|step| StatusEntry {
      position: step.position,
      name: step.name.clone(),
      fingerprint: step.fingerprint.clone(),
      state: step_state(step, build_dir),
      stashed: stash.is_some_and(|s| s.contains(&step.fingerprint)),
    })
    .collect()
}

fn step_state(step: &PlannedStep, build_dir: &Path) -> StepState {
  match fs::read_to_string(step.stamp_in(build_dir)) {
    Ok(stamp) if stamp.trim() == step.fingerprint.as_str() => StepState::UpToDate,
    Ok(stamp) => {
      debug!(step = %step.name, recorded = %stamp.trim(), current = %step.fingerprint, "stale stamp");
      StepState::Stale
    }
    Err(_) => StepState::NotBuilt,
  }
}
