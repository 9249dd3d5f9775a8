//! Moving step outputs between a build directory and a stash.

use std::fs;
use std::io;
use std::path::Path;

use tracing::info;

use super::types::{OrchestratorError, PoppedStep};
use crate::fingerprint::Fingerprint;
use crate::platform::fs::write_atomic;
use crate::platform::link::{is_link, remove_link};
use crate::plan::BuildPlan;
use crate::stash::{PopMode, PushOutcome, Stash};

fn io_err(context: String) -> impl FnOnce(io::Error) -> OrchestratorError {
  move |source| OrchestratorError::Io { context, source }
}

/// Stash the outputs of step `key` (a name or position) under its current
/// fingerprint.
pub fn push_step(
  plan: &BuildPlan,
  build_dir: &Path,
  stash: &Stash,
  key: &str,
  message: Option<&str>,
) -> Result<PushOutcome, OrchestratorError> {
  let step = plan.find(key).ok_or_else(|| OrchestratorError::UnknownStep(key.to_string()))?;
  let outputs = step.outputs_in(build_dir);
  Ok(stash.push(&step.fingerprint, &step.name, &outputs, message)?)
}

/// Materialize stash entry `hash` into the outputs of the step it belongs to.
///
/// The step is the one whose current fingerprint is `hash`, or failing that
/// the step named in the entry. Existing outputs are replaced and the step's
/// stamp is set to `hash`, so status reports the step fresh exactly when the
/// entry matches the current fingerprint.
pub fn pop_entry(
  plan: &BuildPlan,
  build_dir: &Path,
  stash: &Stash,
  hash: &Fingerprint,
  mode: PopMode,
) -> Result<PoppedStep, OrchestratorError> {
  let entry = stash.get(hash)?;
  let step = plan
    .find_by_fingerprint(hash)
    .or_else(|| plan.steps.iter().find(|s| s.name == entry.step))
    .ok_or_else(|| OrchestratorError::UnknownStep(entry.step.clone()))?;

  let outputs = step.outputs_in(build_dir);
  clear_outputs(&outputs)?;
  fs::create_dir_all(step.inputs_in(build_dir))
    .map_err(io_err(format!("failed to create {}", step.inputs_in(build_dir).display())))?;
  if let Some(parent) = outputs.parent() {
    fs::create_dir_all(parent).map_err(io_err(format!("failed to create {}", parent.display())))?;
  }

  let entry = stash.materialize(hash, &outputs, mode)?;

  let stamp = step.stamp_in(build_dir);
  write_atomic(&stamp, format!("{hash}\n").as_bytes())
    .map_err(io_err(format!("failed to write {}", stamp.display())))?;

  info!(step = %step.name, hash = %hash.short(), "restored step outputs from stash");
  Ok(PoppedStep {
    step: step.name.clone(),
    outputs,
    entry,
    mode,
  })
}

fn clear_outputs(outputs: &Path) -> Result<(), OrchestratorError> {
  let context = format!("failed to clear {}", outputs.display());
  if is_link(outputs) {
    remove_link(outputs).map_err(io_err(context))
  } else if outputs.is_dir() {
    fs::remove_dir_all(outputs).map_err(io_err(context))
  } else {
    Ok(())
  }
}
