//! Build-description backends.
//!
//! A backend turns a [`BuildPlan`] into the text of a native build file. The
//! set of backends is closed: [`BackendKind`] names them and [`Backend`]
//! dispatches to the concrete [`Emitter`].
//!
//! Every step becomes one rule whose target is the step's stamp file and
//! whose prerequisites are exactly the stamps of its direct upstream steps.
//! The rule action is the same shell script for both backends (see
//! [`step_script`]):
//!
//! ```text
//! if [ -L 1-b/outputs ]; then rm 1-b/outputs; fi
//! mkdir -p 1-b/inputs 1-b/outputs
//! ln -sfn ../../0-a/outputs/o 1-b/inputs/i
//! printf '%s\n' '<line 1>' '<line 2>' > 1-b/run.sh
//! (cd 1-b && sh -e run.sh)
//! echo <fingerprint> > 1-b/.stamp
//! ```
//!
//! Command lines are copied verbatim into `run.sh`, one per line, so comments,
//! continuations and trailing `;` or `&` keep their shell meaning. An
//! `outputs` link left by `flowgen stash pop --symlink` points into the stash
//! and is detached before the step runs.

mod make;
mod ninja;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use make::MakeBackend;
pub use ninja::NinjaBackend;

use crate::consts::{STEP_INPUTS_DIR, STEP_OUTPUTS_DIR, STEP_SCRIPT_FILENAME};
use crate::plan::PlannedStep;

/// Target names every generated file defines itself.
pub const RESERVED_TARGETS: &[&str] = &["all", "list", "status", "clean", "FORCE"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackendError {
  #[error("unsupported backend {0:?}: expected one of make, ninja")]
  Unsupported(String),

  #[error("step {0} was already emitted")]
  AlreadyEmitted(String),

  #[error("build description was already finalized")]
  Finalized,

  #[error("cannot emit step {step}: {reason}")]
  Format { step: String, reason: String },

  #[error("step name {0} collides with a generated target")]
  ReservedTarget(String),
}

/// Supported build-file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
  #[default]
  Make,
  Ninja,
}

impl BackendKind {
  pub fn file_name(self) -> &'static str {
    match self {
      BackendKind::Make => "Makefile",
      BackendKind::Ninja => "build.ninja",
    }
  }
}

impl fmt::Display for BackendKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BackendKind::Make => write!(f, "make"),
      BackendKind::Ninja => write!(f, "ninja"),
    }
  }
}

impl FromStr for BackendKind {
  type Err = BackendError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "make" | "makefile" => Ok(BackendKind::Make),
      "ninja" => Ok(BackendKind::Ninja),
      _ => Err(BackendError::Unsupported(s.to_string())),
    }
  }
}

/// Incremental writer of one build description.
///
/// Call [`emit_step`](Emitter::emit_step) once per step in topological
/// order, then the two views, then [`finalize`](Emitter::finalize) once.
pub trait Emitter {
  /// Name of the generated file inside the build directory.
  fn file_name(&self) -> &'static str;

  fn emit_step(&mut self, step: &PlannedStep) -> Result<(), BackendError>;

  /// Add the `list` target printing the steps in order.
  fn emit_list(&mut self, steps: &[PlannedStep]) -> Result<(), BackendError>;

  /// Add the `status` target comparing stamps with current fingerprints.
  fn emit_status(&mut self, steps: &[PlannedStep]) -> Result<(), BackendError>;

  fn finalize(&mut self) -> Result<String, BackendError>;
}

/// One of the concrete emitters.
#[derive(Debug)]
pub enum Backend {
  Make(MakeBackend),
  Ninja(NinjaBackend),
}

impl Backend {
  pub fn new(kind: BackendKind) -> Self {
    match kind {
      BackendKind::Make => Backend::Make(MakeBackend::new()),
      BackendKind::Ninja => Backend::Ninja(NinjaBackend::new()),
    }
  }

  pub fn kind(&self) -> BackendKind {
    match self {
      Backend::Make(_) => BackendKind::Make,
      Backend::Ninja(_) => BackendKind::Ninja,
    }
  }

  fn inner(&mut self) -> &mut dyn Emitter {
    match self {
      Backend::Make(b) => b,
      Backend::Ninja(b) => b,
    }
  }
}

impl Emitter for Backend {
  fn file_name(&self) -> &'static str {
    self.kind().file_name()
  }

  fn emit_step(&mut self, step: &PlannedStep) -> Result<(), BackendError> {
    self.inner().emit_step(step)
  }

  fn emit_list(&mut self, steps: &[PlannedStep]) -> Result<(), BackendError> {
    self.inner().emit_list(steps)
  }

  fn emit_status(&mut self, steps: &[PlannedStep]) -> Result<(), BackendError> {
    self.inner().emit_status(steps)
  }

  fn finalize(&mut self) -> Result<String, BackendError> {
    self.inner().finalize()
  }
}

pub(crate) const HEADER: &str = "# Generated by flowgen. Do not edit; rerun `flowgen build` instead.";

/// Bookkeeping shared by both emitters.
#[derive(Debug, Default)]
pub(crate) struct EmitState {
  emitted: std::collections::HashSet<String>,
  pub stamps: Vec<String>,
  pub finalized: bool,
}

impl EmitState {
  /// Check that `step` can be emitted now and record it.
  pub fn admit(&mut self, step: &PlannedStep) -> Result<(), BackendError> {
    if self.finalized {
      return Err(BackendError::Finalized);
    }
    check_step(step)?;
    if !self.emitted.insert(step.name.clone()) {
      return Err(BackendError::AlreadyEmitted(step.name.clone()));
    }
    self.stamps.push(step.stamp());
    Ok(())
  }

  pub fn check_open(&self) -> Result<(), BackendError> {
    if self.finalized { Err(BackendError::Finalized) } else { Ok(()) }
  }
}

fn is_target_safe(s: &str) -> bool {
  !s.is_empty()
    && s
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+' | '@'))
}

/// Names and ports become file names and targets in both formats, so they are
/// limited to characters neither format nor the shell treats specially.
fn check_step(step: &PlannedStep) -> Result<(), BackendError> {
  let format_err = |reason: String| BackendError::Format {
    step: step.name.clone(),
    reason,
  };

  if RESERVED_TARGETS.contains(&step.name.as_str()) {
    return Err(BackendError::ReservedTarget(step.name.clone()));
  }
  if !is_target_safe(&step.name) {
    return Err(format_err(format!(
      "name {:?} may only contain letters, digits and -_.+@",
      step.name
    )));
  }
  for port in step.outputs.iter().chain(step.inputs.iter().map(|i| &i.port)) {
    if !is_target_safe(port) || port == "." || port == ".." {
      return Err(format_err(format!("port name {port:?} is not usable as a file name")));
    }
  }
  for line in step.command.lines() {
    if line.contains(['\n', '\r']) {
      return Err(format_err("command lines must not contain line breaks".into()));
    }
  }
  Ok(())
}

/// Double every `$`; both formats treat a lone `$` as a variable reference.
pub(crate) fn escape_dollar(s: &str) -> String {
  s.replace('$', "$$")
}

/// Quote `s` as a single shell word.
pub(crate) fn shell_quote(s: &str) -> String {
  format!("'{}'", s.replace('\'', r"'\''"))
}

/// Command lines as written to the step script: trailing whitespace and
/// trailing blank lines removed.
fn script_lines(step: &PlannedStep) -> Vec<&str> {
  let mut lines: Vec<&str> = step.command.lines().iter().map(|l| l.trim_end()).collect();
  while lines.last().is_some_and(|l| l.is_empty()) {
    lines.pop();
  }
  lines
}

/// Shell lines that materialize one step, in execution order.
pub(crate) fn step_script(step: &PlannedStep) -> Vec<String> {
  let dir = &step.dir;
  let mut script = vec![
    format!("if [ -L {dir}/{STEP_OUTPUTS_DIR} ]; then rm {dir}/{STEP_OUTPUTS_DIR}; fi"),
    format!("mkdir -p {dir}/{STEP_INPUTS_DIR} {dir}/{STEP_OUTPUTS_DIR}"),
  ];

  for input in &step.inputs {
    script.push(format!(
      "ln -sfn ../../{from}/{STEP_OUTPUTS_DIR}/{from_port} {dir}/{STEP_INPUTS_DIR}/{port}",
      from = input.from_dir,
      from_port = input.from_port,
      port = input.port,
    ));
  }

  let lines = script_lines(step);
  if !lines.is_empty() {
    let quoted: Vec<String> = lines.iter().map(|l| shell_quote(l)).collect();
    script.push(format!(
      "printf '%s\\n' {} > {dir}/{STEP_SCRIPT_FILENAME}",
      quoted.join(" ")
    ));
    script.push(format!("(cd {dir} && sh -e {STEP_SCRIPT_FILENAME})"));
  }

  script.push(format!("echo {} > {}", step.fingerprint, step.stamp()));
  script
}

/// Shell test that succeeds when the step's stamp holds its fingerprint.
pub(crate) fn stamp_matches(step: &PlannedStep) -> String {
  format!(
    "[ \"$(cat {} 2>/dev/null)\" = \"{}\" ]",
    step.stamp(),
    step.fingerprint
  )
}

/// Shell line printing one entry of the `list` view.
pub(crate) fn list_line(step: &PlannedStep) -> String {
  format!("echo ' - {} : {}'", step.position, step.name)
}

/// Shell line printing one row of the `status` view.
pub(crate) fn status_line(step: &PlannedStep) -> String {
  format!(
    "if {test}; then echo ' - {pos} : {name} : up to date'; else echo ' - {pos} : {name} : needs rebuild'; fi",
    test = stamp_matches(step),
    pos = step.position,
    name = step.name,
  )
}
