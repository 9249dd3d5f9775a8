//! Ninja backend.
//!
//! Ninja records each edge's command line in `.ninja_log` and reruns an edge
//! whose command changed or that it has never run. The stamp command embeds
//! the step fingerprint, so a fingerprint change alone makes a step dirty.
//!
//! Outputs restored from a stash are not in the log, so every step command
//! first checks the stamp and does nothing when it already holds the
//! fingerprint. `restat = 1` then lets Ninja see the untouched stamp and skip
//! dependents whose inputs did not change.

use std::fmt::Write;

use super::{
  BackendError, EmitState, Emitter, HEADER, escape_dollar, list_line, stamp_matches, status_line, step_script,
};
use crate::consts::STAMP_FILENAME;
use crate::plan::PlannedStep;

#[derive(Debug, Default)]
pub struct NinjaBackend {
  state: EmitState,
  body: String,
  list: Option<String>,
  status: Option<String>,
}

impl NinjaBackend {
  pub fn new() -> Self {
    Self::default()
  }
}

/// Escape a path in a `build` line.
fn escape_path(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '$' | ' ' | ':' => {
        out.push('$');
        out.push(c);
      }
      _ => out.push(c),
    }
  }
  out
}

/// Unescaped shell command of a step edge.
fn step_command(step: &PlannedStep) -> String {
  format!("{} || ({})", stamp_matches(step), step_script(step).join(" && "))
}

fn report(name: &str, heading: &str, lines: impl Iterator<Item = String>) -> String {
  let mut script = vec![format!("echo '{heading}'")];
  script.extend(lines);
  format!("build {name}: report\n  cmd = {}\n", escape_dollar(&script.join("; ")))
}

impl Emitter for NinjaBackend {
  fn file_name(&self) -> &'static str {
    "build.ninja"
  }

  fn emit_step(&mut self, step: &PlannedStep) -> Result<(), BackendError> {
    self.state.admit(step)?;

    let out = &mut self.body;
    let _ = writeln!(out, "# {} : {}", step.position, step.name);

    let stamp = escape_path(&step.stamp());
    let deps: Vec<String> = step
      .upstream
      .iter()
      .map(|u| escape_path(&format!("{}/{STAMP_FILENAME}", u.dir)))
      .collect();
    if deps.is_empty() {
      let _ = writeln!(out, "build {stamp}: step");
    } else {
      let _ = writeln!(out, "build {stamp}: step | {}", deps.join(" "));
    }
    let _ = writeln!(out, "  cmd = {}", escape_dollar(&step_command(step)));
    let _ = writeln!(out, "  desc = {} : {}", step.position, escape_dollar(&step.name));
    let _ = writeln!(out, "build {}: phony {stamp}\n", escape_path(&step.name));
    Ok(())
  }

  fn emit_list(&mut self, steps: &[PlannedStep]) -> Result<(), BackendError> {
    self.state.check_open()?;
    self.list = Some(report("list", "Steps:", steps.iter().map(list_line)));
    Ok(())
  }

  fn emit_status(&mut self, steps: &[PlannedStep]) -> Result<(), BackendError> {
    self.state.check_open()?;
    self.status = Some(report("status", "Status:", steps.iter().map(status_line)));
    Ok(())
  }

  fn finalize(&mut self) -> Result<String, BackendError> {
    self.state.check_open()?;
    self.state.finalized = true;

    let mut out = String::new();
    let _ = writeln!(out, "{HEADER}\n");
    out.push_str("ninja_required_version = 1.5\n\n");
    out.push_str("rule step\n  command = $cmd\n  description = $desc\n  restat = 1\n\n");
    out.push_str("rule report\n  command = $cmd\n  pool = console\n\n");

    out.push_str(&self.body);

    let stamps: Vec<String> = self.state.stamps.iter().map(|s| escape_path(s)).collect();
    let _ = writeln!(out, "build all: phony {}", stamps.join(" "));
    out.push_str("default all\n");
    for view in [self.list.take(), self.status.take()].into_iter().flatten() {
      out.push('\n');
      out.push_str(&view);
    }
    Ok(out)
  }
}
