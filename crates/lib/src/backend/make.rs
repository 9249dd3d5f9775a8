//! GNU Make backend.
//!
//! Each step is a rule on its stamp file. Make only compares timestamps, so
//! every rule also depends on `$(call flowgen_stale,<dir>,<fingerprint>)`,
//! which expands to `FORCE` when the stamp does not hold the fingerprint the
//! file was generated with.

use std::fmt::Write;

use super::{BackendError, EmitState, Emitter, HEADER, escape_dollar, list_line, status_line, step_script};
use crate::consts::STAMP_FILENAME;
use crate::plan::PlannedStep;

#[derive(Debug, Default)]
pub struct MakeBackend {
  state: EmitState,
  body: String,
  dirs: Vec<String>,
  list: Option<String>,
  status: Option<String>,
}

impl MakeBackend {
  pub fn new() -> Self {
    Self::default()
  }
}

fn recipe(out: &mut String, line: &str) {
  out.push('\t');
  out.push_str(&escape_dollar(line));
  out.push('\n');
}

impl Emitter for MakeBackend {
  fn file_name(&self) -> &'static str {
    "Makefile"
  }

  fn emit_step(&mut self, step: &PlannedStep) -> Result<(), BackendError> {
    self.state.admit(step)?;
    self.dirs.push(step.dir.clone());

    let out = &mut self.body;
    let rule = "#".repeat(72);
    let _ = writeln!(out, "{rule}\n# {} : {}\n{rule}\n", step.position, step.name);

    let mut prereqs: Vec<String> = step.upstream.iter().map(|u| format!("{}/{STAMP_FILENAME}", u.dir)).collect();
    prereqs.push(format!("$(call flowgen_stale,{},{})", step.dir, step.fingerprint));
    let _ = writeln!(out, "{}: {}", step.stamp(), prereqs.join(" "));
    for line in step_script(step) {
      recipe(out, &line);
    }

    let _ = writeln!(out, "\n.PHONY: {name}\n{name}: {}\n", step.stamp(), name = step.name);
    Ok(())
  }

  fn emit_list(&mut self, steps: &[PlannedStep]) -> Result<(), BackendError> {
    self.state.check_open()?;
    let mut out = String::from("list:\n");
    recipe(&mut out, "@echo 'Steps:'");
    for step in steps {
      recipe(&mut out, &format!("@{}", list_line(step)));
    }
    self.list = Some(out);
    Ok(())
  }

  fn emit_status(&mut self, steps: &[PlannedStep]) -> Result<(), BackendError> {
    self.state.check_open()?;
    let mut out = String::from("status:\n");
    recipe(&mut out, "@echo 'Status:'");
    for step in steps {
      recipe(&mut out, &format!("@{}", status_line(step)));
    }
    self.status = Some(out);
    Ok(())
  }

  fn finalize(&mut self) -> Result<String, BackendError> {
    self.state.check_open()?;
    self.state.finalized = true;

    let mut out = String::new();
    let _ = writeln!(out, "{HEADER}\n");
    out.push_str(".DEFAULT_GOAL := all\n");
    out.push_str(".PHONY: all list status clean FORCE\n");
    out.push_str("FORCE:\n\n");
    out.push_str("flowgen_stale = $(if $(filter $(2),$(shell cat $(1)/.stamp 2>/dev/null)),,FORCE)\n\n");

    out.push_str(&self.body);

    let _ = writeln!(out, "all: {}\n", self.state.stamps.join(" "));
    for view in [self.list.take(), self.status.take()].into_iter().flatten() {
      out.push_str(&view);
      out.push('\n');
    }
    out.push_str("clean:\n");
    if !self.dirs.is_empty() {
      recipe(&mut out, &format!("rm -rf {}", self.dirs.join(" ")));
    }
    Ok(out)
  }
}
