//! `flowgen build`: write the backend build file for the design.

use std::time::Instant;

use anyhow::{Context, Result};

use flowgen_lib::orchestrator::Orchestrator;

use super::GlobalArgs;
use crate::output::{format_duration, print_json, print_stat, print_success};

pub fn cmd_build(args: &GlobalArgs) -> Result<()> {
  let start = Instant::now();
  let design = args.load_design()?;
  let backend = args.backend(&design.config)?;
  let build_dir = args.build_dir(Some(&design.config));

  let outcome = Orchestrator::new(&design.graph)
    .build(backend, &build_dir)
    .with_context(|| format!("Failed to generate {} for {}", backend.file_name(), design.config.name))?;

  if args.output.is_json() {
    print_json(&outcome)?;
  } else {
    print_success(&format!("Wrote {}", outcome.path.display()));
    print_stat("Design", &design.config.name);
    print_stat("Backend", &outcome.backend.to_string());
    print_stat("Steps", &outcome.plan.len().to_string());
    print_stat("Duration", &format_duration(start.elapsed()));
    let tool = outcome.backend;
    print_stat("Targets", &format!("run \"{tool} list\" and \"{tool} status\""));
  }

  Ok(())
}
