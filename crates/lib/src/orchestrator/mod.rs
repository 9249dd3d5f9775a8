//! Turns a graph into a committed build description.
//!
//! A build runs in a fixed sequence and stops at the first failure:
//! 1. validate the graph
//! 2. order it once
//! 3. fingerprint every step in that order
//! 4. emit one rule per step, then the list and status views
//! 5. finalize and commit atomically
//!
//! Nothing touches the build directory before step 5, and the commit replaces
//! the previous description in a single rename.

mod stash;
mod types;
mod views;

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

pub use stash::{pop_entry, push_step};
pub use types::{BuildOutcome, ListEntry, OrchestratorError, PoppedStep, StatusEntry, StepState};
pub use views::{list, status};

use crate::backend::{Backend, BackendKind, Emitter};
use crate::fingerprint::{FingerprintEngine, FingerprintError};
use crate::graph::Graph;
use crate::platform::fs::write_atomic;
use crate::plan::{BuildPlan, InputLink, PlannedStep, UpstreamRef};

pub struct Orchestrator<'g> {
  graph: &'g Graph,
}

impl<'g> Orchestrator<'g> {
  pub fn new(graph: &'g Graph) -> Self {
    Self { graph }
  }

  /// Validate, order and fingerprint the graph.
  pub fn plan(&self) -> Result<BuildPlan, OrchestratorError> {
    let graph = self.graph;
    graph.validate()?;
    let order = graph.topological_order()?;
    let engine = FingerprintEngine::compute_all(graph, &order)?;

    let positions: HashMap<&str, usize> = order.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
    let dir_of = |name: &str| PlannedStep::dir_name(positions[name], name);

    let mut steps = Vec::with_capacity(order.len());
    for (position, name) in order.iter().enumerate() {
      let unresolved = || FingerprintError::UnresolvedDependency {
        step: name.clone(),
        missing: name.clone(),
      };
      let step = graph.get(name).ok_or_else(unresolved)?;
      let fingerprint = engine.get(name).cloned().ok_or_else(unresolved)?;

      let mut upstream_names = graph.upstream_of(name);
      upstream_names.sort_by_key(|up| positions[up]);
      let upstream = upstream_names
        .into_iter()
        .map(|up| UpstreamRef {
          name: up.to_string(),
          dir: dir_of(up),
        })
        .collect();
      let inputs = graph
        .inputs_of(name)
        .into_iter()
        .map(|edge| InputLink {
          port: edge.to.port.clone(),
          from_dir: dir_of(&edge.from.step),
          from_port: edge.from.port.clone(),
        })
        .collect();

      steps.push(PlannedStep {
        position,
        name: name.clone(),
        dir: PlannedStep::dir_name(position, name),
        command: step.command.clone(),
        upstream,
        inputs,
        outputs: step.outputs.clone(),
        fingerprint,
      });
    }

    debug!(steps = steps.len(), "planned graph");
    Ok(BuildPlan { steps })
  }

  /// Render `plan` with the `kind` backend without writing anything.
  pub fn render(plan: &BuildPlan, kind: BackendKind) -> Result<String, OrchestratorError> {
    let mut backend = Backend::new(kind);
    for step in &plan.steps {
      backend.emit_step(step).map_err(|source| OrchestratorError::Emit {
        step: step.name.clone(),
        source,
      })?;
    }
    backend.emit_list(&plan.steps)?;
    backend.emit_status(&plan.steps)?;
    Ok(backend.finalize()?)
  }

  /// Plan, render and commit the build description into `build_dir`.
  pub fn build(&self, kind: BackendKind, build_dir: &Path) -> Result<BuildOutcome, OrchestratorError> {
    let plan = self.plan()?;
    let text = Self::render(&plan, kind)?;

    let path = build_dir.join(kind.file_name());
    write_atomic(&path, text.as_bytes()).map_err(|source| OrchestratorError::Commit {
      path: path.clone(),
      source,
    })?;

    info!(path = %path.display(), backend = %kind, steps = plan.len(), "wrote build description");
    Ok(BuildOutcome {
      path,
      backend: kind,
      plan,
    })
  }
}
