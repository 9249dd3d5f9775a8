//! Incremental graph construction.
//!
//! [`GraphBuilder`] is the only mutable view of a graph. Steps and edges are
//! checked as they are added; [`GraphBuilder::build`] hands out an immutable
//! [`Graph`] that downstream components only read.

use std::collections::HashMap;

use tracing::debug;

use super::Graph;
use super::types::{Edge, GraphError, PortDirection, PortRef, Step};

#[derive(Debug, Default)]
pub struct GraphBuilder {
  steps: Vec<Step>,
  index: HashMap<String, usize>,
  edges: Vec<Edge>,
  bound: HashMap<PortRef, PortRef>,
}

impl GraphBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a step. Fails if the name is taken or the step repeats a port name.
  pub fn add_step(&mut self, step: Step) -> Result<&mut Self, GraphError> {
    if self.index.contains_key(&step.name) {
      return Err(GraphError::DuplicateStep(step.name));
    }
    if let Some(port) = step.duplicate_port() {
      return Err(GraphError::DuplicatePort {
        step: step.name.clone(),
        port: port.to_string(),
      });
    }

    debug!(step = %step.name, inputs = step.inputs.len(), outputs = step.outputs.len(), "adding step");
    self.index.insert(step.name.clone(), self.steps.len());
    self.steps.push(step);
    Ok(self)
  }

  /// Wire `src_step.src_port` (an output) to `dst_step.dst_port` (an input).
  ///
  /// An input port accepts one incoming edge; output ports fan out freely.
  /// Self-loops are accepted here and rejected by [`Graph::validate`].
  pub fn connect(
    &mut self,
    src_step: &str,
    src_port: &str,
    dst_step: &str,
    dst_port: &str,
  ) -> Result<&mut Self, GraphError> {
    let from = PortRef::new(src_step, src_port);
    let to = PortRef::new(dst_step, dst_port);

    self.require_port(&from, PortDirection::Output)?;
    self.require_port(&to, PortDirection::Input)?;

    if let Some(existing) = self.bound.get(&to) {
      return Err(GraphError::PortAlreadyBound {
        port: to,
        existing: existing.clone(),
      });
    }

    debug!(from = %from, to = %to, "connecting ports");
    self.bound.insert(to.clone(), from.clone());
    self.edges.push(Edge { from, to });
    Ok(self)
  }

  /// Connect every output of `src` to the same-named input of `dst`.
  ///
  /// Inputs of `dst` that are already bound are left alone. Returns the number
  /// of edges added.
  pub fn connect_by_name(&mut self, src: &str, dst: &str) -> Result<usize, GraphError> {
    let src_step = self.step(src, PortDirection::Output)?;
    let dst_step = self.step(dst, PortDirection::Input)?;

    let ports: Vec<String> = src_step
      .outputs
      .iter()
      .filter(|port| dst_step.inputs.contains(port))
      .cloned()
      .collect();

    let mut added = 0;
    for port in ports {
      if self.bound.contains_key(&PortRef::new(dst, &port)) {
        continue;
      }
      self.connect(src, &port, dst, &port)?;
      added += 1;
    }
    Ok(added)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.index.contains_key(name)
  }

  /// Finish construction.
  pub fn build(self) -> Graph {
    Graph::assemble(self.steps, self.index, self.edges)
  }

  fn step(&self, name: &str, direction: PortDirection) -> Result<&Step, GraphError> {
    self
      .index
      .get(name)
      .map(|&idx| &self.steps[idx])
      .ok_or_else(|| GraphError::UnknownPort {
        port: PortRef::new(name, "*"),
        direction,
      })
  }

  fn require_port(&self, port: &PortRef, direction: PortDirection) -> Result<(), GraphError> {
    let step = self.step(&port.step, direction).map_err(|_| GraphError::UnknownPort {
      port: port.clone(),
      direction,
    })?;
    match step.port_direction(&port.port) {
      Some(found) if found == direction => Ok(()),
      _ => Err(GraphError::UnknownPort {
        port: port.clone(),
        direction,
      }),
    }
  }
}
