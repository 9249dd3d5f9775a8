//! Step graph model.
//!
//! A [`Graph`] is a set of [`Step`]s wired by [`Edge`]s from output ports to
//! input ports. It is produced once by a [`GraphBuilder`] (or from a
//! [`GraphSpec`] construct file) and only read afterwards.
//!
//! Two algorithms live here:
//! - [`Graph::validate`]: colour-marking depth-first search that reports the
//!   offending cycle, plus structural checks on every edge.
//! - [`Graph::topological_order`]: Kahn's algorithm whose ready set is ordered
//!   by insertion index, so independent steps keep the order they were added.

mod builder;
mod spec;
mod types;

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

pub use builder::GraphBuilder;
pub use spec::{EdgeSpec, GraphSpec};
pub use types::{CommandSpec, Edge, GraphError, ParamValue, Port, PortDirection, PortRef, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
  Unvisited,
  Visiting,
  Done,
}

/// An immutable step graph.
#[derive(Debug, Clone, Default)]
pub struct Graph {
  steps: Vec<Step>,
  index: HashMap<String, usize>,
  edges: Vec<Edge>,
}

impl Graph {
  pub(crate) fn assemble(steps: Vec<Step>, index: HashMap<String, usize>, edges: Vec<Edge>) -> Self {
    Self { steps, index, edges }
  }

  /// Assemble a graph from parts without per-edge checks.
  ///
  /// Used for graphs that were not produced by a [`GraphBuilder`]; call
  /// [`Graph::validate`] before relying on the edges. Step names must still
  /// be unique.
  pub fn from_parts(steps: Vec<Step>, edges: Vec<Edge>) -> Result<Self, GraphError> {
    let mut index = HashMap::with_capacity(steps.len());
    for (idx, step) in steps.iter().enumerate() {
      if index.insert(step.name.clone(), idx).is_some() {
        return Err(GraphError::DuplicateStep(step.name.clone()));
      }
    }
    Ok(Self { steps, index, edges })
  }

  /// Steps in insertion order.
  pub fn steps(&self) -> &[Step] {
    &self.steps
  }

  pub fn edges(&self) -> &[Edge] {
    &self.edges
  }

  pub fn get(&self, name: &str) -> Option<&Step> {
    self.index.get(name).map(|&idx| &self.steps[idx])
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  /// Check structure and acyclicity.
  ///
  /// Edge endpoints are checked first (`DanglingPort`, `PortAlreadyBound`),
  /// then a depth-first search reports the first back edge as a `Cycle`. The
  /// cycle lists step names in edge order and repeats the first name at the
  /// end, so a self-loop on `x` is `[x, x]`.
  pub fn validate(&self) -> Result<(), GraphError> {
    self.check_edges()?;

    let dag = self.dependency_graph();
    let mut marks = vec![Mark::Unvisited; self.steps.len()];

    for root in dag.node_indices() {
      if marks[root.index()] != Mark::Unvisited {
        continue;
      }

      marks[root.index()] = Mark::Visiting;
      let mut stack: Vec<(NodeIndex, Vec<NodeIndex>, usize)> = vec![(root, downstream_sorted(&dag, root), 0)];

      while let Some((node, children, next)) = stack.last_mut() {
        let Some(&child) = children.get(*next) else {
          marks[node.index()] = Mark::Done;
          stack.pop();
          continue;
        };
        *next += 1;

        match marks[child.index()] {
          Mark::Visiting => {
            let start = stack.iter().position(|(n, _, _)| *n == child).unwrap_or(0);
            let mut cycle: Vec<String> = stack[start..]
              .iter()
              .map(|(n, _, _)| self.steps[n.index()].name.clone())
              .collect();
            cycle.push(self.steps[child.index()].name.clone());
            debug!(cycle = ?cycle, "cycle detected");
            return Err(GraphError::Cycle(cycle));
          }
          Mark::Unvisited => {
            marks[child.index()] = Mark::Visiting;
            stack.push((child, downstream_sorted(&dag, child), 0));
          }
          Mark::Done => {}
        }
      }
    }

    Ok(())
  }

  /// Step names ordered so every step follows all of its upstream steps.
  ///
  /// Among steps that are ready at the same time the one added first wins,
  /// which makes the order reproducible for a given construction sequence.
  pub fn topological_order(&self) -> Result<Vec<String>, GraphError> {
    self.check_edges()?;

    let dag = self.dependency_graph();
    let mut in_degree: Vec<usize> = dag
      .node_indices()
      .map(|idx| dag.neighbors_directed(idx, Direction::Incoming).count())
      .collect();

    let mut ready: BTreeSet<usize> = (0..self.steps.len()).filter(|&idx| in_degree[idx] == 0).collect();
    let mut order = Vec::with_capacity(self.steps.len());

    while let Some(idx) = ready.pop_first() {
      order.push(self.steps[idx].name.clone());
      for child in dag.neighbors_directed(NodeIndex::new(idx), Direction::Outgoing) {
        let deg = &mut in_degree[child.index()];
        *deg = deg.saturating_sub(1);
        if *deg == 0 {
          ready.insert(child.index());
        }
      }
    }

    if order.len() != self.steps.len() {
      // Leftover nodes sit on or behind a cycle; let the DFS name it.
      self.validate()?;
      return Err(GraphError::Cycle(Vec::new()));
    }

    Ok(order)
  }

  /// Distinct direct upstream step names of `name`, in insertion order.
  ///
  /// Needs no valid ordering, so it also works on graphs that have not been
  /// validated. The build plan re-sorts these by topological position.
  pub fn upstream_of(&self, name: &str) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut upstream: Vec<(usize, &str)> = self
      .edges
      .iter()
      .filter(|e| e.to.step == name)
      .filter_map(|e| self.index.get(&e.from.step).map(|&idx| (idx, e.from.step.as_str())))
      .filter(|(idx, _)| seen.insert(*idx))
      .collect();
    upstream.sort_by_key(|(idx, _)| *idx);
    upstream.into_iter().map(|(_, n)| n).collect()
  }

  /// Distinct direct downstream step names of `name`, in insertion order.
  pub fn downstream_of(&self, name: &str) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut downstream: Vec<(usize, &str)> = self
      .edges
      .iter()
      .filter(|e| e.from.step == name)
      .filter_map(|e| self.index.get(&e.to.step).map(|&idx| (idx, e.to.step.as_str())))
      .filter(|(idx, _)| seen.insert(*idx))
      .collect();
    downstream.sort_by_key(|(idx, _)| *idx);
    downstream.into_iter().map(|(_, n)| n).collect()
  }

  /// Edges feeding the input ports of `name`, in the step's input port order.
  pub fn inputs_of(&self, name: &str) -> Vec<&Edge> {
    let Some(step) = self.get(name) else {
      return Vec::new();
    };
    step
      .inputs
      .iter()
      .filter_map(|port| self.edges.iter().find(|e| e.to.step == name && &e.to.port == port))
      .collect()
  }

  fn check_edges(&self) -> Result<(), GraphError> {
    let mut bound: HashMap<&PortRef, &PortRef> = HashMap::new();

    for edge in &self.edges {
      for (end, direction) in [(&edge.from, PortDirection::Output), (&edge.to, PortDirection::Input)] {
        let present = self
          .get(&end.step)
          .and_then(|step| step.port_direction(&end.port))
          .is_some_and(|d| d == direction);
        if !present {
          return Err(GraphError::DanglingPort {
            edge: edge.to_string(),
            missing: end.clone(),
          });
        }
      }

      if let Some(existing) = bound.insert(&edge.to, &edge.from) {
        return Err(GraphError::PortAlreadyBound {
          port: edge.to.clone(),
          existing: existing.clone(),
        });
      }
    }

    Ok(())
  }

  /// Step-level dependency graph. Node `i` is step `i`; parallel edges between
  /// the same two steps collapse into one.
  fn dependency_graph(&self) -> DiGraph<usize, ()> {
    let mut dag = DiGraph::with_capacity(self.steps.len(), self.edges.len());
    for idx in 0..self.steps.len() {
      dag.add_node(idx);
    }
    for edge in &self.edges {
      if let (Some(&from), Some(&to)) = (self.index.get(&edge.from.step), self.index.get(&edge.to.step)) {
        dag.update_edge(NodeIndex::new(from), NodeIndex::new(to), ());
      }
    }
    dag
  }
}

fn downstream_sorted(dag: &DiGraph<usize, ()>, node: NodeIndex) -> Vec<NodeIndex> {
  let mut children: Vec<NodeIndex> = dag.neighbors_directed(node, Direction::Outgoing).collect();
  children.sort();
  children
}
