//! Core types for the step graph.
//!
//! A [`Step`] is a named build unit with directional ports, an opaque
//! command specification and a parameter table. [`Edge`]s wire an output
//! port of one step to an input port of another.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Direction of a port relative to its step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
  Input,
  Output,
}

impl fmt::Display for PortDirection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PortDirection::Input => write!(f, "input"),
      PortDirection::Output => write!(f, "output"),
    }
  }
}

/// A named attachment point on a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port<'a> {
  pub name: &'a str,
  pub direction: PortDirection,
}

/// The opaque command a step runs.
///
/// Each line is a complete shell command. Lines run in order from the step's
/// directory; the graph never interprets them beyond hashing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandSpec {
  lines: Vec<String>,
}

impl CommandSpec {
  pub fn new<I, S>(lines: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      lines: lines.into_iter().map(Into::into).collect(),
    }
  }

  pub fn lines(&self) -> &[String] {
    &self.lines
  }

  pub fn push(&mut self, line: impl Into<String>) {
    self.lines.push(line.into());
  }

  pub fn is_empty(&self) -> bool {
    self.lines.iter().all(|l| l.trim().is_empty())
  }
}

impl From<&str> for CommandSpec {
  fn from(script: &str) -> Self {
    Self::new(script.lines())
  }
}

/// A step parameter value.
///
/// Values keep their type: the integer `1`, the float `1.0` and the string
/// `"1"` are three different parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
  Bool(bool),
  Int(i64),
  Float(f64),
  String(String),
  List(Vec<ParamValue>),
}

impl From<bool> for ParamValue {
  fn from(value: bool) -> Self {
    ParamValue::Bool(value)
  }
}

impl From<i64> for ParamValue {
  fn from(value: i64) -> Self {
    ParamValue::Int(value)
  }
}

impl From<i32> for ParamValue {
  fn from(value: i32) -> Self {
    ParamValue::Int(value.into())
  }
}

impl From<f64> for ParamValue {
  fn from(value: f64) -> Self {
    ParamValue::Float(value)
  }
}

impl From<&str> for ParamValue {
  fn from(value: &str) -> Self {
    ParamValue::String(value.to_string())
  }
}

impl From<String> for ParamValue {
  fn from(value: String) -> Self {
    ParamValue::String(value)
  }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
  fn from(values: Vec<T>) -> Self {
    ParamValue::List(values.into_iter().map(Into::into).collect())
  }
}

/// A build unit in the graph.
///
/// Construct with [`Step::new`] and the `with_*` helpers, or deserialize from a
/// construct file:
///
/// ```yaml
/// name: synthesis
/// inputs: [design.v]
/// outputs: [netlist.v]
/// commands:
///   - dc_shell -f run.tcl
/// parameters:
///   clock_period: 1.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
  pub name: String,

  #[serde(default)]
  pub inputs: Vec<String>,

  #[serde(default)]
  pub outputs: Vec<String>,

  #[serde(default, rename = "commands")]
  pub command: CommandSpec,

  #[serde(default, alias = "parameters")]
  pub params: BTreeMap<String, ParamValue>,
}

impl Step {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      inputs: Vec::new(),
      outputs: Vec::new(),
      command: CommandSpec::default(),
      params: BTreeMap::new(),
    }
  }

  pub fn with_input(mut self, port: impl Into<String>) -> Self {
    self.inputs.push(port.into());
    self
  }

  pub fn with_output(mut self, port: impl Into<String>) -> Self {
    self.outputs.push(port.into());
    self
  }

  pub fn with_command(mut self, line: impl Into<String>) -> Self {
    self.command.push(line);
    self
  }

  pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
    self.params.insert(key.into(), value.into());
    self
  }

  /// Direction of the named port, if the step declares it.
  pub fn port_direction(&self, port: &str) -> Option<PortDirection> {
    if self.inputs.iter().any(|p| p == port) {
      Some(PortDirection::Input)
    } else if self.outputs.iter().any(|p| p == port) {
      Some(PortDirection::Output)
    } else {
      None
    }
  }

  /// All ports, inputs first, each group in declaration order.
  pub fn ports(&self) -> impl Iterator<Item = Port<'_>> {
    let inputs = self.inputs.iter().map(|name| Port {
      name,
      direction: PortDirection::Input,
    });
    let outputs = self.outputs.iter().map(|name| Port {
      name,
      direction: PortDirection::Output,
    });
    inputs.chain(outputs)
  }

  /// First port name declared more than once, across both directions.
  pub(crate) fn duplicate_port(&self) -> Option<&str> {
    let mut seen = std::collections::HashSet::new();
    self.ports().map(|p| p.name).find(|name| !seen.insert(*name))
  }
}

/// A `(step, port)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRef {
  pub step: String,
  pub port: String,
}

impl PortRef {
  pub fn new(step: impl Into<String>, port: impl Into<String>) -> Self {
    Self {
      step: step.into(),
      port: port.into(),
    }
  }

  /// Parse `step.port`. Splits on the first `.` so port names may contain dots
  /// (`synth.netlist.v` is port `netlist.v` of step `synth`).
  pub fn parse(s: &str) -> Option<Self> {
    let (step, port) = s.split_once('.')?;
    if step.is_empty() || port.is_empty() {
      return None;
    }
    Some(Self::new(step, port))
  }
}

impl fmt::Display for PortRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.step, self.port)
  }
}

/// A wire from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
  pub from: PortRef,
  pub to: PortRef,
}

impl fmt::Display for Edge {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} -> {}", self.from, self.to)
  }
}

/// Errors raised while building or validating a graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
  #[error("duplicate step name: {0}")]
  DuplicateStep(String),

  #[error("step {step} declares port {port} more than once")]
  DuplicatePort { step: String, port: String },

  #[error("unknown {direction} port {port}")]
  UnknownPort { port: PortRef, direction: PortDirection },

  #[error("input port {port} is already bound to {existing}")]
  PortAlreadyBound { port: PortRef, existing: PortRef },

  #[error("dependency cycle: {}", .0.join(" -> "))]
  Cycle(Vec<String>),

  #[error("edge {edge} references missing port {missing}")]
  DanglingPort { edge: String, missing: PortRef },

  #[error("malformed port reference {0:?}: expected <step>.<port>")]
  MalformedPortRef(String),
}
