//! Serializable graph description used by construct files.
//!
//! ```yaml
//! name: gcd
//! steps:
//!   - name: rtl
//!     outputs: [design.v]
//!     commands: [cp ../../rtl/gcd.v outputs/design.v]
//!   - name: synth
//!     inputs: [design.v]
//!     outputs: [netlist.v]
//!     commands: [yosys -s run.ys]
//! edges:
//!   - from: rtl.design.v
//!     to: synth.design.v
//!   - by_name: [synth, pnr]
//! ```

use serde::{Deserialize, Serialize};

use super::builder::GraphBuilder;
use super::types::{GraphError, PortRef, Step};
use super::Graph;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EdgeSpec {
  /// Explicit `step.port` endpoints.
  Ports { from: String, to: String },
  /// Connect all same-named ports of two steps.
  ByName { by_name: (String, String) },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
  #[serde(default)]
  pub name: Option<String>,

  #[serde(default)]
  pub steps: Vec<Step>,

  #[serde(default)]
  pub edges: Vec<EdgeSpec>,
}

impl GraphSpec {
  /// Replay the description through a [`GraphBuilder`], so every builder
  /// check applies.
  pub fn into_graph(self) -> Result<Graph, GraphError> {
    let mut builder = GraphBuilder::new();
    for step in self.steps {
      builder.add_step(step)?;
    }

    for edge in &self.edges {
      match edge {
        EdgeSpec::Ports { from, to } => {
          let from = PortRef::parse(from).ok_or_else(|| GraphError::MalformedPortRef(from.clone()))?;
          let to = PortRef::parse(to).ok_or_else(|| GraphError::MalformedPortRef(to.clone()))?;
          builder.connect(&from.step, &from.port, &to.step, &to.port)?;
        }
        EdgeSpec::ByName { by_name: (src, dst) } => {
          builder.connect_by_name(src, dst)?;
        }
      }
    }

    Ok(builder.build())
  }
}
