//! Deterministic step fingerprints.
//!
//! A fingerprint is the SHA-256 of a step's canonical form (see
//! [`canonical`]): its command lines, its parameters, and the fingerprints of
//! its direct upstream steps sorted by upstream step name. Because each
//! upstream fingerprint already covers that step's own upstreams, a change to
//! any step propagates to everything reachable from it and to nothing else.
//!
//! The engine never recurses: feed steps in topological order and it reuses
//! what it has already computed.

pub mod canonical;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::trace;

use crate::consts::FINGERPRINT_SHORT_LEN;
use crate::graph::{Graph, Step};

/// A 64-character lowercase hex SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
  pub const LEN: usize = 64;

  /// Parse a full fingerprint.
  pub fn parse(s: &str) -> Result<Self, FingerprintError> {
    if s.len() == Self::LEN && is_lower_hex(s) {
      Ok(Self(s.to_string()))
    } else {
      Err(FingerprintError::Invalid(s.to_string()))
    }
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Leading characters used in tables and directory listings.
  pub fn short(&self) -> &str {
    &self.0[..FINGERPRINT_SHORT_LEN.min(self.0.len())]
  }

  pub fn of_bytes(bytes: &[u8]) -> Self {
    Self(hex::encode(Sha256::digest(bytes)))
  }
}

impl fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub(crate) fn is_lower_hex(s: &str) -> bool {
  !s.is_empty() && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FingerprintError {
  /// An upstream step has not been fingerprinted yet.
  #[error("cannot fingerprint {step}: upstream step {missing} has no fingerprint yet")]
  UnresolvedDependency { step: String, missing: String },

  #[error("invalid fingerprint {0:?}: expected 64 lowercase hex characters")]
  Invalid(String),
}

/// Fingerprint of a step given its upstream fingerprints.
///
/// `upstream` must already be sorted by upstream step name.
pub fn fingerprint_of(step: &Step, upstream: &[&Fingerprint]) -> Fingerprint {
  let upstream: Vec<&str> = upstream.iter().map(|fp| fp.as_str()).collect();
  let form = canonical::canonical_form(&step.command, &step.params, &upstream);
  Fingerprint::of_bytes(form.as_bytes())
}

/// Memoizing fingerprint calculator for one graph.
#[derive(Debug, Default)]
pub struct FingerprintEngine {
  known: HashMap<String, Fingerprint>,
}

impl FingerprintEngine {
  pub fn new() -> Self {
    Self::default()
  }

  /// Fingerprint `step`, which must belong to `graph`.
  ///
  /// Every direct upstream step must have been fingerprinted by this engine
  /// already; otherwise this fails with `UnresolvedDependency`.
  pub fn fingerprint(&mut self, step: &Step, graph: &Graph) -> Result<Fingerprint, FingerprintError> {
    let mut upstream = graph.upstream_of(&step.name);
    upstream.sort_unstable();

    let mut upstream_fps = Vec::with_capacity(upstream.len());
    for name in upstream {
      let fp = self.known.get(name).ok_or_else(|| FingerprintError::UnresolvedDependency {
        step: step.name.clone(),
        missing: name.to_string(),
      })?;
      upstream_fps.push(fp);
    }

    let fp = fingerprint_of(step, &upstream_fps);
    trace!(step = %step.name, fingerprint = %fp, "fingerprinted step");
    self.known.insert(step.name.clone(), fp.clone());
    Ok(fp)
  }

  /// Fingerprint every step named in `order`, which must be topological.
  pub fn compute_all(graph: &Graph, order: &[String]) -> Result<Self, FingerprintError> {
    let mut engine = Self::new();
    for name in order {
      // Names come from the graph's own ordering; a miss means the order is stale.
      let Some(step) = graph.get(name) else {
        return Err(FingerprintError::UnresolvedDependency {
          step: name.clone(),
          missing: name.clone(),
        });
      };
      engine.fingerprint(step, graph)?;
    }
    Ok(engine)
  }

  pub fn get(&self, name: &str) -> Option<&Fingerprint> {
    self.known.get(name)
  }

  pub fn into_map(self) -> HashMap<String, Fingerprint> {
    self.known
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::graph::{GraphBuilder, ParamValue};

  fn diamond(b_command: &str) -> Graph {
    let mut builder = GraphBuilder::new();
    builder
      .add_step(Step::new("a").with_output("o").with_command("gen"))
      .unwrap();
    builder
      .add_step(Step::new("b").with_input("i").with_output("o").with_command(b_command))
      .unwrap();
    builder
      .add_step(Step::new("c").with_input("i").with_output("o").with_command("route"))
      .unwrap();
    builder
      .add_step(Step::new("d").with_input("x").with_input("y").with_command("sign"))
      .unwrap();
    builder
      .add_step(Step::new("lonely").with_command("lint"))
      .unwrap();
    builder.connect("a", "o", "b", "i").unwrap();
    builder.connect("a", "o", "c", "i").unwrap();
    builder.connect("b", "o", "d", "x").unwrap();
    builder.connect("c", "o", "d", "y").unwrap();
    builder.build()
  }

  fn all(graph: &Graph) -> HashMap<String, Fingerprint> {
    let order = graph.topological_order().unwrap();
    FingerprintEngine::compute_all(graph, &order).unwrap().into_map()
  }

  #[test]
  fn fingerprint_is_64_hex() {
    let fps = all(&diamond("synth"));
    for fp in fps.values() {
      assert_eq!(fp.as_str().len(), Fingerprint::LEN);
      assert!(Fingerprint::parse(fp.as_str()).is_ok());
      assert_eq!(fp.short().len(), FINGERPRINT_SHORT_LEN);
    }
  }

  #[test]
  fn deterministic_across_engines() {
    let graph = diamond("synth");
    assert_eq!(all(&graph), all(&graph));
    assert_eq!(all(&graph), all(&diamond("synth")));
  }

  #[test]
  fn change_propagates_downstream_only() {
    let before = all(&diamond("synth"));
    let after = all(&diamond("synth --fast"));

    assert_eq!(before["a"], after["a"]);
    assert_eq!(before["c"], after["c"]);
    assert_eq!(before["lonely"], after["lonely"]);
    assert_ne!(before["b"], after["b"]);
    assert_ne!(before["d"], after["d"]);
  }

  #[test]
  fn name_is_not_hashed() {
    let a = fingerprint_of(&Step::new("one").with_command("x"), &[]);
    let b = fingerprint_of(&Step::new("two").with_command("x"), &[]);
    assert_eq!(a, b);
  }

  #[test]
  fn param_order_is_irrelevant() {
    let a = Step::new("s").with_param("x", 1).with_param("y", "v");
    let b = Step::new("s").with_param("y", "v").with_param("x", 1);
    assert_eq!(fingerprint_of(&a, &[]), fingerprint_of(&b, &[]));

    let c = Step::new("s").with_param("x", ParamValue::Float(1.0)).with_param("y", "v");
    assert_ne!(fingerprint_of(&a, &[]), fingerprint_of(&c, &[]));
  }

  #[test]
  fn nan_param_differs_from_nan_string() {
    let float = Step::new("s").with_param("k", f64::NAN);
    let string = Step::new("s").with_param("k", "NaN");
    assert_ne!(fingerprint_of(&float, &[]), fingerprint_of(&string, &[]));
  }

  #[test]
  fn fan_in_order_is_irrelevant() {
    // Same steps, d's inputs wired in the opposite order
    let mut builder = GraphBuilder::new();
    builder.add_step(Step::new("b").with_output("o").with_command("x")).unwrap();
    builder.add_step(Step::new("c").with_output("o").with_command("y")).unwrap();
    builder.add_step(Step::new("d").with_input("p").with_input("q")).unwrap();
    builder.connect("b", "o", "d", "p").unwrap();
    builder.connect("c", "o", "d", "q").unwrap();
    let first = all(&builder.build());

    let mut builder = GraphBuilder::new();
    builder.add_step(Step::new("c").with_output("o").with_command("y")).unwrap();
    builder.add_step(Step::new("b").with_output("o").with_command("x")).unwrap();
    builder.add_step(Step::new("d").with_input("p").with_input("q")).unwrap();
    builder.connect("c", "o", "d", "p").unwrap();
    builder.connect("b", "o", "d", "q").unwrap();
    let second = all(&builder.build());

    assert_eq!(first["d"], second["d"]);
  }

  #[test]
  fn trailing_whitespace_is_irrelevant() {
    let a = Step::new("s").with_command("make all   ");
    let b = Step::new("s").with_command("make all").with_command("");
    assert_eq!(fingerprint_of(&a, &[]), fingerprint_of(&b, &[]));
  }

  #[test]
  fn out_of_order_is_unresolved() {
    let graph = diamond("synth");
    let mut engine = FingerprintEngine::new();
    let err = engine.fingerprint(graph.get("b").unwrap(), &graph).unwrap_err();
    assert_eq!(
      err,
      FingerprintError::UnresolvedDependency {
        step: "b".into(),
        missing: "a".into(),
      }
    );
  }

  #[test]
  fn parse_rejects_bad_input() {
    assert!(Fingerprint::parse("abc").is_err());
    assert!(Fingerprint::parse(&"G".repeat(64)).is_err());
    assert!(Fingerprint::parse(&"A".repeat(64)).is_err());
    assert!(Fingerprint::parse(&"a".repeat(64)).is_ok());
  }
}
