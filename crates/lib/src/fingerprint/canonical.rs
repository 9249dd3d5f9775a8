//! Canonical serialization of a step for fingerprinting.
//!
//! The canonical form is a compact JSON object with bytewise-sorted keys:
//!
//! ```text
//! {"command":[..],"params":{..},"upstream":[..],"version":"flowgen-fingerprint-v2"}
//! ```
//!
//! Rules (changing any of them changes every fingerprint and orphans existing
//! stash entries, so bump [`CANONICAL_VERSION`] when they change):
//! - command lines lose trailing whitespace; trailing empty lines are dropped
//! - parameter keys are sorted; values keep their type
//! - floats use shortest round-trip formatting and `-0.0` becomes `0.0`
//! - non-finite floats become `{"float":"NaN"}`, `{"float":"inf"}` or
//!   `{"float":"-inf"}`; no other parameter value serializes to an object
//! - upstream fingerprints are given by the caller, already sorted by upstream
//!   step name

use std::collections::BTreeMap;

use serde_json::{Number, Value};

use crate::graph::{CommandSpec, ParamValue};

pub const CANONICAL_VERSION: &str = "flowgen-fingerprint-v2";

/// Build the canonical document for a step.
pub fn canonical_form(command: &CommandSpec, params: &BTreeMap<String, ParamValue>, upstream: &[&str]) -> String {
  let mut doc = serde_json::Map::new();
  doc.insert("command".into(), command_value(command));
  doc.insert(
    "params".into(),
    Value::Object(params.iter().map(|(k, v)| (k.clone(), param_value(v))).collect()),
  );
  doc.insert(
    "upstream".into(),
    Value::Array(upstream.iter().map(|fp| Value::String((*fp).to_string())).collect()),
  );
  doc.insert("version".into(), Value::String(CANONICAL_VERSION.into()));
  to_canonical_json(&Value::Object(doc))
}

fn command_value(command: &CommandSpec) -> Value {
  let mut lines: Vec<&str> = command.lines().iter().map(|l| l.trim_end()).collect();
  while lines.last().is_some_and(|l| l.is_empty()) {
    lines.pop();
  }
  Value::Array(lines.into_iter().map(|l| Value::String(l.to_string())).collect())
}

fn param_value(value: &ParamValue) -> Value {
  match value {
    ParamValue::Bool(b) => Value::Bool(*b),
    ParamValue::Int(i) => Value::Number((*i).into()),
    ParamValue::Float(f) => float_value(*f),
    ParamValue::String(s) => Value::String(s.clone()),
    ParamValue::List(items) => Value::Array(items.iter().map(param_value).collect()),
  }
}

fn float_value(f: f64) -> Value {
  let f = if f == 0.0 { 0.0 } else { f };
  match Number::from_f64(f) {
    Some(n) => Value::Number(n),
    None => {
      let label = if f.is_nan() {
        "NaN"
      } else if f > 0.0 {
        "inf"
      } else {
        "-inf"
      };
      let mut tagged = serde_json::Map::new();
      tagged.insert("float".into(), Value::String(label.into()));
      Value::Object(tagged)
    }
  }
}

/// Serialize with object keys sorted and no whitespace.
pub fn to_canonical_json(value: &Value) -> String {
  match value {
    Value::Array(items) => {
      let items: Vec<String> = items.iter().map(to_canonical_json).collect();
      format!("[{}]", items.join(","))
    }
    Value::Object(map) => {
      let sorted: BTreeMap<&String, &Value> = map.iter().collect();
      let items: Vec<String> = sorted
        .into_iter()
        .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), to_canonical_json(v)))
        .collect();
      format!("{{{}}}", items.join(","))
    }
    scalar => scalar.to_string(),
  }
}
