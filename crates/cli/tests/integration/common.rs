//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Three-step design: `rtl` feeds `synth`, which feeds `pnr`.
pub const GCD_CONSTRUCT: &str = r#"
name: gcd
steps:
  - name: rtl
    outputs: [design.v]
    commands: ["echo 'module gcd; endmodule' > outputs/design.v"]
  - name: synth
    inputs: [design.v]
    outputs: [netlist.v]
    commands: ["cp inputs/design.v outputs/netlist.v"]
    parameters:
      clock_period: 1.0
  - name: pnr
    inputs: [netlist.v]
    outputs: [design.gds]
    commands: ["cp inputs/netlist.v outputs/design.gds"]
edges:
  - from: rtl.design.v
    to: synth.design.v
  - by_name: [synth, pnr]
"#;

/// Isolated design directory.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// A design directory holding `construct` and a config pointing at it.
  pub fn with_construct(construct: &str) -> Self {
    let env = Self {
      temp: TempDir::new().unwrap(),
    };
    env.write_file(".flowgen.yml", "name: gcd\nconstruct: construct.yml\n");
    env.write_file("construct.yml", construct);
    env
  }

  pub fn gcd() -> Self {
    Self::with_construct(GCD_CONSTRUCT)
  }

  /// Write a file relative to the design directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn design_path(&self) -> PathBuf {
    dunce::canonicalize(self.temp.path()).unwrap()
  }

  pub fn build_path(&self) -> PathBuf {
    self.design_path().join("build")
  }

  /// Stash directory next to the design, not created.
  pub fn stash_path(&self) -> PathBuf {
    self.design_path().join("stash")
  }

  /// Pretend the native build ran `step`: write one output file.
  pub fn fake_outputs(&self, step_dir: &str, file: &str, content: &str) -> PathBuf {
    let outputs = self.build_path().join(step_dir).join("outputs");
    std::fs::create_dir_all(&outputs).unwrap();
    std::fs::write(outputs.join(file), content).unwrap();
    outputs
  }

  /// Get a pre-configured Command for the flowgen binary, run from the design
  /// directory with no stash or backend inherited from the environment.
  pub fn flowgen_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("flowgen");
    cmd.current_dir(self.design_path());
    cmd.env_remove("FLOWGEN_STASH");
    cmd.env_remove("FLOWGEN_BACKEND");
    cmd.env_remove("RUST_LOG");
    cmd
  }

  /// Run `flowgen -o json <args>` and parse stdout.
  pub fn json(&self, args: &[&str]) -> serde_json::Value {
    let output = self.flowgen_cmd().args(["-o", "json"]).args(args).output().unwrap();
    assert!(
      output.status.success(),
      "flowgen {:?} failed: {}",
      args,
      String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
  }

  /// Current fingerprint of `step` according to `flowgen list`.
  pub fn fingerprint(&self, step: &str) -> String {
    let rows = self.json(&["list"]);
    rows
      .as_array()
      .unwrap()
      .iter()
      .find(|r| r["name"] == step)
      .unwrap_or_else(|| panic!("no step {step}"))["fingerprint"]
      .as_str()
      .unwrap()
      .to_string()
  }
}

pub fn read(path: &Path) -> String {
  std::fs::read_to_string(path).unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e))
}
