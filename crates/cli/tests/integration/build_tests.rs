//! Build, list and status integration tests.

use predicates::prelude::*;

use super::common::{TestEnv, read};

#[test]
fn build_writes_makefile_with_dependencies() {
  let env = TestEnv::gcd();

  env
    .flowgen_cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("Steps: 3"))
    .stdout(predicate::str::contains(r#"Targets: run "make list" and "make status""#));

  let makefile = read(&env.build_path().join("Makefile"));
  assert!(makefile.contains("1-synth/.stamp: 0-rtl/.stamp $(call flowgen_stale,1-synth,"));
  assert!(makefile.contains("2-pnr/.stamp: 1-synth/.stamp $(call flowgen_stale,2-pnr,"));
  assert!(makefile.contains("ln -sfn ../../0-rtl/outputs/design.v 1-synth/inputs/design.v"));
  assert!(makefile.contains("all: 0-rtl/.stamp 1-synth/.stamp 2-pnr/.stamp"));
}

#[test]
fn build_with_ninja_backend() {
  let env = TestEnv::gcd();

  env
    .flowgen_cmd()
    .args(["build", "--backend", "ninja"])
    .assert()
    .success()
    .stdout(predicate::str::contains(r#"run "ninja list" and "ninja status""#));

  let ninja = read(&env.build_path().join("build.ninja"));
  assert!(ninja.contains("build 1-synth/.stamp: step | 0-rtl/.stamp"));
  assert!(ninja.contains("default all"));
  assert!(!env.build_path().join("Makefile").exists());
}

#[test]
fn backend_from_config_and_env() {
  let env = TestEnv::gcd();
  env.write_file(".flowgen.yml", "construct: construct.yml\nbackend: ninja\nbuild_dir: out\n");

  env.flowgen_cmd().arg("build").assert().success();
  assert!(env.design_path().join("out/build.ninja").exists());

  env
    .flowgen_cmd()
    .env("FLOWGEN_BACKEND", "make")
    .arg("build")
    .assert()
    .success();
  assert!(env.design_path().join("out/Makefile").exists());
}

#[test]
fn build_dir_flag_overrides_config() {
  let env = TestEnv::gcd();
  let elsewhere = env.design_path().join("elsewhere");

  env
    .flowgen_cmd()
    .arg("build")
    .arg("--build-dir")
    .arg(&elsewhere)
    .assert()
    .success();
  assert!(elsewhere.join("Makefile").exists());
}

#[test]
fn build_json_output() {
  let env = TestEnv::gcd();
  let outcome = env.json(&["build"]);
  assert_eq!(outcome["backend"], "make");
  assert_eq!(outcome["plan"]["steps"].as_array().unwrap().len(), 3);
  assert_eq!(outcome["plan"]["steps"][2]["upstream"][0]["name"], "synth");
}

#[test]
fn rebuild_after_failure_keeps_previous_file() {
  let env = TestEnv::gcd();
  env.flowgen_cmd().arg("build").assert().success();
  let before = read(&env.build_path().join("Makefile"));

  env.write_file(
    "construct.yml",
    "steps:\n  - {name: a, inputs: [i], outputs: [o]}\nedges:\n  - {from: a.o, to: a.i}\n",
  );
  env
    .flowgen_cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("a -> a"));

  assert_eq!(read(&env.build_path().join("Makefile")), before);
}

#[test]
fn list_json_has_fingerprints() {
  let env = TestEnv::gcd();
  let rows = env.json(&["list"]);
  let rows = rows.as_array().unwrap();
  assert_eq!(rows.len(), 3);
  assert_eq!(rows[0]["name"], "rtl");
  assert_eq!(rows[0]["fingerprint"].as_str().unwrap().len(), 64);
}

#[test]
fn status_follows_stamps_and_edits() {
  let env = TestEnv::gcd();
  let rtl = env.fingerprint("rtl");
  let synth = env.fingerprint("synth");
  env.write_file("build/0-rtl/.stamp", &format!("{rtl}\n"));
  env.write_file("build/1-synth/.stamp", &format!("{synth}\n"));

  let rows = env.json(&["status"]);
  assert_eq!(rows[0]["state"], "up_to_date");
  assert_eq!(rows[1]["state"], "up_to_date");
  assert_eq!(rows[2]["state"], "not_built");

  // changing a parameter invalidates synth and everything after it
  env.write_file("construct.yml", &super::common::GCD_CONSTRUCT.replace("clock_period: 1.0", "clock_period: 2.0"));
  let rows = env.json(&["status"]);
  assert_eq!(rows[0]["state"], "up_to_date");
  assert_eq!(rows[1]["state"], "stale");

  env
    .flowgen_cmd()
    .arg("status")
    .assert()
    .success()
    .stdout(predicate::str::contains("needs rebuild"))
    .stdout(predicate::str::contains("Up to date: 1/3"));
}
