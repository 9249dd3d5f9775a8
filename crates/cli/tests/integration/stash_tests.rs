//! Stash command integration tests.

use predicates::prelude::*;

use super::common::{TestEnv, read};

#[test]
fn stash_round_trip() {
  let env = TestEnv::gcd();
  let stash = env.stash_path();

  env
    .flowgen_cmd()
    .args(["stash", "init", "-d"])
    .arg(&stash)
    .assert()
    .success()
    .stdout(predicate::str::contains("Initialized stash"));
  assert!(env.build_path().join(".flowgen-stash").exists());

  env.fake_outputs("1-synth", "netlist.v", "module gcd; endmodule\n");
  env
    .flowgen_cmd()
    .args(["stash", "push", "-s", "synth", "-m", "golden"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Stashed synth as"));

  env
    .flowgen_cmd()
    .args(["stash", "status"])
    .assert()
    .success()
    .stdout(predicate::str::contains("synth"))
    .stdout(predicate::str::contains("golden"));

  env
    .flowgen_cmd()
    .arg("status")
    .assert()
    .success()
    .stdout(predicate::str::contains("[stashed]"));

  // wipe the step and restore it by hash prefix
  std::fs::remove_dir_all(env.build_path().join("1-synth")).unwrap();
  let fingerprint = env.fingerprint("synth");
  env
    .flowgen_cmd()
    .args(["stash", "pop", "--hash", &fingerprint[..12]])
    .assert()
    .success()
    .stdout(predicate::str::contains("Restored"));

  assert_eq!(
    read(&env.build_path().join("1-synth/outputs/netlist.v")),
    "module gcd; endmodule\n"
  );
  let rows = env.json(&["status"]);
  assert_eq!(rows[1]["state"], "up_to_date");

  env
    .flowgen_cmd()
    .args(["stash", "drop", "--hash", &fingerprint])
    .assert()
    .success()
    .stdout(predicate::str::contains("Dropped"));

  env
    .flowgen_cmd()
    .args(["stash", "status"])
    .assert()
    .success()
    .stdout(predicate::str::contains("is empty"));
}

#[test]
fn second_push_is_deduplicated() {
  let env = TestEnv::gcd();
  env
    .flowgen_cmd()
    .arg("--stash")
    .arg(env.stash_path())
    .args(["stash", "init", "-d"])
    .arg(env.stash_path())
    .assert()
    .success();
  env.fake_outputs("0-rtl", "design.v", "v1");

  env.flowgen_cmd().args(["stash", "push", "-s", "rtl"]).assert().success();
  env
    .flowgen_cmd()
    .args(["stash", "push", "-s", "0", "-m", "again"])
    .assert()
    .success()
    .stdout(predicate::str::contains("already stashed"));

  let entries = env.json(&["stash", "status"]);
  let entries = entries.as_array().unwrap();
  assert_eq!(entries.len(), 1);
  assert_eq!(entries[0]["message"], "again");
}

#[test]
fn stash_env_var_is_honored() {
  let env = TestEnv::gcd();
  let stash = env.stash_path();
  env.flowgen_cmd().args(["stash", "init", "-d"]).arg(&stash).assert().success();
  std::fs::remove_file(env.build_path().join(".flowgen-stash")).unwrap();

  env
    .flowgen_cmd()
    .env("FLOWGEN_STASH", &stash)
    .args(["stash", "status"])
    .assert()
    .success()
    .stdout(predicate::str::contains("is empty"));
}

#[test]
fn pop_symlink_links_outputs() {
  let env = TestEnv::gcd();
  env
    .flowgen_cmd()
    .args(["stash", "init", "-d"])
    .arg(env.stash_path())
    .assert()
    .success();
  env.fake_outputs("0-rtl", "design.v", "linked");
  env.flowgen_cmd().args(["stash", "push", "-s", "rtl"]).assert().success();

  let fingerprint = env.fingerprint("rtl");
  env
    .flowgen_cmd()
    .args(["stash", "pop", "--symlink", "--hash", &fingerprint])
    .assert()
    .success();

  let outputs = env.build_path().join("0-rtl/outputs");
  assert!(std::fs::symlink_metadata(&outputs).unwrap().file_type().is_symlink() || cfg!(windows));
  assert_eq!(read(&outputs.join("design.v")), "linked");
}

#[test]
fn missing_entry_fails() {
  let env = TestEnv::gcd();
  env
    .flowgen_cmd()
    .args(["stash", "init", "-d"])
    .arg(env.stash_path())
    .assert()
    .success();

  env
    .flowgen_cmd()
    .args(["stash", "drop", "--hash", "abcdef"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("no stash entry"));

  env
    .flowgen_cmd()
    .args(["stash", "push", "-s", "nonexistent"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("no step named nonexistent"));
}
