//! flowgen-lib: step graphs, fingerprints, build-file generation and the
//! output stash.
//!
//! - `graph`: immutable DAG of steps wired port to port
//! - `fingerprint`: deterministic per-step hashes that propagate downstream
//! - `orchestrator`: validate, order, fingerprint and emit a build file
//! - `backend`: Make and Ninja emitters
//! - `stash`: content-addressed store of step outputs shared between users

pub mod backend;
pub mod config;
pub mod consts;
pub mod fingerprint;
pub mod graph;
pub mod orchestrator;
pub mod plan;
pub mod platform;
pub mod plugin;
pub mod stash;
pub mod util;
