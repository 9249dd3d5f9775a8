//! Crate-wide constants.

pub const APP_NAME: &str = "flowgen";

/// Design metadata file read from the design directory.
pub const CONFIG_FILENAME: &str = ".flowgen.yml";

/// Number of hex characters shown when a fingerprint is printed in a table.
pub const FINGERPRINT_SHORT_LEN: usize = 12;

/// Per-step file holding the fingerprint of the last materialization.
pub const STAMP_FILENAME: &str = ".stamp";

pub const STEP_INPUTS_DIR: &str = "inputs";
pub const STEP_OUTPUTS_DIR: &str = "outputs";

/// Shell script holding a step's command lines, written by the build recipe.
pub const STEP_SCRIPT_FILENAME: &str = "run.sh";

/// File in a build directory pointing at the stash it uses.
pub const STASH_POINTER_FILENAME: &str = ".flowgen-stash";

pub const ENV_STASH: &str = "FLOWGEN_STASH";
pub const ENV_BACKEND: &str = "FLOWGEN_BACKEND";
