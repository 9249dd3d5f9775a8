//! Design configuration.
//!
//! A design directory carries a `.flowgen.yml`:
//!
//! ```yaml
//! name: gcd
//! construct: construct.yml
//! factory: file
//! backend: ninja
//! build_dir: build
//! stash: /shared/stash
//! ```
//!
//! `FLOWGEN_STASH` and `FLOWGEN_BACKEND` override the file; command-line flags
//! override both and are applied by the caller.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::backend::{BackendError, BackendKind};
use crate::consts::{CONFIG_FILENAME, ENV_BACKEND, ENV_STASH};

pub const DEFAULT_FACTORY: &str = "file";
pub const DEFAULT_BUILD_DIR: &str = "build";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("no {CONFIG_FILENAME} in {0}")]
  DesignNotFound(PathBuf),

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("{0} does not name a construct file")]
  MissingConstruct(PathBuf),

  #[error("construct file {0} does not exist")]
  ConstructNotFound(PathBuf),

  #[error("invalid backend in configuration: {0}")]
  Backend(#[from] BackendError),
}

/// Raw contents of `.flowgen.yml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub construct: Option<PathBuf>,
  #[serde(default)]
  pub factory: Option<String>,
  #[serde(default)]
  pub backend: Option<String>,
  #[serde(default)]
  pub build_dir: Option<PathBuf>,
  #[serde(default)]
  pub stash: Option<PathBuf>,
}

/// Resolved configuration with paths anchored at the design directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectConfig {
  pub design_dir: PathBuf,
  pub name: String,
  pub construct: PathBuf,
  pub factory: String,
  pub backend: BackendKind,
  pub build_dir: PathBuf,
  pub stash: Option<PathBuf>,
}

impl ProjectConfig {
  /// Load `.flowgen.yml` from `design_dir` and apply environment overrides.
  pub fn load(design_dir: &Path) -> Result<Self, ConfigError> {
    let path = design_dir.join(CONFIG_FILENAME);
    if !path.is_file() {
      return Err(ConfigError::DesignNotFound(design_dir.to_path_buf()));
    }
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
      path: path.clone(),
      source,
    })?;
    let file: ConfigFile = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.clone(),
      source,
    })?;

    let config = Self::resolve(design_dir, file)?;
    debug!(design = %config.name, backend = %config.backend, factory = %config.factory, "loaded configuration");
    Ok(config)
  }

  fn resolve(design_dir: &Path, file: ConfigFile) -> Result<Self, ConfigError> {
    let design_dir = dunce::canonicalize(design_dir).unwrap_or_else(|_| design_dir.to_path_buf());

    let construct = file
      .construct
      .ok_or_else(|| ConfigError::MissingConstruct(design_dir.join(CONFIG_FILENAME)))?;
    let construct = design_dir.join(construct);
    if !construct.is_file() {
      return Err(ConfigError::ConstructNotFound(construct));
    }

    let backend = match env_var(ENV_BACKEND).or(file.backend) {
      Some(name) => name.parse()?,
      None => BackendKind::default(),
    };
    let stash = env_var(ENV_STASH)
      .map(PathBuf::from)
      .or_else(|| file.stash.map(|p| design_dir.join(p)));

    let name = file.name.unwrap_or_else(|| {
      design_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "design".to_string())
    });

    Ok(Self {
      name,
      construct,
      factory: file.factory.unwrap_or_else(|| DEFAULT_FACTORY.to_string()),
      backend,
      build_dir: design_dir.join(file.build_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_BUILD_DIR))),
      stash,
      design_dir,
    })
  }
}

fn env_var(key: &str) -> Option<String> {
  env::var(key).ok().filter(|v| !v.trim().is_empty())
}
