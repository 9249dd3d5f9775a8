//! Resolution of global flags against the design configuration.
//!
//! Precedence for every setting is flag, then environment, then
//! `.flowgen.yml`. The stash root additionally falls back to the pointer file
//! that `flowgen stash init`/`link` leave in the build directory.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

use flowgen_lib::backend::BackendKind;
use flowgen_lib::config::{DEFAULT_BUILD_DIR, ProjectConfig};
use flowgen_lib::consts::{CONFIG_FILENAME, ENV_STASH};
use flowgen_lib::graph::Graph;
use flowgen_lib::orchestrator::Orchestrator;
use flowgen_lib::plan::BuildPlan;
use flowgen_lib::plugin::{FactoryContext, PluginRegistry};
use flowgen_lib::stash::Stash;
use flowgen_lib::stash::pointer::read_pointer;

use crate::output::OutputFormat;

/// Flags shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
  pub design: PathBuf,
  pub backend: Option<String>,
  pub build_dir: Option<PathBuf>,
  pub stash: Option<PathBuf>,
  pub output: OutputFormat,
}

/// A loaded design: configuration plus the constructed graph.
pub struct Design {
  pub config: ProjectConfig,
  pub graph: Graph,
}

impl Design {
  pub fn plan(&self) -> Result<BuildPlan> {
    Orchestrator::new(&self.graph)
      .plan()
      .with_context(|| format!("Failed to plan design {}", self.config.name))
  }
}

impl GlobalArgs {
  /// Load `.flowgen.yml` and construct the graph through its factory.
  pub fn load_design(&self) -> Result<Design> {
    let config = ProjectConfig::load(&self.design).context("Failed to load design configuration")?;
    let registry = PluginRegistry::with_builtins();
    let graph = registry
      .construct(&config.factory, &FactoryContext::from(&config))
      .with_context(|| format!("Failed to construct graph for {}", config.name))?;
    Ok(Design { config, graph })
  }

  /// The configuration if the design directory has one.
  pub fn try_config(&self) -> Result<Option<ProjectConfig>> {
    if !self.design.join(CONFIG_FILENAME).is_file() {
      return Ok(None);
    }
    ProjectConfig::load(&self.design)
      .map(Some)
      .context("Failed to load design configuration")
  }

  pub fn backend(&self, config: &ProjectConfig) -> Result<BackendKind> {
    match &self.backend {
      Some(name) => name.parse().context("Invalid --backend"),
      None => Ok(config.backend),
    }
  }

  pub fn build_dir(&self, config: Option<&ProjectConfig>) -> PathBuf {
    match (&self.build_dir, config) {
      (Some(dir), _) => dir.clone(),
      (None, Some(config)) => config.build_dir.clone(),
      (None, None) => self.design.join(DEFAULT_BUILD_DIR),
    }
  }

  /// Where the stash lives, if anything says so.
  pub fn stash_root(&self, config: Option<&ProjectConfig>, build_dir: &Path) -> Result<Option<PathBuf>> {
    if let Some(root) = &self.stash {
      return Ok(Some(root.clone()));
    }
    if let Some(root) = env::var_os(ENV_STASH).filter(|v| !v.is_empty()) {
      return Ok(Some(PathBuf::from(root)));
    }
    if let Some(root) = config.and_then(|c| c.stash.clone()) {
      return Ok(Some(root));
    }
    let pointer = read_pointer(build_dir).context("Failed to read stash pointer")?;
    if let Some(root) = &pointer {
      debug!(stash = %root.display(), "using stash recorded in build directory");
    }
    Ok(pointer)
  }

  pub fn open_stash(&self, config: Option<&ProjectConfig>, build_dir: &Path) -> Result<Stash> {
    let Some(root) = self.stash_root(config, build_dir)? else {
      bail!("No stash configured. Pass --stash, set {ENV_STASH}, or run `flowgen stash init -d <dir>`");
    };
    Stash::open(&root).with_context(|| format!("Failed to open stash at {}", root.display()))
  }
}
