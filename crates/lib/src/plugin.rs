//! Graph factories.
//!
//! A design's graph comes from a named [`GraphFactory`]. The host builds a
//! [`PluginRegistry`], resolves the configured name once and calls the
//! factory once; there is no other dynamic lookup.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::ProjectConfig;
use crate::graph::{Graph, GraphError, GraphSpec};

/// What a factory gets to work with.
#[derive(Debug, Clone)]
pub struct FactoryContext {
  pub design_dir: PathBuf,
  pub construct: PathBuf,
}

impl FactoryContext {
  pub fn new(design_dir: impl Into<PathBuf>, construct: impl Into<PathBuf>) -> Self {
    Self {
      design_dir: design_dir.into(),
      construct: construct.into(),
    }
  }
}

impl From<&ProjectConfig> for FactoryContext {
  fn from(config: &ProjectConfig) -> Self {
    Self::new(&config.design_dir, &config.construct)
  }
}

pub type GraphFactory = fn(&FactoryContext) -> Result<Graph, PluginError>;

#[derive(Debug, Error)]
pub enum PluginError {
  #[error("graph factory {0} is already registered")]
  Duplicate(String),

  #[error("unknown graph factory {name}; registered: {}", .available.join(", "))]
  Unknown { name: String, available: Vec<String> },

  #[error("failed to read construct file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse construct file {path}: {message}")]
  Parse { path: PathBuf, message: String },

  #[error("construct file {path} describes an invalid graph: {source}")]
  Graph {
    path: PathBuf,
    #[source]
    source: GraphError,
  },
}

#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
  factories: BTreeMap<String, GraphFactory>,
}

impl PluginRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry holding the built-in `file` factory.
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    registry.factories.insert("file".to_string(), construct_file);
    registry
  }

  pub fn register(&mut self, name: impl Into<String>, factory: GraphFactory) -> Result<(), PluginError> {
    let name = name.into();
    if self.factories.contains_key(&name) {
      return Err(PluginError::Duplicate(name));
    }
    debug!(factory = %name, "registered graph factory");
    self.factories.insert(name, factory);
    Ok(())
  }

  pub fn resolve(&self, name: &str) -> Result<GraphFactory, PluginError> {
    self.factories.get(name).copied().ok_or_else(|| PluginError::Unknown {
      name: name.to_string(),
      available: self.names().map(str::to_string).collect(),
    })
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.factories.keys().map(String::as_str)
  }

  /// Resolve `name` and run it once.
  pub fn construct(&self, name: &str, ctx: &FactoryContext) -> Result<Graph, PluginError> {
    let factory = self.resolve(name)?;
    let graph = factory(ctx)?;
    info!(factory = name, steps = graph.len(), "constructed graph");
    Ok(graph)
  }
}

/// Built-in factory: read a YAML or JSON [`GraphSpec`] from the construct file.
pub fn construct_file(ctx: &FactoryContext) -> Result<Graph, PluginError> {
  let path = &ctx.construct;
  let content = fs::read_to_string(path).map_err(|source| PluginError::Read {
    path: path.clone(),
    source,
  })?;

  let spec: GraphSpec = if is_json(path) {
    serde_json::from_str(&content).map_err(|e| PluginError::Parse {
      path: path.clone(),
      message: e.to_string(),
    })?
  } else {
    serde_yaml::from_str(&content).map_err(|e| PluginError::Parse {
      path: path.clone(),
      message: e.to_string(),
    })?
  };

  spec.into_graph().map_err(|source| PluginError::Graph {
    path: path.clone(),
    source,
  })
}

fn is_json(path: &Path) -> bool {
  path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
