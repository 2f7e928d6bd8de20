//! Installed toolkit definitions
//!
//! A toolkit directory holds an optional `eitri.yaml` (metadata) and a
//! required `docker-compose.yaml` defining the `entrypoint` service.

use crate::config;
use crate::error::Result;
use serde_yaml::Mapping;
use std::path::{Path, PathBuf};

/// Metadata file inside a toolkit directory
pub const TOOLKIT_CONFIG_FILE: &str = "eitri.yaml";
/// Compose document inside a toolkit directory
pub const TOOLKIT_COMPOSE_FILE: &str = "docker-compose.yaml";

const DEFAULT_VERSION: &str = "0.1.0";

/// An installed toolkit. Immutable after load.
#[derive(Debug, Clone)]
pub struct Toolkit {
    path: PathBuf,
    config: Mapping,
    name: String,
    version: String,
}

impl Toolkit {
    /// Load a toolkit from its directory.
    ///
    /// `eitri.yaml` is optional; when present its `name:` and
    /// `version:` keys override the defaults (the directory name and
    /// `0.1.0`).
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = config::load_yaml(&path.join(TOOLKIT_CONFIG_FILE))?;

        let name = match config::str_value(&config, "name") {
            "" => path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| "toolkit".to_string()),
            name => name.to_string(),
        };
        let version = match config::str_value(&config, "version") {
            "" => DEFAULT_VERSION.to_string(),
            version => version.to_string(),
        };

        Ok(Self {
            path,
            config,
            name,
            version,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Mapping {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Path of the toolkit's compose document.
    pub fn compose_path(&self) -> PathBuf {
        self.path.join(TOOLKIT_COMPOSE_FILE)
    }
}
