//! The user's project directory
//!
//! A workspace is the directory mounted into the toolkit container as
//! the build context. Its optional `.eitri.yaml` carries local
//! overrides; the only recognized key is `pre-install`, a shell snippet
//! injected as a build argument.

use crate::config;
use crate::error::Result;
use serde_yaml::Mapping;
use std::path::{Path, PathBuf};

/// Override file at the workspace root
pub const WORKSPACE_CONFIG_FILE: &str = ".eitri.yaml";

/// The user's project directory. Immutable after load; one per
/// invocation.
#[derive(Debug, Clone)]
pub struct Workspace {
    path: PathBuf,
    config: Mapping,
}

impl Workspace {
    /// Load a workspace. The directory must exist; the path is
    /// canonicalized so the compose build context is absolute.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().canonicalize()?;
        let config = config::load_yaml(&path.join(WORKSPACE_CONFIG_FILE))?;
        Ok(Self { path, config })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Mapping {
        &self.config
    }

    /// The `pre-install` shell snippet, `""` when not configured.
    pub fn pre_install(&self) -> &str {
        config::str_value(&self.config, "pre-install")
    }
}

impl std::fmt::Display for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn pre_install_defaults_to_empty() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::load(dir.path()).unwrap();
        assert_eq!(workspace.pre_install(), "");
    }

    #[test]
    fn pre_install_reads_the_override_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(WORKSPACE_CONFIG_FILE),
            "pre-install: apt-get update\n",
        )
        .unwrap();

        let workspace = Workspace::load(dir.path()).unwrap();
        assert_eq!(workspace.pre_install(), "apt-get update");
    }

    #[test]
    fn path_is_absolute() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::load(dir.path()).unwrap();
        assert!(workspace.path().is_absolute());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(Workspace::load(dir.path().join("gone")).is_err());
    }
}
