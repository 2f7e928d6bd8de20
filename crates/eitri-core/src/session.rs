//! Ephemeral session lifetime
//!
//! A session owns a private temporary directory holding the merged
//! compose file and the template Dockerfile it references. The
//! directory is released when the session is dropped, so every exit
//! path - clean, error, interrupt - tears it down.

use crate::compose;
use crate::config;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::toolkit::Toolkit;
use crate::workspace::Workspace;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Template build file, materialized into each session directory.
const DOCKERFILE_TEMPLATE: &str = include_str!("../templates/Dockerfile");

/// Name of the merged compose file inside the session directory
const MERGED_COMPOSE_FILE: &str = "docker-compose.yml";

/// Builds a [`Session`] from a workspace and a resolved toolkit.
///
/// Validation happens before any resource is allocated: a malformed
/// toolkit fails the build without creating a temporary directory, so
/// teardown for a session that never existed is a no-op.
pub struct SessionBuilder {
    workspace: Workspace,
    toolkit: Toolkit,
    environment: Environment,
    temp_root: Option<PathBuf>,
    preload: bool,
}

impl SessionBuilder {
    pub fn new(workspace: Workspace, toolkit: Toolkit, environment: Environment) -> Self {
        Self {
            workspace,
            toolkit,
            environment,
            temp_root: None,
            preload: true,
        }
    }

    /// Allocate the session directory under `root` instead of the
    /// system temp location.
    pub fn temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    /// Skip the base-image pre-fetch.
    pub fn skip_preload(mut self) -> Self {
        self.preload = false;
        self
    }

    /// Construct the session: validate and merge the toolkit compose
    /// document, allocate the temp directory, write the merged file and
    /// template, and pre-fetch the toolkit's base image.
    pub async fn build(self) -> Result<Session> {
        let toolkit_compose = self.toolkit.compose_path();
        if !toolkit_compose.exists() {
            return Err(Error::InvalidToolkit(format!(
                "{} has no {}",
                self.toolkit.path().display(),
                crate::toolkit::TOOLKIT_COMPOSE_FILE
            )));
        }
        let doc = config::load_yaml(&toolkit_compose)?;

        // Validate before allocating anything.
        let image = compose::entrypoint_image(&doc)?;
        debug!("Toolkit base image: {}", image);

        let tmpdir = match &self.temp_root {
            Some(root) => tempfile::Builder::new().prefix("eitri-").tempdir_in(root)?,
            None => tempfile::Builder::new().prefix("eitri-").tempdir()?,
        };

        let dockerfile = tmpdir.path().join("Dockerfile");
        std::fs::write(&dockerfile, DOCKERFILE_TEMPLATE)?;

        let merged = compose::merge(doc, &self.workspace, &dockerfile)?;
        let compose_path = tmpdir.path().join(MERGED_COMPOSE_FILE);
        std::fs::write(&compose_path, serde_yaml::to_string(&Value::Mapping(merged))?)?;
        debug!("Merged compose file at {}", compose_path.display());

        if self.preload {
            preload(&self.environment, &self.toolkit, &toolkit_compose).await;
        }

        Ok(Session {
            workspace: self.workspace,
            toolkit: self.toolkit,
            environment: self.environment,
            tmpdir,
            compose_path,
        })
    }
}

/// Pre-fetch the toolkit's declared base image against the original
/// (unmerged) compose file so the first build starts from a warm
/// layer. Best-effort: a failure is a warning, not an error.
async fn preload(environment: &Environment, toolkit: &Toolkit, toolkit_compose: &Path) {
    info!("Preloading toolkit {}...", toolkit.name());
    let pulled = Command::new(environment.compose_program())
        .arg("-f")
        .arg(toolkit_compose)
        .arg("pull")
        .stdin(Stdio::null())
        .status()
        .await;
    match pulled {
        Ok(status) if status.success() => {}
        Ok(status) => warn!("Toolkit preload exited with {}, continuing", status),
        Err(e) => warn!("Toolkit preload failed ({}), continuing", e),
    }
}

/// A live session: the merged compose file plus the resources it needs.
///
/// Dropping the session removes the temporary directory.
pub struct Session {
    workspace: Workspace,
    toolkit: Toolkit,
    environment: Environment,
    tmpdir: TempDir,
    compose_path: PathBuf,
}

impl Session {
    /// Path of the merged compose file, the source of truth for every
    /// build/run in this session.
    pub fn compose_path(&self) -> &Path {
        &self.compose_path
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn toolkit(&self) -> &Toolkit {
        &self.toolkit
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Tear the session down eagerly, surfacing removal errors that a
    /// plain drop would swallow.
    pub fn close(self) -> Result<()> {
        self.tmpdir.close()?;
        Ok(())
    }
}
