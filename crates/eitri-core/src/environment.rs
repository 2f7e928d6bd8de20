//! Host execution context
//!
//! Discovers the active container engine context, locates the compose
//! executable, and resolves installed toolkits from the storage
//! directory. The storage root is injected at construction so the rest
//! of the crate never touches a hidden global path.

use crate::error::{Error, Result};
use crate::toolkit::Toolkit;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Container engine CLI
const ENGINE_PROGRAM: &str = "docker";
/// Compose tool located on PATH
const COMPOSE_PROGRAM: &str = "docker-compose";

/// Host execution context, captured at process start.
#[derive(Debug, Clone)]
pub struct Environment {
    toolkit_root: PathBuf,
    docker_context: String,
    compose_program: PathBuf,
}

#[derive(Deserialize)]
struct ContextInfo {
    #[serde(rename = "Name")]
    name: String,
}

impl Environment {
    /// Assemble an environment from already-known parts. Used by tests
    /// and by anything that wants to bypass host discovery.
    pub fn new(
        toolkit_root: impl Into<PathBuf>,
        docker_context: impl Into<String>,
        compose_program: impl Into<PathBuf>,
    ) -> Self {
        Self {
            toolkit_root: toolkit_root.into(),
            docker_context: docker_context.into(),
            compose_program: compose_program.into(),
        }
    }

    /// Discover the host context: compose executable on PATH, active
    /// engine context name, toolkit storage root (created if absent).
    pub async fn detect(toolkit_root: impl Into<PathBuf>) -> Result<Self> {
        let toolkit_root = toolkit_root.into();
        std::fs::create_dir_all(&toolkit_root)?;

        let compose_program = which::which(COMPOSE_PROGRAM).map_err(|_| {
            Error::Environment(format!("{} not found in PATH", COMPOSE_PROGRAM))
        })?;
        debug!("Using compose executable {}", compose_program.display());

        let output = Command::new(ENGINE_PROGRAM)
            .args(["context", "inspect"])
            .output()
            .await
            .map_err(|e| {
                Error::Environment(format!("{} is unreachable: {}", ENGINE_PROGRAM, e))
            })?;
        if !output.status.success() {
            return Err(Error::Environment(format!(
                "`{} context inspect` exited with {}: {}",
                ENGINE_PROGRAM,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let docker_context = parse_context_name(&output.stdout)?;
        debug!("Active engine context: {}", docker_context);

        Ok(Self {
            toolkit_root,
            docker_context,
            compose_program,
        })
    }

    /// Default per-user toolkit storage root, `~/.config/eitri/envs`.
    pub fn default_toolkit_root() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".config").join("eitri").join("envs"))
            .ok_or_else(|| Error::Environment("cannot determine home directory".to_string()))
    }

    pub fn toolkit_root(&self) -> &Path {
        &self.toolkit_root
    }

    pub fn docker_context(&self) -> &str {
        &self.docker_context
    }

    pub fn compose_program(&self) -> &Path {
        &self.compose_program
    }

    /// Resolve an installed toolkit.
    ///
    /// Storage entries are enumerated in lexicographic order so the
    /// choice is deterministic across hosts. With `name`, the matching
    /// directory is selected; without, the first entry is.
    pub fn resolve_toolkit(&self, name: Option<&str>) -> Result<Toolkit> {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&self.toolkit_root)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        entries.sort();

        let path = match name {
            Some(name) => entries
                .iter()
                .find(|path| path.file_name().is_some_and(|f| f == name))
                .ok_or_else(|| {
                    Error::NoToolkit(format!(
                        "'{}' is not installed under {}",
                        name,
                        self.toolkit_root.display()
                    ))
                })?,
            None => entries.first().ok_or_else(|| {
                Error::NoToolkit(format!(
                    "{} is empty, install a toolkit first",
                    self.toolkit_root.display()
                ))
            })?,
        };

        Toolkit::load(path)
    }
}

/// Pull the context name out of `docker context inspect` JSON output:
/// an array of context objects, first entry wins.
fn parse_context_name(raw: &[u8]) -> Result<String> {
    let contexts: Vec<ContextInfo> = serde_json::from_slice(raw)
        .map_err(|e| Error::Environment(format!("unparsable context inspect output: {}", e)))?;
    contexts
        .into_iter()
        .next()
        .map(|context| context.name)
        .ok_or_else(|| Error::Environment("engine reported no contexts".to_string()))
}
