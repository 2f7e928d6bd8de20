//! The merged compose definition
//!
//! A toolkit's compose document declares the `entrypoint` service with
//! a plain `image:`. Per session, that image reference is swapped for a
//! `build:` stanza pointing at the user's workspace, so the session
//! image layers the workspace (and its pre-install hook) on top of the
//! toolkit's base image:
//!
//! ```yaml
//! services:
//!   entrypoint:
//!     build:
//!       context: <workspace path>
//!       dockerfile: <session template>
//!       args:
//!         IMAGE: <original image>
//!         PRE_INSTALL: <workspace pre-install hook or "">
//! ```
//!
//! The rest of the document passes through untouched.

use crate::error::{Error, Result};
use crate::workspace::Workspace;
use serde_yaml::{Mapping, Value};
use std::path::Path;

/// The single service the session builds and runs commands against
pub const ENTRYPOINT_SERVICE: &str = "entrypoint";

/// Build argument carrying the toolkit's original image
pub const ARG_IMAGE: &str = "IMAGE";
/// Build argument carrying the workspace pre-install hook
pub const ARG_PRE_INSTALL: &str = "PRE_INSTALL";

/// Validate that `doc` declares the entrypoint service with an `image`
/// key and return that image reference.
///
/// This runs before any session resource is allocated, so a malformed
/// toolkit never leaves a temp directory behind.
pub fn entrypoint_image(doc: &Mapping) -> Result<String> {
    let services = doc
        .get("services")
        .and_then(Value::as_mapping)
        .ok_or_else(|| Error::InvalidToolkit("compose document has no services".to_string()))?;

    let entrypoint = services
        .get(ENTRYPOINT_SERVICE)
        .and_then(Value::as_mapping)
        .ok_or_else(|| {
            Error::InvalidToolkit(format!(
                "compose document does not define a '{}' service",
                ENTRYPOINT_SERVICE
            ))
        })?;

    entrypoint
        .get("image")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            Error::InvalidToolkit(format!(
                "'{}' service does not declare an image",
                ENTRYPOINT_SERVICE
            ))
        })
}

/// Produce the merged definition: `image` replaced by a `build` stanza
/// referencing the workspace as context and `dockerfile` as the
/// template build file. The input document is otherwise preserved.
pub fn merge(mut doc: Mapping, workspace: &Workspace, dockerfile: &Path) -> Result<Mapping> {
    let image = entrypoint_image(&doc)?;

    let mut args = Mapping::new();
    args.insert(ARG_IMAGE.into(), image.into());
    args.insert(ARG_PRE_INSTALL.into(), workspace.pre_install().into());

    let mut build = Mapping::new();
    build.insert(
        "context".into(),
        workspace.path().display().to_string().into(),
    );
    build.insert("dockerfile".into(), dockerfile.display().to_string().into());
    build.insert("args".into(), Value::Mapping(args));

    // entrypoint_image already proved this chain exists
    let entrypoint = doc
        .get_mut("services")
        .and_then(Value::as_mapping_mut)
        .and_then(|services| services.get_mut(ENTRYPOINT_SERVICE))
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| {
            Error::InvalidToolkit(format!("'{}' service vanished during merge", ENTRYPOINT_SERVICE))
        })?;
    entrypoint.insert("build".into(), Value::Mapping(build));
    entrypoint.remove("image");

    Ok(doc)
}
