//! Tolerant YAML loading
//!
//! Every on-disk document eitri reads (`eitri.yaml`, `.eitri.yaml`,
//! `docker-compose.yaml`) goes through [`load_yaml`]. Missing files are
//! an empty mapping, not an error; parse failures are retried once with
//! a fallback text encoding before giving up.

use crate::error::{Error, Result};
use serde_yaml::{Mapping, Value};
use std::path::Path;
use tracing::debug;

/// Load a YAML file into a mapping.
///
/// - A missing file yields an empty mapping.
/// - The document is parsed safely; tags never execute code.
/// - If the raw bytes fail to parse (a locale-dependent encoding or a
///   BOM left behind by an editor), the file is reinterpreted exactly
///   once as BOM-stripped UTF-8 with invalid sequences replaced. A
///   second failure is a [`Error::Config`].
///
/// Either a fully parsed mapping comes back or an error does - never a
/// partial result.
pub fn load_yaml(path: &Path) -> Result<Mapping> {
    if !path.exists() {
        debug!("No config at {}, using empty mapping", path.display());
        return Ok(Mapping::new());
    }

    let bytes = std::fs::read(path)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

    let value = match serde_yaml::from_slice::<Value>(&bytes) {
        Ok(value) => value,
        Err(first_err) => {
            debug!(
                "Parse of {} failed ({}), retrying with fallback encoding",
                path.display(),
                first_err
            );
            let text = decode_fallback(&bytes);
            serde_yaml::from_str::<Value>(&text)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?
        }
    };

    into_mapping(value, path)
}

/// Reinterpret raw bytes as UTF-8, stripping a leading BOM and
/// replacing invalid sequences.
fn decode_fallback(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

fn into_mapping(value: Value, path: &Path) -> Result<Mapping> {
    match value {
        Value::Mapping(mapping) => Ok(mapping),
        // An empty document parses as null; treat it like a missing file.
        Value::Null => Ok(Mapping::new()),
        other => Err(Error::Config(format!(
            "{}: expected a mapping, found {}",
            path.display(),
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Fetch a string value out of a mapping, `""` when absent.
pub fn str_value<'a>(mapping: &'a Mapping, key: &str) -> &'a str {
    mapping.get(key).and_then(Value::as_str).unwrap_or("")
}
