//! Launcher config patching.
//!
//! A network's `config.json` is rewritten with two fields:
//!
//! | Field | Value |
//! |---|---|
//! | `AppProtocolVersion` | APV raw token, always |
//! | `BlockchainStoreDirName` | `9c-{network}-rc-v{version}-{timestamp}`, non-`main` networks only |
//!
//! Every other field is carried through unchanged and in its original order.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use toolbelt_schema::{Apv, Network};

use crate::paths::store_dir_name;

/// Field holding the APV token.
pub const APP_PROTOCOL_VERSION: &str = "AppProtocolVersion";
/// Field naming the on-disk chain store directory.
pub const BLOCKCHAIN_STORE_DIR_NAME: &str = "BlockchainStoreDirName";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config {0} not found; the build does not have the expected layout")]
    NotFound(PathBuf),

    #[error("Config document must be a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("APV {version} has no timestamp; cannot name the store directory for network {network}")]
    MissingTimestamp { version: u64, network: String },
}

/// Apply the APV and network to a config document.
///
/// Pure and idempotent: patching an already-patched document with the same
/// inputs returns it unchanged.
///
/// # Errors
///
/// Returns [`ConfigError::NotAnObject`] for non-object documents and
/// [`ConfigError::MissingTimestamp`] when a non-`main` network needs a store
/// directory name but the APV carries no timestamp.
pub fn patch(mut doc: Value, apv: &Apv, network: &Network) -> Result<Value, ConfigError> {
    let found = json_type(&doc);
    let Some(fields) = doc.as_object_mut() else {
        return Err(ConfigError::NotAnObject(found));
    };

    fields.insert(
        APP_PROTOCOL_VERSION.to_string(),
        Value::String(apv.raw().to_string()),
    );

    if !network.is_main() {
        let timestamp = apv
            .timestamp()
            .ok_or_else(|| ConfigError::MissingTimestamp {
                version: apv.version(),
                network: network.to_string(),
            })?;
        fields.insert(
            BLOCKCHAIN_STORE_DIR_NAME.to_string(),
            Value::String(store_dir_name(network, apv.version(), timestamp)),
        );
    }

    Ok(doc)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Read and parse a config file.
pub fn read_config(path: &Path) -> Result<Value, ConfigError> {
    let read_err = |reason: String| ConfigError::Read {
        path: path.to_path_buf(),
        reason,
    };
    let data = fs::read(path).map_err(|e| read_err(e.to_string()))?;
    serde_json::from_slice(&data).map_err(|e| read_err(e.to_string()))
}

/// Replace a config file that must already exist.
///
/// Used for configs embedded in an unpacked build: a missing file means the
/// build's layout differs from the platform table, and writing a fresh file
/// next to it would leave the real config stale.
pub fn overwrite_config(path: &Path, doc: &Value) -> Result<(), ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    write_config(path, doc)
}

/// Write a config file with 4-space indentation, truncating any previous content.
pub fn write_config(path: &Path, doc: &Value) -> Result<(), ConfigError> {
    let write_err = |source: std::io::Error| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(write_err)?;
    let mut writer = BufWriter::new(file);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
    doc.serialize(&mut ser)
        .map_err(|e| write_err(std::io::Error::other(e)))?;
    writer.flush().map_err(write_err)
}
