//! JSON file helpers with deterministic output.

use std::io;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::ser::{PrettyFormatter, Serializer};
use tokio::fs;

/// Error type for serialization operations.
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    /// JSON serialization failed.
    #[error("JSON serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// JSON deserialization failed.
    #[error("invalid JSON in {path}: {source}")]
    Deserialize {
        /// File that failed to parse.
        path: String,
        /// Parser error.
        source: serde_json::Error,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Serializes a value to pretty JSON with 2-space indentation and a trailing
/// newline.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json_stable<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"  ");
    let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    buffer.push(b'\n');
    Ok(buffer)
}

/// Reads and parses a JSON file. Returns `None` if the file does not exist.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub async fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, SerializationError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| SerializationError::Deserialize {
            path: path.display().to_string(),
            source,
        })
}

/// Writes a value as stable JSON, creating parent directories.
///
/// The content goes to a sibling temporary file first and is then renamed
/// over the target, so readers never see a half-written file.
///
/// # Errors
///
/// Returns an error if serialization or any file operation fails.
pub async fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), SerializationError> {
    let content = to_json_stable(value)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, content).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}
