//! # IO Utilities
//!
//! File system operations for the `.validator` runtime directory.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Get the runtime directory path (.validator)
///
/// `VALIDATOR_RUNTIME_PATH` overrides the default under the current directory.
pub fn get_runtime_path() -> PathBuf {
    if let Ok(path) = std::env::var("VALIDATOR_RUNTIME_PATH") {
        return PathBuf::from(path);
    }

    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".validator")
}

/// Read a file from the runtime directory
pub async fn read_file(relative_path: impl AsRef<Path>) -> Result<String> {
    let path = get_runtime_path().join(relative_path.as_ref());
    fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read file: {:?}", path))
}

/// Write a file to the runtime directory, returning its full path
pub async fn write_runtime_file(relative_path: impl AsRef<Path>, content: &str) -> Result<PathBuf> {
    let path = get_runtime_path().join(relative_path);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    fs::write(&path, content)
        .await
        .with_context(|| format!("Failed to write file: {:?}", path))?;
    Ok(path)
}

/// List files in a runtime subdirectory
pub async fn list_runtime_files(subdir: &str) -> Result<Vec<String>> {
    let dir = get_runtime_path().join(subdir);

    if fs::metadata(&dir).await.is_err() {
        return Ok(Vec::new());
    }

    let mut entries = fs::read_dir(&dir)
        .await
        .with_context(|| format!("Failed to read directory: {:?}", dir))?;

    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if let Ok(file_type) = entry.file_type().await {
            if file_type.is_file() {
                if let Ok(name) = entry.file_name().into_string() {
                    files.push(name);
                }
            }
        }
    }

    files.sort();
    Ok(files)
}
