//! Data directory resolution.
//!
//! Resolution order for the data root:
//! 1. `MCPRT_DATA_DIR` environment variable
//! 2. `<system local data dir>/mcp-runtime`

use std::env;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Directory name under the system data directory.
pub const APP_DIR_NAME: &str = "mcp-runtime";

/// Errors from path resolution and directory preparation.
#[derive(Debug, Clone, Error)]
pub enum PathError {
    #[error("Cannot determine system data directory")]
    NoDataDir,

    #[error("{0} exists but is not a directory")]
    NotADirectory(PathBuf),

    #[error("Failed to create directory {path}: {reason}")]
    CreateFailed { path: PathBuf, reason: String },

    #[error("Directory {path} is not writable: {reason}")]
    NotWritable { path: PathBuf, reason: String },
}

/// Root directory for runtime data. Not created by this call.
pub fn data_root() -> Result<PathBuf, PathError> {
    if let Ok(path) = env::var("MCPRT_DATA_DIR") {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    let data_dir = dirs::data_local_dir().ok_or(PathError::NoDataDir)?;
    Ok(data_dir.join(APP_DIR_NAME))
}

/// Default location for offloaded tool output.
pub fn default_offload_dir() -> Result<PathBuf, PathError> {
    Ok(data_root()?.join("offloaded"))
}

/// Create `path` (and parents) if missing, then verify it is writable.
pub fn ensure_directory(path: &Path) -> Result<(), PathError> {
    if path.exists() {
        if !path.is_dir() {
            return Err(PathError::NotADirectory(path.to_path_buf()));
        }
    } else {
        fs::create_dir_all(path).map_err(|e| PathError::CreateFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    }

    verify_writable(path)
}

/// Verify a directory is writable by creating and removing a marker file.
pub fn verify_writable(path: &Path) -> Result<(), PathError> {
    let marker = path.join(".mcprt_write_test");
    let not_writable = |e: std::io::Error| PathError::NotWritable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&marker)
        .map_err(not_writable)?;
    file.write_all(b"test").map_err(not_writable)?;
    drop(file);
    let _ = fs::remove_file(&marker);
    Ok(())
}
