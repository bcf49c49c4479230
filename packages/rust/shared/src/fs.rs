//! Output file writes.

use std::path::Path;

use crate::error::{MasterDocError, Result};

/// Write `bytes` to a temp file next to `path`, then rename it over `path`.
///
/// Missing parent directories are created. A failed write or rename leaves
/// `path` untouched and removes the temp file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| MasterDocError::io(parent, e))?;

    let temp = parent.join(format!(".masterdoc-{}.tmp", uuid::Uuid::now_v7()));
    if let Err(e) = std::fs::write(&temp, bytes) {
        let _ = std::fs::remove_file(&temp);
        return Err(MasterDocError::io(&temp, e));
    }
    if let Err(e) = std::fs::rename(&temp, path) {
        let _ = std::fs::remove_file(&temp);
        return Err(MasterDocError::io(path, e));
    }
    Ok(())
}
