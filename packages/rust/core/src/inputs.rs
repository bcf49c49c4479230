//! Where the document and summary path lists come from.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use masterdoc_shared::{MasterDocError, PathsConfig, Result};

/// Document and summary paths for one run.
///
/// Also the on-disk JSON input list format:
/// `{"documents": [...], "summaries": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputList {
    #[serde(default)]
    pub documents: Vec<PathBuf>,
    #[serde(default)]
    pub summaries: Vec<PathBuf>,
}

impl InputList {
    /// Read a JSON input list. Relative entries resolve against the list's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MasterDocError::io(path, e))?;
        let mut list: InputList = serde_json::from_str(&content).map_err(|e| {
            MasterDocError::validation(format!("invalid input list {}: {e}", path.display()))
        })?;

        if let Some(base) = path.parent() {
            for entry in list.documents.iter_mut().chain(list.summaries.iter_mut()) {
                if entry.is_relative() {
                    *entry = base.join(&*entry);
                }
            }
        }
        Ok(list)
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.summaries.is_empty()
    }
}

/// Collect documents and summaries under `dir`, recursively, by extension.
///
/// Both lists are sorted so repeated scans give the same order. Hidden
/// files and Word lock files (`~$name.docx`) are skipped.
#[instrument(skip(paths), fields(dir = %dir.display()))]
pub fn scan_directory(dir: &Path, paths: &PathsConfig) -> Result<InputList> {
    let mut list = InputList::default();
    walk(dir, paths, &mut list)?;
    list.documents.sort();
    list.summaries.sort();
    debug!(
        documents = list.documents.len(),
        summaries = list.summaries.len(),
        "directory scanned"
    );
    Ok(list)
}

fn walk(dir: &Path, paths: &PathsConfig, list: &mut InputList) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| MasterDocError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| MasterDocError::io(dir, e))?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || name.starts_with("~$") {
            continue;
        }

        let file_type = entry.file_type().map_err(|e| MasterDocError::io(&path, e))?;
        if file_type.is_dir() {
            walk(&path, paths, list)?;
            continue;
        }

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let matches = |exts: &[String]| exts.iter().any(|x| x.eq_ignore_ascii_case(&ext));
        if matches(&paths.document_extensions) {
            list.documents.push(path);
        } else if matches(&paths.summary_extensions) {
            list.summaries.push(path);
        }
    }
    Ok(())
}
