//! Discovery Module for the uitree compiler
//!
//! Finds app documents (`*.app.json`) below a path and reads them. This is
//! driver-edge I/O; the compiler itself only ever sees parsed JSON.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

pub const DOCUMENT_SUFFIX: &str = ".app.json";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A document read from disk.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub text: String,
    pub value: Value,
}

impl SourceDocument {
    /// Output directory name: `shop.app.json` -> `shop`.
    pub fn stem(&self) -> String {
        let file = self
            .path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default();
        file.strip_suffix(DOCUMENT_SUFFIX)
            .or_else(|| file.strip_suffix(".json"))
            .unwrap_or(&file)
            .to_string()
    }
}

fn is_document(path: &Path) -> bool {
    path.file_name()
        .map(|f| f.to_string_lossy().ends_with(DOCUMENT_SUFFIX))
        .unwrap_or(false)
}

/// A file is returned as-is; a directory is scanned recursively, sorted by path.
pub fn find_documents(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && is_document(path))
        .collect();
    files.sort();
    files
}

pub fn read_document(path: &Path) -> Result<SourceDocument, DocumentError> {
    let text = fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value = serde_json::from_str(&text).map_err(|source| DocumentError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(SourceDocument {
        path: path.to_path_buf(),
        text,
        value,
    })
}
