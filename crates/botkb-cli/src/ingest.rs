//! Reading plain-text documents from disk.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use botkb_retriever::Document;
use tracing::{debug, warn};

/// Read one file as a document labeled with its file name.
pub fn read_document(path: &Path) -> Result<Document> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let source = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    Ok(Document::labeled(source, text))
}

/// Every `*.txt` file directly inside `dir`, sorted by file name.
/// Blank files are skipped.
pub fn load_documents(dir: &Path) -> Result<Vec<Document>> {
    let mut paths = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "txt") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let doc = read_document(&path)?;
        if doc.is_blank() {
            warn!(path = %path.display(), "skipping blank document");
            continue;
        }
        documents.push(doc);
    }
    debug!(dir = %dir.display(), count = documents.len(), "loaded documents");
    Ok(documents)
}
