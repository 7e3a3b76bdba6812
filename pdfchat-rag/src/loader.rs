//! Reading source files from a staging directory into [`Document`]s.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::document::Document;
use crate::error::{RagError, Result};

/// Produces normalized documents from the files in a directory.
///
/// Loading never modifies or deletes the source files. Any unreadable or
/// unparsable file aborts the whole batch.
pub trait DocumentLoader: Send + Sync {
    /// Load every supported file under `dir`.
    fn load(&self, dir: &Path) -> Result<Vec<Document>>;
}

/// Loads PDF files, one [`Document`] per page.
///
/// Files are discovered recursively, hidden files and directories are
/// skipped, and paths are processed in sorted order so repeated loads of
/// the same directory yield the same documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfDirectoryLoader;

impl PdfDirectoryLoader {
    /// Create a new loader.
    pub fn new() -> Self {
        Self
    }

    /// Extract the pages of a single PDF file.
    ///
    /// Page text is trimmed. Pages without any text are left out.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Load`] if the file cannot be parsed or is encrypted.
    pub fn load_file(&self, path: &Path) -> Result<Vec<Document>> {
        let source = path.display().to_string();
        let pdf = lopdf::Document::load(path).map_err(|e| load_error(path, e))?;
        if pdf.is_encrypted() {
            return Err(load_error(path, "encrypted PDFs are not supported"));
        }

        let mut documents = Vec::new();
        // `get_pages` numbers pages from 1.
        for (number, _) in pdf.get_pages() {
            let text = pdf.extract_text(&[number]).map_err(|e| load_error(path, e))?;
            let text = text.trim();
            if text.is_empty() {
                debug!(document.source = %source, page = number, "skipping page without text");
                continue;
            }
            documents.push(Document::page(source.clone(), number - 1, text));
        }

        debug!(document.source = %source, page_count = documents.len(), "loaded pdf");
        Ok(documents)
    }
}

impl DocumentLoader for PdfDirectoryLoader {
    fn load(&self, dir: &Path) -> Result<Vec<Document>> {
        let files = discover_pdf_files(dir)?;
        let mut documents = Vec::new();
        for file in &files {
            documents.extend(self.load_file(file)?);
        }
        info!(
            directory = %dir.display(),
            file_count = files.len(),
            document_count = documents.len(),
            "loaded documents"
        );
        Ok(documents)
    }
}

/// List the PDF files under `dir` in sorted order.
///
/// # Errors
///
/// Returns [`RagError::Load`] if `dir` is missing, is not a directory, or
/// any part of it cannot be read.
pub fn discover_pdf_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(load_error(dir, "directory does not exist"));
    }
    if !dir.is_dir() {
        return Err(load_error(dir, "not a directory"));
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(dir).into_iter().filter_entry(|e| {
        let hidden = e.depth() > 0 && is_hidden(e);
        if hidden {
            warn!(path = %e.path().display(), "skipping hidden entry");
        }
        !hidden
    });
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
            load_error(&path, e)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if is_pdf(entry.path()) {
            files.push(entry.into_path());
        } else {
            warn!(path = %entry.path().display(), "ignoring non-PDF file");
        }
    }

    files.sort();
    Ok(files)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

fn is_pdf(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()).is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn load_error(path: &Path, err: impl std::fmt::Display) -> RagError {
    RagError::Load { path: path.display().to_string(), message: err.to_string() }
}
