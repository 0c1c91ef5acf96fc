//! Reads PDF files from a local folder.

use crate::ingest::{
    pdf,
    types::{IngestError, SourceDocument},
};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const PDF_SUFFIX: &str = ".pdf";

/// Extract one [`SourceDocument`] per PDF file directly inside `folder`.
///
/// Files are visited in directory-listing order. Only names ending in the literal,
/// case-sensitive `.pdf` suffix are read; everything else is skipped. The first file that
/// fails to load aborts the whole call.
pub async fn load_texts_from_folder(folder: &Path) -> Result<Vec<SourceDocument>, IngestError> {
    let paths = list_pdf_files(folder)?;
    tracing::debug!(folder = %folder.display(), files = paths.len(), "Found PDF files");

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = read_pdf_text(path).await?;
        if text.trim().is_empty() {
            tracing::warn!(file = %file_name, "PDF contains no extractable text");
        }
        documents.push(SourceDocument { file_name, text });
    }

    Ok(documents)
}

fn list_pdf_files(folder: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(folder).min_depth(1).max_depth(1) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }
        if entry.file_name().to_string_lossy().ends_with(PDF_SUFFIX) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

async fn read_pdf_text(path: PathBuf) -> Result<String, IngestError> {
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|source| IngestError::Io {
            path: path.clone(),
            source,
        })?;

    tokio::task::spawn_blocking(move || {
        pdf::extract_text(&bytes).map_err(|source| IngestError::Pdf { path, source })
    })
    .await?
}
