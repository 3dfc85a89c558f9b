//! Tokenizer/Loader: file path → ordered chunks.
//!
//! Loader and splitter are both chosen from the file extension
//! (case-insensitive) through small lookup tables with an explicit default:
//!
//! | Extension | Loader | Splitter |
//! |-----------|--------|----------|
//! | `csv` | [`LoaderKind::Csv`] | character window |
//! | `xlsx` | [`LoaderKind::Excel`] | character window |
//! | `pdf` | [`LoaderKind::Pdf`] | character window |
//! | `pptx` | [`LoaderKind::PowerPoint`] | character window |
//! | `docx` | [`LoaderKind::Word`] | character window |
//! | anything else | [`LoaderKind::Default`] (UTF-8 text) | character window |
//!
//! The sentence splitter is available through [`SplitterKind::Sentence`]
//! but no extension selects it today.

use std::path::Path;

use tracing::debug;

use crate::chunk::SplitterKind;
use crate::config::LoaderConfig;
use crate::error::{RagError, Result};
use crate::extract::{self, Element, ExtractError};
use crate::models::{Chunk, Metadata};

/// Closed set of format-specific loaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderKind {
    Csv,
    Excel,
    Pdf,
    PowerPoint,
    Word,
    Default,
}

const LOADERS: [(&str, LoaderKind); 5] = [
    ("csv", LoaderKind::Csv),
    ("xlsx", LoaderKind::Excel),
    ("pdf", LoaderKind::Pdf),
    ("pptx", LoaderKind::PowerPoint),
    ("docx", LoaderKind::Word),
];

const SPLITTERS: [(&str, SplitterKind); 5] = [
    ("csv", SplitterKind::Characters),
    ("xlsx", SplitterKind::Characters),
    ("pdf", SplitterKind::Characters),
    ("pptx", SplitterKind::Characters),
    ("docx", SplitterKind::Characters),
];

const DEFAULT_SPLITTER: SplitterKind = SplitterKind::Characters;

impl LoaderKind {
    pub fn for_extension(extension: &str) -> Self {
        let ext = extension.to_lowercase();
        LOADERS
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, kind)| *kind)
            .unwrap_or(LoaderKind::Default)
    }

    /// Extract structural elements from raw file bytes.
    pub fn extract(self, bytes: &[u8]) -> std::result::Result<Vec<Element>, ExtractError> {
        match self {
            LoaderKind::Csv => extract::extract_csv_elements(bytes),
            LoaderKind::Excel => extract::extract_xlsx_elements(bytes),
            LoaderKind::Pdf => extract::extract_pdf_elements(bytes),
            LoaderKind::PowerPoint => extract::extract_pptx_elements(bytes),
            LoaderKind::Word => extract::extract_docx_elements(bytes),
            LoaderKind::Default => extract::extract_text_elements(bytes),
        }
    }
}

pub fn splitter_for_extension(extension: &str) -> SplitterKind {
    let ext = extension.to_lowercase();
    SPLITTERS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, kind)| *kind)
        .unwrap_or(DEFAULT_SPLITTER)
}

/// How extracted elements become chunks before splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionMode {
    /// One chunk per structural element, each with its own metadata.
    #[default]
    Elements,
    /// All elements joined into a single chunk.
    Single,
}

#[derive(Debug, Clone)]
pub struct Loader {
    chunk_size: usize,
    chunk_overlap: usize,
    mode: ExtractionMode,
}

impl Loader {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        // Validate the window eagerly so a bad config fails before any file is read.
        SplitterKind::Characters.build(chunk_size, chunk_overlap)?;
        Ok(Self {
            chunk_size,
            chunk_overlap,
            mode: ExtractionMode::Elements,
        })
    }

    pub fn from_config(config: &LoaderConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn with_mode(mut self, mode: ExtractionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Load a file and split it into chunks, preserving source order.
    ///
    /// # Errors
    ///
    /// - [`RagError::NotFound`] when `path` does not exist or is not a file.
    /// - [`RagError::IngestionFailure`] when the content cannot be extracted.
    pub fn load(&self, path: &Path) -> Result<Vec<Chunk>> {
        if !path.is_file() {
            return Err(RagError::not_found(format!(
                "file does not exist: {}",
                path.display()
            )));
        }

        let extension = file_extension(path);
        let kind = LoaderKind::for_extension(&extension);
        let bytes = std::fs::read(path)?;
        let elements = kind
            .extract(&bytes)
            .map_err(|e| RagError::ingestion(format!("{}: {}", path.display(), e)))?;

        let chunks = self.elements_to_chunks(path, &extension, elements);
        let splitter = splitter_for_extension(&extension).build(self.chunk_size, self.chunk_overlap)?;
        let chunks = splitter.split_chunks(chunks);

        debug!(
            path = %path.display(),
            loader = ?kind,
            chunks = chunks.len(),
            "loaded file"
        );
        Ok(chunks)
    }

    fn elements_to_chunks(&self, path: &Path, extension: &str, elements: Vec<Element>) -> Vec<Chunk> {
        let base = provenance(path, extension);
        match self.mode {
            ExtractionMode::Elements => elements
                .into_iter()
                .map(|el| {
                    let mut metadata = base.clone();
                    metadata.insert("category".into(), el.category.as_str().into());
                    if let Some(page) = el.page_number {
                        metadata.insert("page_number".into(), page.into());
                    }
                    Chunk::new(el.text, metadata)
                })
                .collect(),
            ExtractionMode::Single => {
                let text = elements
                    .iter()
                    .map(|el| el.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                if text.trim().is_empty() {
                    Vec::new()
                } else {
                    vec![Chunk::new(text, base)]
                }
            }
        }
    }
}

/// Lower-cased extension, or empty when the file has none.
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

fn provenance(path: &Path, extension: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("source".into(), path.display().to_string().into());
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        metadata.insert("filename".into(), name.into());
    }
    if let Some(dir) = path.parent() {
        metadata.insert("file_directory".into(), dir.display().to_string().into());
    }
    if !extension.is_empty() {
        metadata.insert("filetype".into(), extension.into());
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn loader_table_is_case_insensitive_with_default() {
        assert_eq!(LoaderKind::for_extension("PDF"), LoaderKind::Pdf);
        assert_eq!(LoaderKind::for_extension("docx"), LoaderKind::Word);
        assert_eq!(LoaderKind::for_extension("Xlsx"), LoaderKind::Excel);
        assert_eq!(LoaderKind::for_extension("pptx"), LoaderKind::PowerPoint);
        assert_eq!(LoaderKind::for_extension("csv"), LoaderKind::Csv);
        assert_eq!(LoaderKind::for_extension("txt"), LoaderKind::Default);
        assert_eq!(LoaderKind::for_extension(""), LoaderKind::Default);
    }

    #[test]
    fn every_extension_uses_character_windows() {
        for ext in ["csv", "xlsx", "pdf", "pptx", "docx", "txt", "md", ""] {
            assert_eq!(splitter_for_extension(ext), SplitterKind::Characters);
        }
    }

    #[test]
    fn missing_file_is_not_found() {
        let loader = Loader::new(500, 200).unwrap();
        let err = loader.load(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));
    }

    #[test]
    fn text_file_keeps_order_and_provenance() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Notes.TXT");
        std::fs::write(&path, "Alpha paragraph.\n\nBeta paragraph.").unwrap();

        let chunks = Loader::new(500, 200).unwrap().load(&path).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "Alpha paragraph.");
        assert_eq!(chunks[1].content, "Beta paragraph.");
        assert_eq!(chunks[0].metadata["filename"], "Notes.TXT");
        assert_eq!(chunks[0].metadata["filetype"], "txt");
        assert_eq!(chunks[0].metadata["category"], "NarrativeText");
    }

    #[test]
    fn long_elements_are_windowed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("long.txt");
        let body = (0..200).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ");
        std::fs::write(&path, &body).unwrap();

        let chunks = Loader::new(500, 200).unwrap().load(&path).unwrap();
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.content.chars().count() <= 500));
    }

    #[test]
    fn single_mode_joins_elements() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("doc.md");
        std::fs::write(&path, "One.\n\nTwo.").unwrap();

        let chunks = Loader::new(500, 200)
            .unwrap()
            .with_mode(ExtractionMode::Single)
            .load(&path)
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "One.\n\nTwo.");
        assert!(chunks[0].metadata.get("category").is_none());
    }

    #[test]
    fn corrupt_recognized_format_is_ingestion_failure() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.docx");
        std::fs::write(&path, "this is not a zip").unwrap();

        let err = Loader::new(500, 200).unwrap().load(&path).unwrap_err();
        assert!(matches!(err, RagError::IngestionFailure(_)));
    }
}
