//! Multi-format element extraction (PDF, OOXML, CSV, plain text).
//!
//! Each extractor turns raw file bytes into an ordered list of
//! [`Element`]s, one per structural unit (page paragraph, document
//! paragraph, slide, worksheet, table, text paragraph). Extraction reads the
//! text layer only; no OCR or layout analysis is attempted.

use std::io::Read;

use quick_xml::events::Event;
use thiserror::Error;

/// Maximum sheets to process in an xlsx.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to process per sheet (avoids unbounded memory).
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("file is not valid UTF-8 text: {0}")]
    Encoding(String),
    #[error("CSV parsing failed: {0}")]
    Csv(String),
}

impl From<ExtractError> for crate::error::RagError {
    fn from(e: ExtractError) -> Self {
        crate::error::RagError::IngestionFailure(e.to_string())
    }
}

/// Structural category of an extracted element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementCategory {
    NarrativeText,
    Table,
    Slide,
}

impl ElementCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementCategory::NarrativeText => "NarrativeText",
            ElementCategory::Table => "Table",
            ElementCategory::Slide => "Slide",
        }
    }
}

/// One extracted unit of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub text: String,
    pub category: ElementCategory,
    /// 1-based page, slide, or sheet number where the format has one.
    pub page_number: Option<u32>,
}

impl Element {
    fn narrative(text: impl Into<String>, page_number: Option<u32>) -> Self {
        Self {
            text: text.into(),
            category: ElementCategory::NarrativeText,
            page_number,
        }
    }
}

/// Split text on blank lines into trimmed, non-empty paragraphs.
fn paragraphs(text: &str) -> impl Iterator<Item = &str> {
    text.split("\n\n").map(str::trim).filter(|p| !p.is_empty())
}

pub fn extract_text_elements(bytes: &[u8]) -> Result<Vec<Element>, ExtractError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ExtractError::Encoding(e.to_string()))?;
    let normalized = text.replace("\r\n", "\n");
    Ok(paragraphs(&normalized)
        .map(|p| Element::narrative(p, None))
        .collect())
}

pub fn extract_pdf_elements(bytes: &[u8]) -> Result<Vec<Element>, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    let mut out = Vec::new();
    for (idx, page) in pages.iter().enumerate() {
        let page_number = Some(idx as u32 + 1);
        out.extend(paragraphs(page).map(|p| Element::narrative(p, page_number)));
    }
    Ok(out)
}

/// Parse CSV into a single table element: cells space-joined, rows
/// newline-joined. Quoted fields may contain separators, escaped quotes
/// (`""`) and newlines.
pub fn extract_csv_elements(bytes: &[u8]) -> Result<Vec<Element>, ExtractError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ExtractError::Encoding(e.to_string()))?;
    let rows: Vec<String> = parse_csv_rows(text)?
        .into_iter()
        .map(|cells| {
            cells
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|row| !row.is_empty())
        .collect();
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![Element {
        text: rows.join("\n"),
        category: ElementCategory::Table,
        page_number: None,
    }])
}

fn parse_csv_rows(text: &str) -> Result<Vec<Vec<String>>, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(|e| ExtractError::Csv(e.to_string()))
        })
        .collect()
}

fn open_archive(bytes: &[u8]) -> Result<zip::ZipArchive<std::io::Cursor<&[u8]>>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

/// Names matching `{prefix}N.xml`, sorted by N.
fn numbered_entries(
    archive: &zip::ZipArchive<std::io::Cursor<&[u8]>>,
    prefix: &str,
) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// One element per non-empty `w:p` paragraph of `word/document.xml`.
pub fn extract_docx_elements(bytes: &[u8]) -> Result<Vec<Element>, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;

    let mut out = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut paragraph = String::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"p" => paragraph.clear(),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if matches!(e.local_name().as_ref(), b"tab" | b"br") {
                    paragraph.push(' ');
                }
            }
            Ok(Event::Text(te)) if in_text => {
                paragraph.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let text = paragraph.trim();
                    if !text.is_empty() {
                        out.push(Element::narrative(text, None));
                    }
                    paragraph.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// One element per non-empty slide, in slide order.
pub fn extract_pptx_elements(bytes: &[u8]) -> Result<Vec<Element>, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let slide_names = numbered_entries(&archive, "ppt/slides/slide");
    let mut out = Vec::new();
    for (idx, name) in slide_names.iter().enumerate() {
        let xml = read_zip_entry_bounded(&mut archive, name, MAX_XML_ENTRY_BYTES)?;
        let text = extract_a_t_elements(&xml)?;
        if !text.is_empty() {
            out.push(Element {
                text,
                category: ElementCategory::Slide,
                page_number: Some(idx as u32 + 1),
            });
        }
    }
    Ok(out)
}

fn extract_a_t_elements(xml: &[u8]) -> Result<String, ExtractError> {
    let mut runs: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(Event::Text(te)) = reader.read_event_into(&mut buf) {
                        runs.push(te.unescape().unwrap_or_default().into_owned());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(runs.join(" "))
}

/// One table element per non-empty worksheet.
pub fn extract_xlsx_elements(bytes: &[u8]) -> Result<Vec<Element>, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let has_shared_strings = archive.file_names().any(|n| n == "xl/sharedStrings.xml");
    let shared_strings = if has_shared_strings {
        read_shared_strings(&mut archive)?
    } else {
        Vec::new()
    };
    let sheet_names = numbered_entries(&archive, "xl/worksheets/sheet");
    let mut out = Vec::new();
    for (idx, name) in sheet_names.iter().take(XLSX_MAX_SHEETS).enumerate() {
        let sheet_xml = read_zip_entry_bounded(&mut archive, name, MAX_XML_ENTRY_BYTES)?;
        let text = extract_xlsx_sheet_rows(&sheet_xml, &shared_strings)?;
        if !text.is_empty() {
            out.push(Element {
                text,
                category: ElementCategory::Table,
                page_number: Some(idx as u32 + 1),
            });
        }
    }
    Ok(out)
}

fn read_shared_strings(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>, ExtractError> {
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_t = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_t => {
                if let Some(s) = current.as_mut() {
                    s.push_str(te.unescape().unwrap_or_default().as_ref());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => strings.push(current.take().unwrap_or_default()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Render a worksheet as rows of space-joined cells. Shared strings,
/// inline strings, and literal values are all included.
fn extract_xlsx_sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<String, ExtractError> {
    let mut rows: Vec<String> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_value = false;
    let mut cell_is_shared_str = false;
    let mut cell_count = 0usize;
    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"c" => {
                    cell_is_shared_str = e.attributes().any(|a| {
                        a.as_ref()
                            .map(|a| a.key.as_ref() == b"t" && a.value.as_ref() == b"s")
                            .unwrap_or(false)
                    });
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_value => {
                let v = te.unescape().unwrap_or_default();
                let s = v.trim();
                if !s.is_empty() {
                    if cell_is_shared_str {
                        if let Some(text) = s.parse::<usize>().ok().and_then(|i| shared_strings.get(i)) {
                            row.push(text.clone());
                            cell_count += 1;
                        }
                    } else {
                        row.push(s.to_string());
                        cell_count += 1;
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => cell_is_shared_str = false,
                b"row" => {
                    if !row.is_empty() {
                        rows.push(row.join(" "));
                    }
                    row.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !row.is_empty() {
        rows.push(row.join(" "));
    }
    Ok(rows.join("\n"))
}
