//! Text extraction from uploaded files
//!
//! PDFs go through `pdf-extract`, Word documents through `docx-rs` and
//! spreadsheets through `calamine`. Plain text is decoded as UTF-8 with a
//! Latin-1 fallback. Other formats are reported as unsupported.

use std::io::Cursor;
use std::path::Path;

use calamine::Reader;
use docx_rs::{
    DocumentChild, Paragraph, ParagraphChild, RunChild, Table, TableCellContent, TableChild,
    TableRowChild,
};
use shared_types::{ExtractedText, ExtractionMetadata};
use thiserror::Error;
use tracing::debug;

const TEXT_EXTENSIONS: [&str; 4] = ["txt", "text", "md", "csv"];
const SPREADSHEET_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Unsupported file format: {0}")]
    Unsupported(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF text extraction failed: {0}")]
    Pdf(String),

    #[error("Word document extraction failed: {0}")]
    Docx(String),

    #[error("Spreadsheet extraction failed: {0}")]
    Spreadsheet(String),
}

/// Turns an uploaded file into text
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path, filename: &str) -> Result<ExtractedText, ExtractionError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FileTextExtractor;

impl TextExtractor for FileTextExtractor {
    fn extract(&self, path: &Path, filename: &str) -> Result<ExtractedText, ExtractionError> {
        let extension = extension(filename);
        let bytes = std::fs::read(path)?;
        let file_size = bytes.len() as u64;

        let extracted = match extension.as_str() {
            "pdf" => {
                let text = pdf_extract::extract_text_from_mem(&bytes)
                    .map_err(|e| ExtractionError::Pdf(e.to_string()))?;
                ExtractedText {
                    text,
                    metadata: ExtractionMetadata {
                        page_count: pdfjoin_core::get_page_count(&bytes).ok(),
                        file_size,
                        method: "pdf-extract".to_string(),
                        encoding: None,
                    },
                }
            }
            "docx" => ExtractedText {
                text: docx_text(&bytes)?,
                metadata: ExtractionMetadata {
                    page_count: None,
                    file_size,
                    method: "docx-rs".to_string(),
                    encoding: None,
                },
            },
            ext if SPREADSHEET_EXTENSIONS.contains(&ext) => ExtractedText {
                text: spreadsheet_text(bytes)?,
                metadata: ExtractionMetadata {
                    page_count: None,
                    file_size,
                    method: "calamine".to_string(),
                    encoding: None,
                },
            },
            ext if TEXT_EXTENSIONS.contains(&ext) => {
                let (text, encoding) = decode_text(bytes);
                ExtractedText {
                    text,
                    metadata: ExtractionMetadata {
                        page_count: None,
                        file_size,
                        method: "plain text".to_string(),
                        encoding: Some(encoding.to_string()),
                    },
                }
            }
            other => return Err(ExtractionError::Unsupported(other.to_string())),
        };

        debug!(
            filename,
            chars = extracted.text.len(),
            method = %extracted.metadata.method,
            "Extracted text"
        );
        Ok(extracted)
    }
}

/// Lower-cased extension, empty if there is none
pub fn extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Paragraph text, then one line per table row with cells separated by spaces
fn docx_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| ExtractionError::Docx(e.to_string()))?;

    let mut lines = Vec::new();
    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(paragraph) => {
                let text = paragraph_text(paragraph);
                if !text.trim().is_empty() {
                    lines.push(text);
                }
            }
            DocumentChild::Table(table) => lines.extend(table_rows(table)),
            _ => {}
        }
    }
    Ok(lines.join("\n"))
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                if let RunChild::Text(t) = run_child {
                    text.push_str(&t.text);
                }
            }
        }
    }
    text
}

#[allow(irrefutable_let_patterns)]
fn table_rows(table: &Table) -> Vec<String> {
    let mut rows = Vec::new();
    for child in &table.rows {
        let TableChild::TableRow(row) = child else {
            continue;
        };
        let mut cells = Vec::new();
        for cell in &row.cells {
            let TableRowChild::TableCell(cell) = cell else {
                continue;
            };
            let text: Vec<String> = cell
                .children
                .iter()
                .filter_map(|content| match content {
                    TableCellContent::Paragraph(p) => Some(paragraph_text(p)),
                    _ => None,
                })
                .collect();
            cells.push(text.join(" ").trim().to_string());
        }
        if cells.iter().any(|c| !c.is_empty()) {
            rows.push(cells.join(" "));
        }
    }
    rows
}

/// One line per non-empty row across every sheet
fn spreadsheet_text(bytes: Vec<u8>) -> Result<String, ExtractionError> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ExtractionError::Spreadsheet(e.to_string()))?;

    let mut lines = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| ExtractionError::Spreadsheet(e.to_string()))?;
        for row in range.rows() {
            let cells: Vec<String> = row.iter().map(|cell| cell.to_string()).collect();
            if cells.iter().any(|c| !c.trim().is_empty()) {
                lines.push(cells.join(" ").trim().to_string());
            }
        }
    }
    Ok(lines.join("\n"))
}

fn decode_text(bytes: Vec<u8>) -> (String, &'static str) {
    match String::from_utf8(bytes) {
        Ok(text) => (text, "utf-8"),
        Err(e) => {
            let text = e.into_bytes().into_iter().map(char::from).collect();
            (text, "latin-1")
        }
    }
}
