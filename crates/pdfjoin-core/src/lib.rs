//! PDF page extraction and package assembly
//!
//! Everything here works on `lopdf` documents:
//! - `extract_pages`: one standalone PDF per section, with clamped page ranges
//! - `CoverPage`: a summary page rendered from a reorganization plan
//! - `assemble`: cover plus section documents into a single package

pub mod assemble;
pub mod cover;
pub mod error;
pub mod merge;
pub mod ranges;
pub mod split;

#[cfg(test)]
pub(crate) mod test_support;

pub use assemble::{assemble, package_filename, Assembly};
pub use cover::CoverPage;
pub use error::PdfJoinError;
pub use merge::{merge_documents, merge_to_bytes};
pub use ranges::PageRange;
pub use split::{extract_pages, split_document, PageExtraction, SectionDocument};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, PdfJoinError> {
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| PdfJoinError::ParseError(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}
