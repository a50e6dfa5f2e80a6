//! Page extraction
//!
//! Splits a source PDF into one standalone document per section. Out-of-range
//! page ranges are clamped; a section whose range selects nothing still gets
//! a (zero-page) document so later steps see every section.

use crate::error::PdfJoinError;
use crate::ranges::PageRange;
use lopdf::Document;
use shared_types::{Degradation, Section};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A per-section PDF written to disk
#[derive(Debug, Clone, PartialEq)]
pub struct SectionDocument {
    pub name: String,
    pub path: PathBuf,
    pub page_count: u32,
}

#[derive(Debug, Clone, Default)]
pub struct PageExtraction {
    /// One entry per input section, in input order
    pub documents: Vec<SectionDocument>,
    pub total_pages: u32,
    pub warnings: Vec<Degradation>,
}

/// Extract every section of `source` into `out_dir`.
///
/// Fails only if the source cannot be read or parsed, or an output file
/// cannot be written.
pub fn extract_pages(
    source: &Path,
    sections: &[Section],
    out_dir: &Path,
) -> Result<PageExtraction, PdfJoinError> {
    let bytes = std::fs::read(source)?;
    let doc = Document::load_mem(&bytes).map_err(|e| PdfJoinError::ParseError(e.to_string()))?;
    let total_pages = doc.get_pages().len() as u32;
    std::fs::create_dir_all(out_dir)?;

    let mut extraction = PageExtraction {
        total_pages,
        ..PageExtraction::default()
    };

    for (index, section) in sections.iter().enumerate() {
        let keep = match PageRange::parse(&section.page_range) {
            Ok(range) => {
                if range.exceeds(total_pages) {
                    debug!(
                        section = %section.name,
                        range = %range,
                        total_pages,
                        "Clamping page range"
                    );
                    extraction.warnings.push(Degradation::RangeOutOfBounds {
                        section: section.name.clone(),
                        range: range.to_string(),
                        total_pages,
                    });
                }
                range.clamp(total_pages)
            }
            Err(e) => {
                warn!(section = %section.name, "Unusable page range: {}", e);
                extraction.warnings.push(Degradation::ParseDegradation {
                    stage: format!("page range for '{}'", section.name),
                    message: e.to_string(),
                });
                None
            }
        };

        let page_count = keep.as_ref().map_or(0, |r| r.end() - r.start() + 1);
        let buffer = split_document(&doc, keep)?;
        let path = out_dir.join(format!("{:02}_{}", index + 1, section.output_filename()));
        std::fs::write(&path, buffer)?;

        extraction.documents.push(SectionDocument {
            name: section.name.clone(),
            path,
            page_count,
        });
    }

    info!(
        sections = extraction.documents.len(),
        total_pages, "Extracted section documents"
    );
    Ok(extraction)
}

/// Copy of `doc` holding only the pages in `keep` (1-based), serialized.
///
/// `None` yields a document with an empty page tree.
pub fn split_document(
    doc: &Document,
    keep: Option<RangeInclusive<u32>>,
) -> Result<Vec<u8>, PdfJoinError> {
    let page_count = doc.get_pages().len() as u32;
    let mut new_doc = doc.clone();

    let pages_to_delete: Vec<u32> = (1..=page_count)
        .filter(|p| !keep.as_ref().is_some_and(|range| range.contains(p)))
        .collect();
    if !pages_to_delete.is_empty() {
        new_doc.delete_pages(&pages_to_delete);
    }

    // Drop objects only the deleted pages used
    new_doc.prune_objects();
    new_doc.compress();

    let mut buffer = Vec::new();
    new_doc
        .save_to(&mut buffer)
        .map_err(|e| PdfJoinError::OperationError(format!("Save failed: {}", e)))?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_document, page_count, write_test_pdf};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use shared_types::Confidence;

    fn section(name: &str, range: &str) -> Section {
        Section {
            name: name.to_string(),
            page_range: range.to_string(),
            confidence: Confidence::High,
            risk_score: 15,
            quality_percent: 95,
            notes: String::new(),
        }
    }

    #[test]
    fn test_split_keeps_range() {
        let doc = create_test_document(5, "Doc");
        let result = split_document(&doc, Some(2..=4)).unwrap();
        assert_eq!(Document::load_mem(&result).unwrap().get_pages().len(), 3);
    }

    #[test]
    fn test_split_none_gives_empty_document() {
        let doc = create_test_document(3, "Doc");
        let result = split_document(&doc, None).unwrap();
        assert_eq!(Document::load_mem(&result).unwrap().get_pages().len(), 0);
    }

    #[test]
    fn test_extract_clamps_to_last_page() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_test_pdf(dir.path(), "source.pdf", 10);

        let out = dir.path().join("out");
        let extraction = extract_pages(&source, &[section("Mortgage", "9-12")], &out).unwrap();

        assert_eq!(extraction.total_pages, 10);
        assert_eq!(extraction.documents.len(), 1);
        assert_eq!(extraction.documents[0].page_count, 2);
        assert_eq!(page_count(&extraction.documents[0].path), 2);
        assert!(matches!(
            extraction.warnings[0],
            Degradation::RangeOutOfBounds { total_pages: 10, .. }
        ));
    }

    #[test]
    fn test_extract_clamps_bound_beyond_u32() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_test_pdf(dir.path(), "source.pdf", 10);

        let out = dir.path().join("out");
        let extraction =
            extract_pages(&source, &[section("Mortgage", "9-4294967296")], &out).unwrap();

        assert_eq!(extraction.documents[0].page_count, 2);
        assert_eq!(page_count(&extraction.documents[0].path), 2);
        assert_eq!(extraction.warnings.len(), 1);
        assert!(matches!(
            extraction.warnings[0],
            Degradation::RangeOutOfBounds { .. }
        ));
    }

    #[test]
    fn test_extract_out_of_bounds_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_test_pdf(dir.path(), "source.pdf", 3);

        let sections = vec![
            section("Mortgage", "2-3"),
            section("Promissory Note", "4-5"),
            section("Broken", "x-y"),
        ];
        let extraction = extract_pages(&source, &sections, dir.path()).unwrap();

        let counts: Vec<u32> = extraction.documents.iter().map(|d| d.page_count).collect();
        assert_eq!(counts, vec![2, 0, 0]);
        assert_eq!(page_count(&extraction.documents[1].path), 0);
        assert_eq!(extraction.warnings.len(), 2);
    }

    #[test]
    fn test_extract_duplicate_names_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_test_pdf(dir.path(), "source.pdf", 4);

        let sections = vec![section("Mortgage", "1"), section("Mortgage", "2")];
        let extraction = extract_pages(&source, &sections, dir.path()).unwrap();
        assert_ne!(extraction.documents[0].path, extraction.documents[1].path);
    }

    #[test]
    fn test_extract_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = extract_pages(&dir.path().join("nope.pdf"), &[], dir.path());
        assert!(matches!(result, Err(PdfJoinError::Io(_))));
    }

    #[test]
    fn test_extract_unparsable_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("bad.pdf");
        std::fs::write(&source, b"not a pdf").unwrap();
        let result = extract_pages(&source, &[section("Mortgage", "1")], dir.path());
        assert!(matches!(result, Err(PdfJoinError::ParseError(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn extraction_never_exceeds_document(start in 0u32..15, end in 0u32..15) {
            let dir = tempfile::tempdir().unwrap();
            let source = write_test_pdf(dir.path(), "source.pdf", 6);
            let range = format!("{}-{}", start, end);

            let extraction = extract_pages(&source, &[section("S", &range)], dir.path()).unwrap();
            let pages = page_count(&extraction.documents[0].path) as u32;

            prop_assert!(pages <= 6);
            prop_assert_eq!(pages, extraction.documents[0].page_count);
            if start > 6 || start > end {
                prop_assert_eq!(pages, 0);
            }
        }
    }
}
