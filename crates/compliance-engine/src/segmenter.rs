//! Section segmentation
//!
//! Splits an uploaded document into named sections with page ranges,
//! confidence tiers and risk scores. Every PDF yields the nine canonical
//! mortgage sections in priority order, optionally followed by up to five
//! sections taken from the lender's checklist.
//!
//! Page ranges come from a [`BoundaryStrategy`]. The default,
//! [`SyntheticBoundaries`], does not look at content: it hands out two
//! consecutive pages per section starting at page 2.

use lazy_static::lazy_static;
use regex::Regex;
use shared_types::{Confidence, LenderRequirements, Section};
use tracing::{debug, warn};

use crate::patterns::{extract_snippet, find_text_position, RuleBook};

/// Canonical sections in priority order
pub const CANONICAL_SECTIONS: [&str; 9] = [
    "Mortgage",
    "Promissory Note",
    "Lenders Closing Instructions Guaranty",
    "Statement of Anti Coercion Florida",
    "Correction Agreement and Limited Power of Attorney",
    "All Purpose Acknowledgment",
    "Flood Hazard Determination",
    "Automatic Payments Authorization",
    "Tax Record Information",
];

pub const MAX_LENDER_SECTIONS: usize = 5;

const FIRST_SECTION_PAGE: u32 = 2;
const PAGES_PER_SECTION: u32 = 2;

const LENDER_SECTION_RISK: u8 = 20;
const LENDER_SECTION_QUALITY: u8 = 85;
const SINGLE_DOCUMENT_RISK: u8 = 10;
const SINGLE_DOCUMENT_QUALITY: u8 = 95;

lazy_static! {
    static ref PAGE_RANGE: Regex = Regex::new(r"^\d+(-\d+)?$").unwrap();
}

/// Assigns a page range to each named section
pub trait BoundaryStrategy: Send + Sync {
    /// Return one 1-based range (`"n"` or `"a-b"`) per name, in order
    fn page_ranges(&self, text: &str, names: &[String]) -> Vec<String>;
}

/// Two pages per section starting at page 2, independent of content
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntheticBoundaries;

impl BoundaryStrategy for SyntheticBoundaries {
    fn page_ranges(&self, _text: &str, names: &[String]) -> Vec<String> {
        let mut page = FIRST_SECTION_PAGE;
        names
            .iter()
            .map(|_| {
                let range = format!("{}-{}", page, page + PAGES_PER_SECTION - 1);
                page += PAGES_PER_SECTION;
                range
            })
            .collect()
    }
}

pub struct Segmenter {
    boundaries: Box<dyn BoundaryStrategy>,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter {
    pub fn new() -> Self {
        Self::with_boundaries(SyntheticBoundaries)
    }

    pub fn with_boundaries(boundaries: impl BoundaryStrategy + 'static) -> Self {
        Self {
            boundaries: Box::new(boundaries),
        }
    }

    pub fn segment(
        &self,
        text: &str,
        filename: &str,
        requirements: Option<&LenderRequirements>,
    ) -> Vec<Section> {
        if !is_pdf(filename) {
            return vec![single_document_section(filename)];
        }

        let lender_documents: Vec<&String> = requirements
            .map(|r| r.documents.iter().take(MAX_LENDER_SECTIONS).collect())
            .unwrap_or_default();

        let names: Vec<String> = CANONICAL_SECTIONS
            .iter()
            .map(|s| s.to_string())
            .chain(lender_documents.iter().map(|d| d.to_string()))
            .collect();

        let ranges = self.resolve_ranges(text, &names);
        let lender = requirements.map(|r| r.lender_name.as_str()).unwrap_or("");

        let sections: Vec<Section> = names
            .into_iter()
            .zip(ranges)
            .enumerate()
            .map(|(index, (name, page_range))| {
                if index < CANONICAL_SECTIONS.len() {
                    canonical_section(index, name, page_range)
                } else {
                    Section {
                        name,
                        page_range,
                        confidence: Confidence::Medium,
                        risk_score: LENDER_SECTION_RISK,
                        quality_percent: LENDER_SECTION_QUALITY,
                        notes: format!("Required by {}", lender),
                    }
                }
            })
            .collect();

        debug!(filename, sections = sections.len(), "Segmented document");
        sections
    }

    fn resolve_ranges(&self, text: &str, names: &[String]) -> Vec<String> {
        let ranges = self.boundaries.page_ranges(text, names);
        if ranges.len() == names.len() && ranges.iter().all(|r| is_valid_range(r)) {
            ranges
        } else {
            warn!(
                expected = names.len(),
                got = ranges.len(),
                "Boundary strategy returned unusable ranges, using synthetic ranges"
            );
            SyntheticBoundaries.page_ranges(text, names)
        }
    }
}

/// Segment with the default synthetic boundaries
pub fn segment(
    text: &str,
    filename: &str,
    requirements: Option<&LenderRequirements>,
) -> Vec<Section> {
    Segmenter::new().segment(text, filename, requirements)
}

pub fn is_pdf(filename: &str) -> bool {
    filename.to_lowercase().ends_with(".pdf")
}

pub fn is_valid_range(range: &str) -> bool {
    PAGE_RANGE.is_match(range)
}

fn canonical_section(index: usize, name: String, page_range: String) -> Section {
    let (confidence, risk_score) = match index {
        0..=2 => (Confidence::High, 15),
        3..=5 => (Confidence::Medium, 25),
        _ => (Confidence::Low, 35),
    };
    Section {
        name,
        page_range,
        confidence,
        risk_score,
        quality_percent: 95 - 2 * index as u8,
        notes: format!("Priority tier {}", index / 3 + 1),
    }
}

fn single_document_section(filename: &str) -> Section {
    Section {
        name: format!("Document: {}", filename),
        page_range: "1".to_string(),
        confidence: Confidence::High,
        risk_score: SINGLE_DOCUMENT_RISK,
        quality_percent: SINGLE_DOCUMENT_QUALITY,
        notes: "Single document upload".to_string(),
    }
}

/// Replace each section's notes with a text preview where its content is found.
///
/// A rule labelled with the section name is tried first, then the name itself.
pub fn annotate_previews(sections: &mut [Section], text: &str, rules: &RuleBook) {
    for section in sections.iter_mut() {
        let span = rules
            .locate(&section.name, text)
            .or_else(|| find_text_position(text, &section.name));
        if let Some((start, end)) = span {
            section.notes = extract_snippet(text, start, end);
        }
    }
}
