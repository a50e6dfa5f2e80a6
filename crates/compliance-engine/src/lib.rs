pub mod error;
pub mod extractors;
pub mod matcher;
pub mod patterns;
pub mod quality;
pub mod requirements;
pub mod segmenter;

pub use error::EngineError;
pub use extractors::{extract_fields, ExtractedFields};
pub use matcher::{build_plan, parse_advisor_output, AdvisorProposal, DEFAULT_COMPLIANCE_SCORE};
pub use patterns::{CategoryMatch, Industry, NewRule, Rule, RuleBook, RuleKind};
pub use quality::{extraction_quality, quality_metrics, QualityMetrics};
pub use requirements::{parse_requirements, RequirementParser};
pub use segmenter::{BoundaryStrategy, Segmenter, SyntheticBoundaries, CANONICAL_SECTIONS};

use serde::Serialize;
use shared_types::{LenderRequirements, Section};

/// Everything learned from one document's text
#[derive(Debug, Clone, Serialize)]
pub struct DocumentAnalysis {
    pub sections: Vec<Section>,
    pub categories: Vec<CategoryMatch>,
    pub fields: ExtractedFields,
    pub quality: QualityMetrics,
}

/// ComplianceEngine entry point
pub struct ComplianceEngine {
    segmenter: Segmenter,
}

impl ComplianceEngine {
    pub fn new() -> Self {
        Self {
            segmenter: Segmenter::new(),
        }
    }

    pub fn with_segmenter(segmenter: Segmenter) -> Self {
        Self { segmenter }
    }

    /// Segment, classify and score a document's text
    pub fn analyze(
        &self,
        text: &str,
        filename: &str,
        requirements: Option<&LenderRequirements>,
        rules: &RuleBook,
    ) -> DocumentAnalysis {
        let mut sections = self.segmenter.segment(text, filename, requirements);
        segmenter::annotate_previews(&mut sections, text, rules);

        let categories = rules.classify(text);
        let fields = extract_fields(text);
        let quality = quality_metrics(text, &categories, fields.found());

        DocumentAnalysis {
            sections,
            categories,
            fields,
            quality,
        }
    }

    pub fn segment(
        &self,
        text: &str,
        filename: &str,
        requirements: Option<&LenderRequirements>,
    ) -> Vec<Section> {
        self.segmenter.segment(text, filename, requirements)
    }
}

impl Default for ComplianceEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKAGE_TEXT: &str = "MORTGAGE\nThis Deed of Trust is made by Borrower: Jane Smith\n\
        Property Address: 12 Ocean Drive, Miami FL\nLoan Amount: $250,000.00\n\
        PROMISSORY NOTE dated January 5, 2024";

    #[test]
    fn test_analyze_collects_all_parts() {
        let engine = ComplianceEngine::new();
        let analysis = engine.analyze(PACKAGE_TEXT, "closing.pdf", None, &RuleBook::default());

        assert_eq!(analysis.sections.len(), CANONICAL_SECTIONS.len());
        assert!(analysis.categories.iter().any(|c| c.section == "Mortgage"));
        assert_eq!(analysis.fields.borrower_name.as_deref(), Some("Jane Smith"));
        assert!(analysis.quality.overall_quality > 0);
    }

    #[test]
    fn test_analyze_non_pdf_single_section() {
        let engine = ComplianceEngine::new();
        let analysis = engine.analyze("plain", "notes.txt", None, &RuleBook::default());
        assert_eq!(analysis.sections.len(), 1);
        assert!(analysis.categories.is_empty());
    }

    #[test]
    fn test_plan_from_requirements_text() {
        let engine = ComplianceEngine::new();
        let req = parse_requirements("From: Pat Lee <pat@harbor.com>\n☐ Survey Report\n☐ Mortgage\n");
        let sections = engine.segment(PACKAGE_TEXT, "closing.pdf", Some(&req));
        let plan = build_plan(sections, Some(&req), None);

        assert_eq!(plan.documents_required, 2);
        assert!(plan.missing_documents.is_empty());
    }
}
