use std::fmt;

/// Placeholder values used when a requirement field could not be found.
pub const UNKNOWN_LENDER: &str = "Unknown Lender";
pub const UNKNOWN_CONTACT: &str = "Unknown Contact";
pub const UNKNOWN_EMAIL: &str = "Not found";
pub const UNKNOWN_AMOUNT: &str = "Not specified";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

/// A named logical document unit inside a larger upload.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Section {
    pub name: String,
    /// 1-based inclusive range, `"n"` or `"start-end"`
    #[serde(alias = "pages")]
    pub page_range: String,
    pub confidence: Confidence,
    pub risk_score: u8,     // 0-100, lower is safer
    pub quality_percent: u8, // 0-100
    pub notes: String,
}

impl Section {
    /// File name for the standalone PDF holding this section's pages.
    ///
    /// Upper-cases the name, drops spaces and commas, spells out `&` and
    /// strips anything that could escape a directory.
    pub fn output_filename(&self) -> String {
        let stem: String = self
            .name
            .to_uppercase()
            .replace('&', "AND")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        if stem.is_empty() {
            "SECTION.pdf".to_string()
        } else {
            format!("{}.pdf", stem)
        }
    }
}

/// Structured checklist parsed from lender correspondence.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LenderRequirements {
    pub lender_name: String,
    pub contact_name: String,
    pub contact_email: String,
    pub funding_amount: String,
    /// Sorted, deduplicated, at most 50 entries
    pub documents: Vec<String>,
    /// At most 10 entries
    pub special_instructions: Vec<String>,
    pub deadline: Option<String>,
}

impl Default for LenderRequirements {
    fn default() -> Self {
        Self {
            lender_name: UNKNOWN_LENDER.to_string(),
            contact_name: UNKNOWN_CONTACT.to_string(),
            contact_email: UNKNOWN_EMAIL.to_string(),
            funding_amount: UNKNOWN_AMOUNT.to_string(),
            documents: Vec::new(),
            special_instructions: Vec::new(),
            deadline: None,
        }
    }
}

impl LenderRequirements {
    /// Requirement set returned when parsing could not run at all.
    pub fn parse_failure(error: &str) -> Self {
        Self {
            documents: vec!["Unable to parse lender requirements".to_string()],
            special_instructions: vec![format!("Parse error: {}", error)],
            ..Self::default()
        }
    }
}

/// Resolved section order plus compliance metrics.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReorganizationPlan {
    pub ordered_sections: Vec<Section>,
    pub compliance_score: u8,
    pub missing_documents: Vec<String>,
    pub documents_required: usize,
    /// False when the order is the deterministic catalog fallback
    pub advisor_used: bool,
}

impl ReorganizationPlan {
    pub fn summary(&self) -> PlanSummary {
        let documents_matched = if self.documents_required == 0 {
            self.ordered_sections.len()
        } else {
            self.documents_required
                .saturating_sub(self.missing_documents.len())
        };

        PlanSummary {
            compliance_score: self.compliance_score,
            documents_matched,
            documents_required: self.documents_required,
            document_list: self
                .ordered_sections
                .iter()
                .map(|s| s.name.clone())
                .collect(),
        }
    }
}

/// What the cover page shows about a plan.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PlanSummary {
    pub compliance_score: u8,
    pub documents_matched: usize,
    pub documents_required: usize,
    pub document_list: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExtractionMetadata {
    pub page_count: Option<u32>,
    pub file_size: u64,
    pub method: String,
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExtractedText {
    pub text: String,
    pub metadata: ExtractionMetadata,
}

/// A recoverable problem absorbed while producing a result.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    ExtractionError {
        file: String,
        message: String,
    },
    ParseDegradation {
        stage: String,
        message: String,
    },
    AdvisorUnavailable {
        reason: String,
    },
    RangeOutOfBounds {
        section: String,
        range: String,
        total_pages: u32,
    },
    AssetMissing {
        section: String,
        message: String,
    },
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degradation::ExtractionError { file, message } => {
                write!(f, "text extraction failed for {}: {}", file, message)
            }
            Degradation::ParseDegradation { stage, message } => {
                write!(f, "{} degraded: {}", stage, message)
            }
            Degradation::AdvisorUnavailable { reason } => {
                write!(f, "ordering advisor unavailable: {}", reason)
            }
            Degradation::RangeOutOfBounds {
                section,
                range,
                total_pages,
            } => write!(
                f,
                "range {} for '{}' clamped to a {}-page document",
                range, section, total_pages
            ),
            Degradation::AssetMissing { section, message } => {
                write!(f, "skipped '{}': {}", section, message)
            }
        }
    }
}
