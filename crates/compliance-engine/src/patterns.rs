//! Pattern rules for labelling document text
//!
//! A [`RuleBook`] holds user-editable rules, each a regex pattern with a
//! label. Rules come from an industry template and can be added or removed
//! at runtime.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;

/// Confidence reported for a classification never exceeds this
pub const MAX_CLASSIFICATION_CONFIDENCE: u32 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Pattern matches anywhere, case-insensitively
    Contains,
    /// Pattern must match as a whole word, case-insensitively
    Exact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: u32,
    pub pattern: String,
    #[serde(rename = "type")]
    pub kind: RuleKind,
    pub label: String,
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    3
}

/// A rule as submitted by a client, before it receives an id.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRule {
    pub pattern: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: RuleKind,
    pub label: String,
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_kind() -> RuleKind {
    RuleKind::Contains
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryMatch {
    pub section: String,
    pub confidence: u32,
    pub pattern_matched: String,
    pub matches: usize,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: Rule,
    regex: Regex,
}

impl CompiledRule {
    fn compile(rule: Rule) -> Result<Self, EngineError> {
        let source = match rule.kind {
            RuleKind::Contains => rule.pattern.clone(),
            RuleKind::Exact => format!(r"\b(?:{})\b", rule.pattern),
        };
        let regex = RegexBuilder::new(&source)
            .case_insensitive(true)
            .size_limit(1 << 20)
            .build()
            .map_err(|e| EngineError::InvalidPattern {
                pattern: rule.pattern.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { rule, regex })
    }
}

/// Ordered, editable set of pattern rules
#[derive(Debug, Clone)]
pub struct RuleBook {
    rules: Vec<CompiledRule>,
}

impl RuleBook {
    pub fn new(rules: Vec<Rule>) -> Result<Self, EngineError> {
        let rules = rules
            .into_iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Rule book seeded from a built-in industry template
    pub fn for_industry(industry: Industry) -> Self {
        let rules = industry
            .rule_specs()
            .iter()
            .enumerate()
            .filter_map(|(i, (pattern, label))| {
                CompiledRule::compile(Rule {
                    id: i as u32 + 1,
                    pattern: pattern.to_string(),
                    kind: RuleKind::Contains,
                    label: label.to_string(),
                    priority: default_priority(),
                })
                .ok()
            })
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> Vec<Rule> {
        self.rules.iter().map(|r| r.rule.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Add a rule; its id is one past the current maximum
    pub fn add(&mut self, new_rule: NewRule) -> Result<Rule, EngineError> {
        if new_rule.label.trim().is_empty() {
            return Err(EngineError::InvalidRule("label must not be empty".into()));
        }
        let id = self.rules.iter().map(|r| r.rule.id).max().unwrap_or(0) + 1;
        let compiled = CompiledRule::compile(Rule {
            id,
            pattern: new_rule.pattern,
            kind: new_rule.kind,
            label: new_rule.label.trim().to_string(),
            priority: new_rule.priority,
        })?;
        let rule = compiled.rule.clone();
        self.rules.push(compiled);
        Ok(rule)
    }

    /// Remove a rule by id. Returns false if no rule had that id.
    pub fn remove(&mut self, id: u32) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.rule.id != id);
        self.rules.len() != before
    }

    /// Label the text with every rule that matches it
    pub fn classify(&self, text: &str) -> Vec<CategoryMatch> {
        self.rules
            .iter()
            .filter_map(|compiled| {
                let matches = compiled.regex.find_iter(text).count();
                if matches == 0 {
                    return None;
                }
                debug!(label = %compiled.rule.label, matches, "rule matched");
                Some(CategoryMatch {
                    section: compiled.rule.label.clone(),
                    confidence: (matches as u32 * 10).min(MAX_CLASSIFICATION_CONFIDENCE),
                    pattern_matched: compiled.rule.pattern.clone(),
                    matches,
                })
            })
            .collect()
    }

    /// Byte span of the first match of the rule labelled `label`
    pub fn locate(&self, label: &str, text: &str) -> Option<(usize, usize)> {
        self.rules
            .iter()
            .filter(|r| r.rule.label == label)
            .find_map(|r| r.regex.find(text).map(|m| (m.start(), m.end())))
    }
}

impl Default for RuleBook {
    fn default() -> Self {
        Self::for_industry(Industry::Mortgage)
    }
}

/// Built-in rule templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Industry {
    Mortgage,
    Legal,
    Healthcare,
    Financial,
    Hr,
}

impl Industry {
    pub const ALL: [Industry; 5] = [
        Industry::Mortgage,
        Industry::Legal,
        Industry::Healthcare,
        Industry::Financial,
        Industry::Hr,
    ];

    /// Parse an industry key; anything unknown falls back to mortgage
    pub fn from_key(key: &str) -> Self {
        match key.trim().to_lowercase().as_str() {
            "legal" => Industry::Legal,
            "healthcare" => Industry::Healthcare,
            "financial" => Industry::Financial,
            "hr" => Industry::Hr,
            _ => Industry::Mortgage,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Industry::Mortgage => "mortgage",
            Industry::Legal => "legal",
            Industry::Healthcare => "healthcare",
            Industry::Financial => "financial",
            Industry::Hr => "hr",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Industry::Mortgage => "Mortgage & Real Estate",
            Industry::Legal => "Legal & Law Firms",
            Industry::Healthcare => "Healthcare & Medical",
            Industry::Financial => "Financial Services",
            Industry::Hr => "Human Resources",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Industry::Mortgage => "Loan processing, closing documents, property records",
            Industry::Legal => "Contracts, agreements, case files, legal documents",
            Industry::Healthcare => "Medical records, insurance claims, patient documents",
            Industry::Financial => "Banking, investments, insurance, financial documents",
            Industry::Hr => "Employee records, resumes, HR documents",
        }
    }

    pub fn document_types(&self) -> Vec<&'static str> {
        self.rule_specs().iter().map(|(_, label)| *label).collect()
    }

    fn rule_specs(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Industry::Mortgage => MORTGAGE_RULES,
            Industry::Legal => LEGAL_RULES,
            Industry::Healthcare => HEALTHCARE_RULES,
            Industry::Financial => FINANCIAL_RULES,
            Industry::Hr => HR_RULES,
        }
    }
}

const MORTGAGE_RULES: &[(&str, &str)] = &[
    ("MORTGAGE|DEED OF TRUST", "Mortgage"),
    ("PROMISSORY NOTE", "Promissory Note"),
    ("CLOSING INSTRUCTIONS", "Lenders Closing Instructions Guaranty"),
    ("ANTI.?COERCION", "Statement of Anti Coercion Florida"),
    ("POWER OF ATTORNEY", "Correction Agreement and Limited Power of Attorney"),
    ("ACKNOWLEDGMENT", "All Purpose Acknowledgment"),
    ("FLOOD HAZARD", "Flood Hazard Determination"),
    ("AUTOMATIC PAYMENT", "Automatic Payments Authorization"),
    ("TAX RECORD", "Tax Record Information"),
];

const LEGAL_RULES: &[(&str, &str)] = &[
    ("CONTRACT|AGREEMENT", "Contract Agreement"),
    ("NON.?DISCLOSURE|NDA", "Non-Disclosure Agreement"),
    ("EMPLOYMENT", "Employment Contract"),
    ("LEASE", "Lease Agreement"),
    ("PURCHASE", "Purchase Agreement"),
    ("BRIEF", "Legal Brief"),
    ("COURT|FILING", "Court Filing"),
    ("POWER OF ATTORNEY", "Power of Attorney"),
    ("WILL|TESTAMENT", "Will & Testament"),
    ("BYLAWS", "Corporate Bylaws"),
];

const HEALTHCARE_RULES: &[(&str, &str)] = &[
    ("MEDICAL RECORD|PATIENT RECORD", "Medical Record"),
    ("INSURANCE CLAIM|CLAIM FORM", "Insurance Claim"),
    ("PATIENT CONSENT|INFORMED CONSENT", "Patient Consent"),
    ("LAB REPORT|LABORATORY", "Lab Report"),
    ("PRESCRIPTION|RX", "Prescription"),
    ("TREATMENT PLAN", "Treatment Plan"),
    ("DISCHARGE SUMMARY", "Discharge Summary"),
    ("MEDICAL HISTORY", "Medical History"),
    ("AUTHORIZATION", "Insurance Authorization"),
    ("HIPAA", "HIPAA Form"),
];

const FINANCIAL_RULES: &[(&str, &str)] = &[
    ("BANK STATEMENT|ACCOUNT STATEMENT", "Bank Statement"),
    ("INVESTMENT|PORTFOLIO", "Investment Report"),
    ("INSURANCE POLICY|POLICY", "Insurance Policy"),
    ("TAX|1099|W-2|1040", "Tax Document"),
    ("FINANCIAL STATEMENT", "Financial Statement"),
    ("CREDIT REPORT|CREDIT SCORE", "Credit Report"),
    ("LOAN APPLICATION", "Loan Application"),
    ("ACCOUNT AGREEMENT", "Account Agreement"),
    ("COMPLIANCE", "Compliance Report"),
    ("AUDIT", "Audit Report"),
];

const HR_RULES: &[(&str, &str)] = &[
    ("RESUME|CV|CURRICULUM VITAE", "Resume"),
    ("JOB APPLICATION|APPLICATION", "Job Application"),
    ("EMPLOYEE HANDBOOK|HANDBOOK", "Employee Handbook"),
    ("PERFORMANCE REVIEW|EVALUATION", "Performance Review"),
    ("EMPLOYMENT CONTRACT", "Employment Contract"),
    ("BENEFITS|ENROLLMENT", "Benefits Enrollment"),
    ("TIME SHEET|TIMESHEET", "Time Sheet"),
    ("PAYROLL", "Payroll Record"),
    ("TRAINING|CERTIFICATE", "Training Certificate"),
    ("BACKGROUND CHECK", "Background Check"),
];

/// Extract a snippet around a byte span (about 50 bytes of context each side)
pub fn extract_snippet(text: &str, start: usize, end: usize) -> String {
    let from = floor_char_boundary(text, start.saturating_sub(50));
    let to = floor_char_boundary(text, (end + 50).min(text.len()));
    let snippet: String = text[from..to].split_whitespace().collect::<Vec<_>>().join(" ");
    format!("...{}...", snippet)
}

/// Find a keyword case-insensitively, returning its byte span in `text`
pub fn find_text_position(text: &str, keyword: &str) -> Option<(usize, usize)> {
    if keyword.is_empty() {
        return None;
    }
    let re = RegexBuilder::new(&regex::escape(keyword))
        .case_insensitive(true)
        .build()
        .ok()?;
    re.find(text).map(|m| (m.start(), m.end()))
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
