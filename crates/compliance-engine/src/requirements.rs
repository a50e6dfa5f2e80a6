//! Lender requirement parsing
//!
//! Turns free-form lender correspondence (usually an email with a checklist)
//! into [`LenderRequirements`]. Parsing never fails: patterns that cannot be
//! compiled are skipped, and if the parser itself cannot be built the caller
//! gets a diagnostic requirement set instead.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;
use shared_types::LenderRequirements;
use tracing::{debug, warn};

use crate::error::EngineError;

/// Input beyond this many characters is ignored
pub const MAX_INPUT_CHARS: usize = 50_000;
pub const MAX_DOCUMENTS: usize = 50;
pub const MAX_INSTRUCTIONS: usize = 10;

const MAX_CANDIDATES: usize = 100;
const MAX_MATCHES_PER_GLYPH: usize = 50;
const MIN_DOCUMENT_LEN: usize = 6;
const MAX_DOCUMENT_LEN: usize = 199;

const KNOWN_LENDER_MARKER: &str = "symmetry";
const KNOWN_LENDER_NAME: &str = "Symmetry Lending";

/// Checklist lines starting with these (lower-cased) are prose, not documents
const NOISE_PREFIXES: &[&str] = &["below", "all ", "guard", "think", "st &", "1st &"];

const EMAIL: &str = r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}";

/// Checklist markers, tried in order
const CHECKLIST_GLYPHS: [(&str, &str); 8] = [
    ("open box", "☐"),
    ("checked box", "[☑☒✓✔]"),
    ("filled square", "[■▪]"),
    ("empty brackets", r"\[\s*\]"),
    ("open circle", "[○◯]"),
    ("filled circle", "[●◉]"),
    ("bullet", "[•·]"),
    ("dash", r"[-–—][ \t]"),
];

const INSTRUCTION_LABELS: [&str; 4] = [
    "special instructions:",
    "note:",
    "important:",
    "deadline:",
];

lazy_static! {
    static ref PARSER: Result<RequirementParser, EngineError> = RequirementParser::new();
}

/// Parse lender correspondence. Never fails.
pub fn parse_requirements(text: &str) -> LenderRequirements {
    match &*PARSER {
        Ok(parser) => parser.parse(text),
        Err(e) => {
            warn!("Requirement parser unavailable: {}", e);
            LenderRequirements::parse_failure(&e.to_string())
        }
    }
}

pub struct RequirementParser {
    contact_patterns: Vec<Regex>,
    currency: Regex,
    labelled_amount: Regex,
    checklist: Vec<(&'static str, Regex)>,
    instructions: Vec<(&'static str, Regex)>,
}

impl RequirementParser {
    pub fn new() -> Result<Self, EngineError> {
        let contact_patterns = vec![
            compile(&format!(
                r"(?i)From:[ \t]*([^<\n]+?)[ \t]*<[ \t]*({})[ \t]*>",
                EMAIL
            ))?,
            compile(&format!(
                r"([A-Za-z][A-Za-z .'\-]*?)[ \t]*<[ \t]*({})[ \t]*>",
                EMAIL
            ))?,
            compile(&format!("({})", EMAIL))?,
        ];

        // Checklist and instruction patterns are optional: one failing to
        // compile only loses that pattern.
        let checklist = CHECKLIST_GLYPHS
            .iter()
            .filter_map(|&(name, glyph)| {
                let pattern = format!(r"(?m)^[ \t]*{}[ \t]*([^\n]{{1,200}})", glyph);
                optional(name, &pattern)
            })
            .collect();
        let instructions = INSTRUCTION_LABELS
            .iter()
            .filter_map(|&label| {
                let pattern = format!(r"(?i){}[ \t]*([^\n]{{1,500}})", regex::escape(label));
                optional(label, &pattern)
            })
            .collect();

        Ok(Self {
            contact_patterns,
            currency: compile(r"\$[ \t]?\d[\d,]*(?:\.\d+)?")?,
            labelled_amount: compile(r"(?i)(?:amount|funding)[ \t]*:[ \t]*\$?[ \t]*(\d[\d,]*(?:\.\d+)?)")?,
            checklist,
            instructions,
        })
    }

    pub fn parse(&self, text: &str) -> LenderRequirements {
        let text = truncate_chars(text, MAX_INPUT_CHARS);
        let mut requirements = LenderRequirements::default();

        if let Some((name, email)) = self.extract_contact(text) {
            if let Some(name) = name {
                requirements.contact_name = name;
            }
            requirements.contact_email = email;
        }

        if let Some(lender) = resolve_lender_name(text, &requirements) {
            requirements.lender_name = lender;
        }

        if let Some(amount) = self.extract_funding_amount(text) {
            requirements.funding_amount = amount;
        }

        requirements.documents = self.extract_documents(text);

        let (instructions, deadline) = self.extract_instructions(text);
        requirements.special_instructions = instructions;
        requirements.deadline = deadline;

        debug!(
            lender = %requirements.lender_name,
            documents = requirements.documents.len(),
            instructions = requirements.special_instructions.len(),
            "Parsed lender requirements"
        );

        requirements
    }

    /// First contact pattern that matches wins
    fn extract_contact(&self, text: &str) -> Option<(Option<String>, String)> {
        for re in &self.contact_patterns {
            if let Some(caps) = re.captures(text) {
                let groups: Vec<&str> = caps
                    .iter()
                    .skip(1)
                    .flatten()
                    .map(|m| m.as_str())
                    .collect();
                return match groups.as_slice() {
                    [name, email] => {
                        let name = name.trim().trim_matches('"').trim();
                        let name = (!name.is_empty()).then(|| name.to_string());
                        Some((name, email.to_string()))
                    }
                    [email] => Some((None, email.to_string())),
                    _ => None,
                };
            }
        }
        None
    }

    fn extract_funding_amount(&self, text: &str) -> Option<String> {
        let raw = self
            .currency
            .find(text)
            .map(|m| m.as_str().to_string())
            .or_else(|| {
                self.labelled_amount
                    .captures(text)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
            })?;

        let digits: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '$')
            .collect();
        Some(format!("${}", digits))
    }

    fn extract_documents(&self, text: &str) -> Vec<String> {
        let mut candidates = BTreeSet::new();

        'glyphs: for (name, re) in &self.checklist {
            for caps in re.captures_iter(text).take(MAX_MATCHES_PER_GLYPH) {
                let Some(line) = caps.get(1) else { continue };
                let candidate = line.as_str().trim();
                if !is_document_candidate(candidate) {
                    continue;
                }
                if candidates.len() >= MAX_CANDIDATES {
                    debug!(glyph = *name, "Checklist candidate cap reached");
                    break 'glyphs;
                }
                candidates.insert(candidate.to_string());
            }
        }

        candidates.into_iter().take(MAX_DOCUMENTS).collect()
    }

    fn extract_instructions(&self, text: &str) -> (Vec<String>, Option<String>) {
        let mut instructions = Vec::new();
        let mut deadline = None;

        for (label, re) in &self.instructions {
            for caps in re.captures_iter(text) {
                let Some(body) = caps.get(1) else { continue };
                let body = body.as_str().trim();
                if body.is_empty() {
                    continue;
                }
                if *label == "deadline:" && deadline.is_none() {
                    deadline = Some(body.to_string());
                }
                if instructions.len() < MAX_INSTRUCTIONS {
                    instructions.push(body.to_string());
                }
            }
        }

        (instructions, deadline)
    }
}

fn compile(pattern: &str) -> Result<Regex, EngineError> {
    Regex::new(pattern).map_err(|e| EngineError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

fn optional(name: &'static str, pattern: &str) -> Option<(&'static str, Regex)> {
    match Regex::new(pattern) {
        Ok(re) => Some((name, re)),
        Err(e) => {
            warn!("Skipping requirement pattern '{}': {}", name, e);
            None
        }
    }
}

fn is_document_candidate(candidate: &str) -> bool {
    let len = candidate.chars().count();
    if !(MIN_DOCUMENT_LEN..=MAX_DOCUMENT_LEN).contains(&len) {
        return false;
    }
    if candidate.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let lower = candidate.to_lowercase();
    !NOISE_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
}

fn resolve_lender_name(text: &str, requirements: &LenderRequirements) -> Option<String> {
    if text.to_lowercase().contains(KNOWN_LENDER_MARKER) {
        return Some(KNOWN_LENDER_NAME.to_string());
    }
    let domain = requirements.contact_email.split_once('@')?.1;
    let label = domain.split('.').next().filter(|l| !l.is_empty())?;
    Some(format!("{} Lending", title_case(label)))
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest
fn title_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut start_of_run = true;
    for c in word.chars() {
        if c.is_alphabetic() {
            if start_of_run {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            start_of_run = false;
        } else {
            out.push(c);
            start_of_run = true;
        }
    }
    out
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use shared_types::types::{UNKNOWN_AMOUNT, UNKNOWN_LENDER};

    const SAMPLE: &str = "From: Jane Doe <jane@acmelending.com>\n\
        Subject: Closing package\n\
        \n\
        Please send the following:\n\
        ☐ Flood Certificate\n\
        ☐ Title Insurance\n\
        Amount: $350,000\n";

    #[test]
    fn test_parses_example_email() {
        let req = parse_requirements(SAMPLE);
        assert_eq!(req.lender_name, "Acmelending Lending");
        assert_eq!(req.contact_name, "Jane Doe");
        assert_eq!(req.contact_email, "jane@acmelending.com");
        assert_eq!(req.funding_amount, "$350,000");
        assert!(req.documents.contains(&"Flood Certificate".to_string()));
        assert!(req.documents.contains(&"Title Insurance".to_string()));
    }

    #[test]
    fn test_known_lender_marker_wins() {
        let req = parse_requirements("From: Bo <bo@example.com>\nSymmetry closing desk");
        assert_eq!(req.lender_name, KNOWN_LENDER_NAME);
    }

    #[test]
    fn test_contact_without_from_prefix() {
        let req = parse_requirements("Reply to Mark Lee <mark@north-star.com> today");
        assert_eq!(req.contact_email, "mark@north-star.com");
        assert_eq!(req.contact_name, "Reply to Mark Lee");
        assert_eq!(req.lender_name, "North-Star Lending");
    }

    #[test]
    fn test_bare_email_keeps_default_name() {
        let req = parse_requirements("write to closings@harbor.io");
        assert_eq!(req.contact_email, "closings@harbor.io");
        assert_eq!(req.contact_name, shared_types::types::UNKNOWN_CONTACT);
        assert_eq!(req.lender_name, "Harbor Lending");
    }

    #[test]
    fn test_defaults_when_nothing_matches() {
        let req = parse_requirements("nothing useful here");
        assert_eq!(req.lender_name, UNKNOWN_LENDER);
        assert_eq!(req.funding_amount, UNKNOWN_AMOUNT);
        assert!(req.documents.is_empty());
    }

    #[test]
    fn test_labelled_amount_is_normalized() {
        let req = parse_requirements("Funding: 125,500.25");
        assert_eq!(req.funding_amount, "$125,500.25");
    }

    #[test]
    fn test_checklist_filters_noise() {
        let text = "• Below are the items\n\
                    • All documents must be signed\n\
                    • 123456\n\
                    • short\n\
                    [ ] Hazard Insurance Declaration\n\
                    - Survey\n\
                    - Payoff Letter\n\
                    ● Payoff Letter\n";
        let req = parse_requirements(text);
        assert_eq!(
            req.documents,
            vec!["Hazard Insurance Declaration", "Payoff Letter", "Survey"]
        );
    }

    #[test]
    fn test_documents_are_sorted() {
        let req = parse_requirements("☐ Zoning Letter\n☐ Appraisal Report\n☐ Mortgage Note\n");
        assert_eq!(
            req.documents,
            vec!["Appraisal Report", "Mortgage Note", "Zoning Letter"]
        );
    }

    #[test]
    fn test_instructions_and_deadline() {
        let text = "Special Instructions: wire before noon\n\
                    Note: use blue ink\n\
                    Deadline: Friday 5pm\n";
        let req = parse_requirements(text);
        assert_eq!(req.special_instructions.len(), 3);
        assert_eq!(req.deadline.as_deref(), Some("Friday 5pm"));
    }

    #[test]
    fn test_instructions_capped() {
        let text = "Note: something to remember\n".repeat(40);
        let req = parse_requirements(&text);
        assert_eq!(req.special_instructions.len(), MAX_INSTRUCTIONS);
    }

    #[test]
    fn test_documents_capped() {
        let text: String = (0..300)
            .map(|i| format!("☐ Required document number {:03}\n", i))
            .collect();
        let req = parse_requirements(&text);
        assert_eq!(req.documents.len(), MAX_DOCUMENTS);
    }

    #[test]
    fn test_overlong_checklist_line_is_dropped() {
        let text = format!("☐ {}\n☐ Title Insurance\n", "x".repeat(400));
        let req = parse_requirements(&text);
        assert_eq!(req.documents, vec!["Title Insurance"]);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("acmelending"), "Acmelending");
        assert_eq!(title_case("north-star"), "North-Star");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    fn checklist_line() -> impl Strategy<Value = String> {
        (
            prop_oneof![
                Just("☐ "),
                Just("☑ "),
                Just("[ ] "),
                Just("○ "),
                Just("• "),
                Just("- "),
                Just("Note: "),
                Just(""),
            ],
            "[a-zA-Z0-9 &$<>@.:]{0,260}",
        )
            .prop_map(|(glyph, body)| format!("{}{}", glyph, body))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Caps hold for arbitrary checklist-heavy input
        #[test]
        fn caps_always_hold(lines in prop::collection::vec(checklist_line(), 0..400)) {
            let req = parse_requirements(&lines.join("\n"));
            prop_assert!(req.documents.len() <= MAX_DOCUMENTS);
            prop_assert!(req.special_instructions.len() <= MAX_INSTRUCTIONS);
            let unique: BTreeSet<_> = req.documents.iter().collect();
            prop_assert_eq!(unique.len(), req.documents.len());
            let mut sorted = req.documents.clone();
            sorted.sort();
            prop_assert_eq!(sorted, req.documents);
        }

        /// Arbitrary unicode never panics
        #[test]
        fn arbitrary_text_never_panics(text in "\\PC{0,2000}") {
            let req = parse_requirements(&text);
            prop_assert!(req.funding_amount.starts_with('$') || req.funding_amount == UNKNOWN_AMOUNT);
        }
    }
}
