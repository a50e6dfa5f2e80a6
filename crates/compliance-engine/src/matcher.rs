//! Requirement matching and plan construction
//!
//! [`build_plan`] resolves the final section order. An advisor proposal, when
//! present, decides the order of the sections it names; everything it leaves
//! out follows in catalog order. The result is always a permutation of the
//! input sections.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{LenderRequirements, ReorganizationPlan, Section};
use tracing::{debug, warn};

/// Score used when the advisor gives no compliance signal
pub const DEFAULT_COMPLIANCE_SCORE: u8 = 95;

const ORDER_KEYS: [&str; 5] = [
    "orderedDocumentNames",
    "ordered_document_names",
    "orderedDocuments",
    "document_order",
    "order",
];
const SCORE_KEYS: [&str; 2] = ["complianceScore", "compliance_score"];
const MISSING_KEYS: [&str; 2] = ["missingDocuments", "missing_documents"];

/// What an ordering advisor suggested, as far as its reply could be read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvisorProposal {
    pub ordered_document_names: Vec<String>,
    pub compliance_score: Option<u8>,
    pub missing_documents: Option<Vec<String>>,
}

/// Parse free-form advisor output that should contain a JSON payload.
///
/// Accepts a bare JSON object or array, a fenced code block, or JSON
/// embedded in prose. Returns `None` if no list of names can be recovered.
pub fn parse_advisor_output(raw: &str) -> Option<AdvisorProposal> {
    let value = candidate_payloads(raw)
        .into_iter()
        .find_map(|candidate| serde_json::from_str::<Value>(candidate).ok())?;

    let proposal = match &value {
        Value::Array(items) => AdvisorProposal {
            ordered_document_names: names_from(items),
            ..AdvisorProposal::default()
        },
        Value::Object(map) => {
            let items = ORDER_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_array))?;
            AdvisorProposal {
                ordered_document_names: names_from(items),
                compliance_score: SCORE_KEYS
                    .iter()
                    .find_map(|key| map.get(*key))
                    .and_then(score_from),
                missing_documents: MISSING_KEYS
                    .iter()
                    .find_map(|key| map.get(*key).and_then(Value::as_array))
                    .map(|items| names_from(items)),
            }
        }
        _ => return None,
    };

    debug!(
        names = proposal.ordered_document_names.len(),
        "Parsed advisor proposal"
    );
    Some(proposal)
}

fn candidate_payloads(raw: &str) -> Vec<&str> {
    let trimmed = raw.trim();
    let mut candidates = vec![trimmed];

    if let Some(start) = trimmed.find("```") {
        let body = &trimmed[start + 3..];
        let body = body.strip_prefix("json").unwrap_or(body);
        if let Some(end) = body.find("```") {
            candidates.push(body[..end].trim());
        }
    }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            candidates.push(&trimmed[start..=end]);
        }
    }
    if let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']')) {
        if start < end {
            candidates.push(&trimmed[start..=end]);
        }
    }

    candidates
}

/// Strings are taken as-is; objects contribute their `name` or `title`
fn names_from(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(map) => ["name", "title", "section"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str))
                .map(|s| s.trim().to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn score_from(value: &Value) -> Option<u8> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok()?,
        _ => return None,
    };
    if number.is_finite() {
        Some(number.round().clamp(0.0, 100.0) as u8)
    } else {
        None
    }
}

/// Order sections and compute compliance metrics.
pub fn build_plan(
    sections: Vec<Section>,
    requirements: Option<&LenderRequirements>,
    proposal: Option<&AdvisorProposal>,
) -> ReorganizationPlan {
    let ordered_sections = match proposal {
        Some(p) => order_by_proposal(sections, &p.ordered_document_names),
        None => sections,
    };

    let required: &[String] = requirements.map(|r| r.documents.as_slice()).unwrap_or(&[]);
    let missing_documents = missing_documents(&ordered_sections, required, proposal);

    ReorganizationPlan {
        compliance_score: proposal
            .and_then(|p| p.compliance_score)
            .unwrap_or(DEFAULT_COMPLIANCE_SCORE),
        missing_documents,
        documents_required: required.len(),
        advisor_used: proposal.is_some(),
        ordered_sections,
    }
}

fn order_by_proposal(sections: Vec<Section>, names: &[String]) -> Vec<Section> {
    let mut remaining: Vec<Option<Section>> = sections.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(remaining.len());

    for name in names {
        let slot = remaining
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|s| &s.name == name));
        match slot.and_then(Option::take) {
            Some(section) => ordered.push(section),
            None => debug!(name = %name, "Advisor named an unknown section, ignoring"),
        }
    }

    let appended = remaining.iter().filter(|s| s.is_some()).count();
    if appended > 0 && !names.is_empty() {
        warn!(appended, "Advisor order omitted sections, appending in catalog order");
    }
    ordered.extend(remaining.into_iter().flatten());
    ordered
}

/// Required documents with no section of the same name.
///
/// An advisor may report fuzzy misses; those are kept only if they are
/// actually required.
fn missing_documents(
    sections: &[Section],
    required: &[String],
    proposal: Option<&AdvisorProposal>,
) -> Vec<String> {
    if let Some(reported) = proposal.and_then(|p| p.missing_documents.as_ref()) {
        return required
            .iter()
            .filter(|doc| reported.contains(doc))
            .cloned()
            .collect();
    }
    required
        .iter()
        .filter(|doc| !sections.iter().any(|s| &s.name == *doc))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmenter::segment;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn names(plan: &ReorganizationPlan) -> Vec<String> {
        plan.ordered_sections.iter().map(|s| s.name.clone()).collect()
    }

    fn proposal(order: &[&str]) -> AdvisorProposal {
        AdvisorProposal {
            ordered_document_names: order.iter().map(|s| s.to_string()).collect(),
            ..AdvisorProposal::default()
        }
    }

    #[test]
    fn test_identity_without_advisor() {
        let sections = segment("", "a.pdf", None);
        let expected: Vec<String> = sections.iter().map(|s| s.name.clone()).collect();
        let plan = build_plan(sections, None, None);
        assert_eq!(names(&plan), expected);
        assert_eq!(plan.compliance_score, DEFAULT_COMPLIANCE_SCORE);
        assert!(!plan.advisor_used);
    }

    #[test]
    fn test_advisor_order_then_remaining_in_catalog_order() {
        let sections = segment("", "a.pdf", None);
        let plan = build_plan(
            sections,
            None,
            Some(&proposal(&["Tax Record Information", "Nonexistent", "Promissory Note"])),
        );
        let ordered = names(&plan);
        assert_eq!(ordered[0], "Tax Record Information");
        assert_eq!(ordered[1], "Promissory Note");
        assert_eq!(ordered[2], "Mortgage");
        assert_eq!(ordered[3], "Lenders Closing Instructions Guaranty");
        assert_eq!(ordered.len(), 9);
        assert!(plan.advisor_used);
    }

    #[test]
    fn test_duplicate_advisor_names_do_not_duplicate_sections() {
        let sections = segment("", "a.pdf", None);
        let plan = build_plan(sections, None, Some(&proposal(&["Mortgage", "Mortgage"])));
        assert_eq!(names(&plan).iter().filter(|n| *n == "Mortgage").count(), 1);
    }

    #[test]
    fn test_missing_documents_exact_match() {
        let req = LenderRequirements {
            documents: vec!["Mortgage".into(), "Survey Report".into()],
            ..LenderRequirements::default()
        };
        let plan = build_plan(segment("", "a.pdf", None), Some(&req), None);
        assert_eq!(plan.missing_documents, vec!["Survey Report"]);
        assert_eq!(plan.summary().documents_matched, 1);
    }

    #[test]
    fn test_advisor_missing_list_is_filtered_to_required() {
        let req = LenderRequirements {
            documents: vec!["Survey Report".into(), "Wire Form".into()],
            ..LenderRequirements::default()
        };
        let mut p = proposal(&[]);
        p.missing_documents = Some(vec!["Wire Form".into(), "Invented".into()]);
        p.compliance_score = Some(70);
        let plan = build_plan(segment("", "a.pdf", None), Some(&req), Some(&p));
        assert_eq!(plan.missing_documents, vec!["Wire Form"]);
        assert_eq!(plan.compliance_score, 70);
    }

    #[test]
    fn test_parse_plain_object() {
        let p = parse_advisor_output(
            r#"{"orderedDocumentNames": ["Mortgage", "Promissory Note"], "complianceScore": 88}"#,
        )
        .unwrap();
        assert_eq!(p.ordered_document_names, vec!["Mortgage", "Promissory Note"]);
        assert_eq!(p.compliance_score, Some(88));
    }

    #[test]
    fn test_parse_embedded_in_prose() {
        let raw = "Sure! Here is the order you asked for:\n\
                   {\"ordered_document_names\": [\"Promissory Note\"], \"compliance_score\": \"91%\"}\n\
                   Let me know if you need anything else.";
        let p = parse_advisor_output(raw).unwrap();
        assert_eq!(p.ordered_document_names, vec!["Promissory Note"]);
        assert_eq!(p.compliance_score, Some(91));
    }

    #[test]
    fn test_parse_fenced_block() {
        let raw = "```json\n{\"order\": [{\"name\": \"Mortgage\"}, 7, \"\"]}\n```";
        let p = parse_advisor_output(raw).unwrap();
        assert_eq!(p.ordered_document_names, vec!["Mortgage"]);
    }

    #[test]
    fn test_parse_bare_array() {
        let p = parse_advisor_output("[\"Mortgage\", \"Tax Record Information\"]").unwrap();
        assert_eq!(p.ordered_document_names.len(), 2);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_advisor_output("no json here").is_none());
        assert!(parse_advisor_output("{\"unrelated\": true}").is_none());
        assert!(parse_advisor_output("{ broken json [").is_none());
        assert!(parse_advisor_output("42").is_none());
    }

    #[test]
    fn test_score_is_clamped() {
        let p = parse_advisor_output(r#"{"order": [], "complianceScore": 250}"#).unwrap();
        assert_eq!(p.compliance_score, Some(100));
    }

    proptest! {
        /// Any advisor output yields a permutation of the input sections
        #[test]
        fn ordering_is_total(
            order in prop::collection::vec(
                prop_oneof![
                    prop::sample::select(crate::segmenter::CANONICAL_SECTIONS.to_vec())
                        .prop_map(String::from),
                    "[A-Za-z ]{0,20}",
                ],
                0..20,
            ),
            extra in prop::collection::vec("[A-Z][a-z]{5,12}", 0..5),
        ) {
            let req = LenderRequirements { documents: extra, ..LenderRequirements::default() };
            let sections = segment("", "a.pdf", Some(&req));
            let mut expected: HashMap<String, usize> = HashMap::new();
            for s in &sections {
                *expected.entry(s.name.clone()).or_default() += 1;
            }

            let p = AdvisorProposal { ordered_document_names: order, ..AdvisorProposal::default() };
            let plan = build_plan(sections.clone(), Some(&req), Some(&p));

            prop_assert_eq!(plan.ordered_sections.len(), sections.len());
            let mut actual: HashMap<String, usize> = HashMap::new();
            for s in &plan.ordered_sections {
                *actual.entry(s.name.clone()).or_default() += 1;
            }
            prop_assert_eq!(actual, expected);
        }

        /// Garbage advisor text never panics
        #[test]
        fn advisor_parsing_never_panics(raw in "\\PC{0,400}") {
            let _ = parse_advisor_output(&raw);
        }
    }
}
