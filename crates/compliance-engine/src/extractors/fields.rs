// Structured field extraction for loan documents
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

/// Accepted loan amounts, inclusive
const MIN_LOAN_AMOUNT: f64 = 1_000.0;
const MAX_LOAN_AMOUNT: f64 = 10_000_000.0;

const MAX_DATES: usize = 5;
const MAX_LINE_FIELD_LEN: usize = 100;

lazy_static! {
    static ref DOLLAR_AMOUNT: Regex = Regex::new(r"\$\d[\d,]*(?:\.\d+)?").unwrap();
    static ref LABELLED_AMOUNT: Regex =
        Regex::new(r"(?i)(?:amount|loan)[:\s]+\$?(\d[\d,]*(?:\.\d+)?)").unwrap();
    static ref BORROWER: Regex =
        Regex::new(r"(?i)(?:borrower|applicant|mortgagor)[:\s]+([A-Za-z ]+)").unwrap();
    static ref ADDRESS: Regex =
        Regex::new(r"(?i)(?:property|address|located at)[:\s]+([^\n\r]+)").unwrap();
    static ref LENDER: Regex =
        Regex::new(r"(?i)(?:lender|bank|mortgage company)[:\s]+([^\n\r]+)").unwrap();
    static ref DATES: Vec<Regex> = vec![
        Regex::new(r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b").unwrap(),
        Regex::new(r"(?i)\b\d{1,2}\s+(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{2,4}\b").unwrap(),
        Regex::new(r"(?i)\b(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{2,4}\b").unwrap(),
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borrower_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_address: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub important_dates: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lender_info: Option<String>,
}

impl ExtractedFields {
    /// Number of fields that were found
    pub fn found(&self) -> usize {
        [
            self.loan_amount.is_some(),
            self.borrower_name.is_some(),
            self.property_address.is_some(),
            !self.important_dates.is_empty(),
            self.lender_info.is_some(),
        ]
        .iter()
        .filter(|found| **found)
        .count()
    }
}

pub fn extract_fields(text: &str) -> ExtractedFields {
    ExtractedFields {
        loan_amount: extract_loan_amount(text),
        borrower_name: extract_borrower_name(text),
        property_address: extract_property_address(text),
        important_dates: extract_dates(text),
        lender_info: extract_lender_info(text),
    }
}

/// First dollar or labelled amount inside the plausible loan range
pub fn extract_loan_amount(text: &str) -> Option<String> {
    let candidates = DOLLAR_AMOUNT
        .find(text)
        .map(|m| m.as_str().to_string())
        .into_iter()
        .chain(
            LABELLED_AMOUNT
                .captures(text)
                .and_then(|c| c.get(1))
                .map(|m| format!("${}", m.as_str())),
        );

    for amount in candidates {
        if let Ok(value) = amount.trim_start_matches('$').replace(',', "").parse::<f64>() {
            if (MIN_LOAN_AMOUNT..=MAX_LOAN_AMOUNT).contains(&value) {
                return Some(amount);
            }
        }
    }
    None
}

/// Name of 2-4 words, each at least two letters, after a borrower label
pub fn extract_borrower_name(text: &str) -> Option<String> {
    let name = BORROWER.captures(text)?.get(1)?.as_str().trim();
    let words: Vec<&str> = name.split_whitespace().collect();
    if (2..=4).contains(&words.len()) && words.iter().all(|w| w.len() >= 2) {
        Some(words.join(" "))
    } else {
        None
    }
}

pub fn extract_property_address(text: &str) -> Option<String> {
    let address = ADDRESS.captures(text)?.get(1)?.as_str().trim();
    let has_number = address.chars().any(|c| c.is_ascii_digit());
    if has_number && address.split_whitespace().count() >= 3 {
        Some(address.chars().take(MAX_LINE_FIELD_LEN).collect())
    } else {
        None
    }
}

/// Distinct dates in order of appearance, at most five
pub fn extract_dates(text: &str) -> Vec<String> {
    let mut dates: Vec<String> = Vec::new();
    for re in DATES.iter() {
        for m in re.find_iter(text) {
            let date = m.as_str().to_string();
            if !dates.contains(&date) {
                dates.push(date);
            }
        }
    }
    dates.truncate(MAX_DATES);
    dates
}

pub fn extract_lender_info(text: &str) -> Option<String> {
    let lender = LENDER.captures(text)?.get(1)?.as_str().trim();
    if lender.split_whitespace().count() >= 2 {
        Some(lender.chars().take(MAX_LINE_FIELD_LEN).collect())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_loan_amount() {
        assert_eq!(
            extract_loan_amount("Loan amount of $350,000.00 due"),
            Some("$350,000.00".to_string())
        );
        assert_eq!(
            extract_loan_amount("Amount: 250000"),
            Some("$250000".to_string())
        );
        // Fee too small to be a loan
        assert_eq!(extract_loan_amount("Recording fee $25"), None);
    }

    #[test]
    fn test_extract_borrower_name() {
        // Single-letter initial fails the word-length check
        assert_eq!(extract_borrower_name("Borrower: John Q Public\n"), None);
        assert_eq!(
            extract_borrower_name("Borrower: Jane Doe\n"),
            Some("Jane Doe".to_string())
        );
        assert_eq!(extract_borrower_name("Borrower: X\n"), None);
    }

    #[test]
    fn test_extract_property_address() {
        assert_eq!(
            extract_property_address("Property: 123 Main Street, Miami FL"),
            Some("123 Main Street, Miami FL".to_string())
        );
        assert_eq!(extract_property_address("Property: none given"), None);
    }

    #[test]
    fn test_extract_dates_dedupes_and_caps() {
        let text = "01/02/2024 01/02/2024 March 3, 2024 4 April 2024 \
                    05/06/2024 07/08/2024 09/10/2024 11/12/2024";
        let dates = extract_dates(text);
        assert_eq!(dates.len(), 5);
        assert_eq!(dates[0], "01/02/2024");
        assert_eq!(dates.iter().filter(|d| *d == "01/02/2024").count(), 1);
    }

    #[test]
    fn test_extract_lender_info() {
        assert_eq!(
            extract_lender_info("Lender: First Coast Mortgage LLC\n"),
            Some("First Coast Mortgage LLC".to_string())
        );
        assert_eq!(extract_lender_info("Lender: TBD\n"), None);
    }

    #[test]
    fn test_found_counts_fields() {
        let fields = extract_fields("Borrower: Jane Doe\nAmount: $300,000\n");
        assert_eq!(fields.found(), 2);
    }
}
