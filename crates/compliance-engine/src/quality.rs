//! Heuristic quality scores for extracted text

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::patterns::CategoryMatch;

lazy_static! {
    static ref PROPER_NAME: Regex = Regex::new(r"[A-Z][a-z]+\s+[A-Z][a-z]+").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub overall_quality: u8,
    pub processing_quality: u8,
    pub analysis_confidence: u8,
    pub extraction_completeness: u8,
}

/// Score how usable an extraction looks, 70-95
pub fn extraction_quality(text: &str) -> u8 {
    let mut score: u32 = 70;

    let words = text.split_whitespace().count();
    if words > 100 {
        score += 10;
    }
    if words > 500 {
        score += 10;
    }
    if text.chars().any(|c| c.is_ascii_digit()) {
        score += 5;
    }
    if PROPER_NAME.is_match(text) {
        score += 5;
    }

    score.min(95) as u8
}

/// Combine extraction quality with classification results.
///
/// Analysis confidence is the mean classification confidence, or 50 when
/// nothing matched. Each matched category adds 5 points, up to 15.
pub fn quality_metrics(
    text: &str,
    matches: &[CategoryMatch],
    fields_found: usize,
) -> QualityMetrics {
    let processing = extraction_quality(text) as f64;
    let analysis = if matches.is_empty() {
        50.0
    } else {
        matches.iter().map(|m| m.confidence as f64).sum::<f64>() / matches.len() as f64
    };
    let section_bonus = (matches.len() as f64 * 5.0).min(15.0);
    let overall = (processing * 0.6 + analysis * 0.4 + section_bonus).min(100.0);

    QualityMetrics {
        overall_quality: overall.round() as u8,
        processing_quality: processing as u8,
        analysis_confidence: analysis.round() as u8,
        extraction_completeness: (fields_found * 10).min(100) as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_scores_base() {
        assert_eq!(extraction_quality(""), 70);
    }

    #[test]
    fn test_rich_text_caps_at_95() {
        let text = "Jane Doe signed note 42. ".repeat(200);
        assert_eq!(extraction_quality(&text), 95);
    }

    #[test]
    fn test_numbers_and_names_add_points() {
        assert_eq!(extraction_quality("loan 42"), 75);
        assert_eq!(extraction_quality("Jane Doe"), 75);
        assert_eq!(extraction_quality("Jane Doe 42"), 80);
    }

    #[test]
    fn test_metrics_without_matches_uses_neutral_confidence() {
        let metrics = quality_metrics("", &[], 0);
        assert_eq!(metrics.analysis_confidence, 50);
        // 70 * 0.6 + 50 * 0.4
        assert_eq!(metrics.overall_quality, 62);
    }

    #[test]
    fn test_metrics_section_bonus_is_capped() {
        let matches: Vec<CategoryMatch> = (0..5)
            .map(|i| CategoryMatch {
                section: format!("S{}", i),
                confidence: 95,
                pattern_matched: "X".into(),
                matches: 10,
            })
            .collect();
        let metrics = quality_metrics("", &matches, 3);
        // 42 + 38 + 15
        assert_eq!(metrics.overall_quality, 95);
        assert_eq!(metrics.extraction_completeness, 30);
    }
}
