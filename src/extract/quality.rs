//! Deterministic quality scoring for a piece of extracted text.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quality {
    Failed,
    Poor,
    Fair,
    Good,
    Excellent,
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn sentence_terminators(text: &str) -> usize {
    text.chars().filter(|c| matches!(c, '.' | '!' | '?')).count()
}

fn replacement_char_ratio(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let replacement_count = text.chars().filter(|&c| c == '\u{FFFD}').count();
    replacement_count as f64 / text.chars().count() as f64
}

fn non_alphanumeric_ratio(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let non_alnum = text
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_ascii_punctuation() && !c.is_whitespace())
        .count();
    non_alnum as f64 / text.chars().count() as f64
}

/// Scores raw extracted text against the tiers in the data model, before
/// any OCR downgrade is applied.
pub fn score(text: &str) -> Quality {
    let trimmed = text.trim();
    let len = trimmed.chars().count();
    let words = word_count(trimmed);
    let sentences = sentence_terminators(trimmed);
    let replacement_ratio = replacement_char_ratio(trimmed);
    let non_alnum_ratio = non_alphanumeric_ratio(trimmed);

    if len < 10 {
        return Quality::Failed;
    }

    if replacement_ratio > 0.01 || non_alnum_ratio > 0.10 {
        return Quality::Poor;
    }

    if words >= 50 && sentences >= 3 && (200..=50_000).contains(&len) && replacement_ratio < 0.01 {
        return Quality::Excellent;
    }

    if words >= 20 && sentences >= 1 {
        return Quality::Good;
    }

    if words >= 10 && len >= 50 {
        return Quality::Fair;
    }

    Quality::Poor
}

/// One-tier downgrade applied when the text came from OCR rather than a
/// structured text layer.
pub fn downgrade(quality: Quality) -> Quality {
    match quality {
        Quality::Excellent => Quality::Good,
        Quality::Good => Quality::Fair,
        Quality::Fair => Quality::Poor,
        Quality::Poor => Quality::Failed,
        Quality::Failed => Quality::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excellent_text() {
        let text = "This is a long and well formed document. It has multiple sentences. \
                     Each one ends with proper punctuation! Does it have enough words though? \
                     Let's pad it out a little more so the word count clears fifty words total \
                     which is the threshold required for the excellent tier to apply here today."
            .repeat(1);
        assert_eq!(score(&text), Quality::Excellent);
    }

    #[test]
    fn test_good_text() {
        let text = "word ".repeat(25) + ".";
        assert_eq!(score(&text), Quality::Good);
    }

    #[test]
    fn test_fair_text() {
        let text = "word ".repeat(12);
        assert_eq!(score(&text), Quality::Fair);
    }

    #[test]
    fn test_failed_text_too_short() {
        assert_eq!(score("hi"), Quality::Failed);
        assert_eq!(score(""), Quality::Failed);
    }

    #[test]
    fn test_poor_text_garbled() {
        let text = "\u{FFFD}".repeat(300);
        assert_eq!(score(&text), Quality::Poor);
    }

    #[test]
    fn test_downgrade_steps_down_one_tier() {
        assert_eq!(downgrade(Quality::Excellent), Quality::Good);
        assert_eq!(downgrade(Quality::Good), Quality::Fair);
        assert_eq!(downgrade(Quality::Fair), Quality::Poor);
        assert_eq!(downgrade(Quality::Poor), Quality::Failed);
        assert_eq!(downgrade(Quality::Failed), Quality::Failed);
    }

    #[test]
    fn test_quality_ordering() {
        assert!(Quality::Excellent > Quality::Good);
        assert!(Quality::Good > Quality::Fair);
        assert!(Quality::Fair > Quality::Poor);
        assert!(Quality::Poor > Quality::Failed);
    }
}
