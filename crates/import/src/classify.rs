use cardgen_core::{CardConfig, Row, RowKind};

use crate::util::find_ci;

/// Decides what a single row is, from its address and message cells alone.
#[derive(Debug, Clone)]
pub struct RowClassifier {
    anchor: String,
    ignore_keywords: Vec<String>,
}

impl RowClassifier {
    pub fn new(config: &CardConfig) -> Self {
        Self {
            anchor: config.anchor_lower(),
            ignore_keywords: config
                .ignore_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// The message cell never changes the outcome; it is accepted so the
    /// classifier sees the same row shape as the segmenters.
    pub fn classify(&self, address: &str, _message: &str) -> RowKind {
        if self.is_header(address) {
            RowKind::Header
        } else if self.is_garbage(address) {
            RowKind::Garbage
        } else {
            RowKind::Data
        }
    }

    pub fn classify_row(&self, row: &Row) -> RowKind {
        self.classify(&row.address, &row.message)
    }

    pub fn is_header(&self, address: &str) -> bool {
        address.to_lowercase().contains(&self.anchor)
    }

    /// Empty, or boilerplate matched by an ignore keyword.
    pub fn is_garbage(&self, text: &str) -> bool {
        text.trim().is_empty() || self.matching_keyword(text).is_some()
    }

    pub fn matching_keyword(&self, text: &str) -> Option<&str> {
        find_ci(text, &self.ignore_keywords)
    }
}

/// Whether an address-cell value reads as a continuation line (a phone number)
/// rather than the first line of a new address.
///
/// True when the text mentions "tel" or "phone", when it is longer than five
/// characters and made only of digits, spaces and `-().+`, or when it starts
/// with a digit. The last rule also claims house numbers; it is kept as observed
/// in the exports this heuristic was tuned on.
pub fn looks_like_phone(text: &str) -> bool {
    let t = text.trim().to_lowercase();
    if t.contains("tel") || t.contains("phone") {
        return true;
    }
    let only_phone_chars = t
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_whitespace() || "-().+".contains(c));
    if only_phone_chars && t.chars().count() > 5 {
        return true;
    }
    t.starts_with(|c: char| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> RowClassifier {
        RowClassifier::new(&CardConfig::default())
    }

    // ── classify ──────────────────────────────────────────────────────────────

    #[test]
    fn anchor_is_header_case_insensitive() {
        let c = classifier();
        assert_eq!(c.classify("RECIPIENT FULL ADDRESS", ""), RowKind::Header);
        assert_eq!(c.classify("  Recipient Full Address (required)", "x"), RowKind::Header);
    }

    #[test]
    fn empty_address_is_garbage_even_with_message() {
        let c = classifier();
        assert_eq!(c.classify("", "Happy Birthday!"), RowKind::Garbage);
        assert_eq!(c.classify("   ", ""), RowKind::Garbage);
    }

    #[test]
    fn ignore_keywords_are_garbage() {
        let c = classifier();
        for text in [
            "Form Instructions: fill in one row per basket",
            "BASKET NAME: Deluxe",
            "Delivery Date 12/20",
            "Special Instructions",
            "Must be a valid address!",
        ] {
            assert_eq!(c.classify(text, ""), RowKind::Garbage, "{text}");
        }
    }

    #[test]
    fn ordinary_address_is_data() {
        assert_eq!(classifier().classify("123 Main St", ""), RowKind::Data);
    }

    #[test]
    fn custom_anchor_and_keywords() {
        let config = CardConfig {
            anchor: "Ship To".into(),
            ignore_keywords: vec!["GIFT WRAP".into(), "  ".into()],
            ..CardConfig::default()
        };
        let c = RowClassifier::new(&config);
        assert_eq!(c.classify("SHIP TO", ""), RowKind::Header);
        assert_eq!(c.classify("gift wrap: yes", ""), RowKind::Garbage);
        assert_eq!(c.classify("Basket name", ""), RowKind::Data);
        assert_eq!(c.matching_keyword("Gift wrap"), Some("gift wrap"));
    }

    // ── looks_like_phone ──────────────────────────────────────────────────────

    #[test]
    fn classify_row_uses_address_cell() {
        let c = classifier();
        assert_eq!(c.classify_row(&Row::new("Recipient Full Address", "")), RowKind::Header);
        assert_eq!(c.classify_row(&Row::new("", "Happy Birthday")), RowKind::Garbage);
        assert_eq!(c.classify_row(&Row::new("Basket Name: Deluxe", "")), RowKind::Garbage);
        assert_eq!(c.classify_row(&Row::new("12 Oak Rd", "")), RowKind::Data);
    }

    #[test]
    fn phone_labels() {
        assert!(looks_like_phone("Tel: 555-1234"));
        assert!(looks_like_phone("PHONE"));
    }

    #[test]
    fn punctuated_number() {
        assert!(looks_like_phone("(555) 123-4567"));
        assert!(looks_like_phone("+1 555 123 4567"));
    }

    #[test]
    fn leading_digit_counts_as_phone() {
        assert!(looks_like_phone("42 Wallaby Way"));
        assert!(looks_like_phone("555"));
    }

    #[test]
    fn names_are_not_phone() {
        assert!(!looks_like_phone("Jane Doe"));
        assert!(!looks_like_phone("Apt. 4B"));
        assert!(!looks_like_phone("(-)"));
    }
}
