use std::fmt;
use std::sync::OnceLock;

use cardgen_core::{Block, Card, CardConfig};
use regex::Regex;

use crate::classify::RowClassifier;
use crate::util::{find_ci, flat_len, is_lone_punctuation};

/// Cleaned addresses shorter than this (newlines excluded) are rejected.
pub const MIN_ADDRESS_CHARS: usize = 5;

fn re_label() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:(?:tel|phone|ph|mobile|cell)(?:[:.]\s*|\s+))+")
            .expect("invalid regex")
    })
}

/// Remove leading field labels ("Tel:", "Phone", "Ph.") from one line.
pub fn strip_label(line: &str) -> &str {
    let rest = match re_label().find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    };
    rest.trim()
}

/// Strip labels from every line and drop lines left empty or holding a single
/// punctuation mark. Applying it twice gives the same result as once.
pub fn clean_labels(text: &str) -> String {
    text.lines()
        .map(strip_label)
        .filter(|l| !l.is_empty() && !is_lone_punctuation(l))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    TooShort { chars: usize },
    Garbage,
    NoDigit,
    Blacklisted(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::TooShort { chars } => {
                write!(f, "address too short ({chars} < {MIN_ADDRESS_CHARS} chars)")
            }
            Rejection::Garbage => write!(f, "address is form boilerplate"),
            Rejection::NoDigit => write!(f, "address has no digits"),
            Rejection::Blacklisted(entry) => write!(f, "address matches blacklist entry '{entry}'"),
        }
    }
}

/// Turns candidate blocks into cards, or says why not.
#[derive(Debug, Clone)]
pub struct BlockValidator {
    classifier: RowClassifier,
    blacklist: Vec<String>,
    require_digit: bool,
}

impl BlockValidator {
    pub fn new(config: &CardConfig) -> Self {
        Self {
            classifier: RowClassifier::new(config),
            blacklist: config
                .blacklist
                .iter()
                .map(|b| b.trim().to_lowercase())
                .filter(|b| !b.is_empty())
                .collect(),
            require_digit: config.require_digit,
        }
    }

    pub fn validate(&self, block: &Block) -> Result<Card, Rejection> {
        self.validate_lines(&block.address_lines, &block.message_lines)
    }

    pub fn validate_lines<S: AsRef<str>>(
        &self,
        address_lines: &[S],
        message_lines: &[S],
    ) -> Result<Card, Rejection> {
        let raw = address_lines
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join("\n");
        let address = clean_labels(&raw);

        let chars = flat_len(&address);
        if chars < MIN_ADDRESS_CHARS {
            return Err(Rejection::TooShort { chars });
        }
        if self.classifier.is_garbage(&address) {
            return Err(Rejection::Garbage);
        }
        if self.require_digit && !address.chars().any(|c| c.is_ascii_digit()) {
            return Err(Rejection::NoDigit);
        }
        if let Some(entry) = self.blacklist_hit(&address) {
            return Err(Rejection::Blacklisted(entry.to_string()));
        }

        let message = message_lines
            .iter()
            .map(|m| m.as_ref().trim())
            .filter(|m| !m.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(Card { address, message })
    }

    pub fn blacklist_hit(&self, address: &str) -> Option<&str> {
        find_ci(address, &self.blacklist)
    }
}
