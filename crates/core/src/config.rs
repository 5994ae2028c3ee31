use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_ANCHOR: &str = "RECIPIENT FULL ADDRESS";

/// Address-column boilerplate that never belongs to a recipient.
pub const DEFAULT_IGNORE_KEYWORDS: &[&str] = &[
    "recipient full address",
    "form instructions",
    "basket name",
    "delivery date",
    "special instructions",
    "must be a valid address",
];

/// Known-bad addresses that must never produce a card.
pub const DEFAULT_BLACKLIST: &[&str] = &["750 millway", "my baskets", "unit #4"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How rows are grouped into recipient blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentPolicy {
    /// Fixed stride of `window` rows per recipient, re-anchored at every header.
    #[default]
    StrictGrid,
    /// Boundaries inferred from message cells and blank-row gaps.
    Gap,
}

impl std::str::FromStr for SegmentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "strict_grid" | "strict" | "grid" => Ok(SegmentPolicy::StrictGrid),
            "gap" | "heuristic" => Ok(SegmentPolicy::Gap),
            other => Err(format!("Unknown segment policy: '{other}'")),
        }
    }
}

impl std::fmt::Display for SegmentPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentPolicy::StrictGrid => write!(f, "strict_grid"),
            SegmentPolicy::Gap => write!(f, "gap"),
        }
    }
}

/// Extraction settings. Built once and shared read-only by the classifier,
/// segmenter and validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardConfig {
    pub anchor: String,
    /// 0-indexed column holding address lines (column D).
    pub address_column: usize,
    /// 0-indexed column holding gift messages (column I).
    pub message_column: usize,
    pub ignore_keywords: Vec<String>,
    pub blacklist: Vec<String>,
    pub policy: SegmentPolicy,
    /// Rows per recipient under the strict grid policy.
    pub window: usize,
    pub require_digit: bool,
    /// Emit the rows before an early header as their own block instead of dropping them.
    pub keep_truncated_blocks: bool,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            anchor: DEFAULT_ANCHOR.to_string(),
            address_column: 3,
            message_column: 8,
            ignore_keywords: DEFAULT_IGNORE_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            blacklist: DEFAULT_BLACKLIST.iter().map(|s| s.to_string()).collect(),
            policy: SegmentPolicy::StrictGrid,
            window: 5,
            require_digit: true,
            keep_truncated_blocks: false,
        }
    }
}

impl CardConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: CardConfig = toml::from_str(toml_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.anchor.trim().is_empty() {
            return Err(ConfigError::Invalid("anchor must not be empty".into()));
        }
        if self.window == 0 {
            return Err(ConfigError::Invalid("window must be at least 1".into()));
        }
        if self.address_column == self.message_column {
            return Err(ConfigError::Invalid(format!(
                "address and message columns are both {}",
                self.address_column
            )));
        }
        Ok(())
    }

    /// Lower-cased anchor, for case-insensitive matching.
    pub fn anchor_lower(&self) -> String {
        self.anchor.trim().to_lowercase()
    }
}
