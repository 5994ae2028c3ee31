use serde::{Deserialize, Serialize};
use std::fmt;

/// One sheet row, reduced to the two columns the extractor reads.
/// Both cells are trimmed; an absent cell is the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub address: String,
    pub message: String,
}

impl Row {
    pub fn new(address: impl Into<String>, message: impl Into<String>) -> Self {
        Row {
            address: address.into(),
            message: message.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.address.is_empty() && self.message.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    Header,
    Garbage,
    Data,
}

impl fmt::Display for RowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKind::Header => write!(f, "header"),
            RowKind::Garbage => write!(f, "garbage"),
            RowKind::Data => write!(f, "data"),
        }
    }
}

/// Contiguous rows attributed to one recipient, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Index of the first sheet row in the block.
    pub first_row: usize,
    /// Index of the last sheet row in the block (inclusive).
    pub last_row: usize,
    pub address_lines: Vec<String>,
    pub message_lines: Vec<String>,
}

impl Block {
    pub fn starting_at(row: usize) -> Self {
        Block {
            first_row: row,
            last_row: row,
            ..Block::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.address_lines.is_empty() && self.message_lines.is_empty()
    }

    /// Appends the non-empty cells of `row` and extends the block to `index`.
    pub fn push_row(&mut self, index: usize, address: Option<&str>, message: &str) {
        if let Some(address) = address.filter(|a| !a.is_empty()) {
            self.address_lines.push(address.to_string());
        }
        if !message.is_empty() {
            self.message_lines.push(message.to_string());
        }
        self.last_row = self.last_row.max(index);
    }
}

/// A validated recipient record ready for layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub address: String,
    pub message: String,
}

impl Card {
    pub fn new(address: impl Into<String>, message: impl Into<String>) -> Self {
        Card {
            address: address.into(),
            message: message.into(),
        }
    }
}

/// Which half of a card a refinement call rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefineKind {
    Address,
    Message,
}

impl RefineKind {
    /// Inputs shorter than this (after trimming) are never sent for refinement.
    pub fn min_input_chars(self) -> usize {
        match self {
            RefineKind::Address => 5,
            RefineKind::Message => 2,
        }
    }
}

impl fmt::Display for RefineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefineKind::Address => write!(f, "address"),
            RefineKind::Message => write!(f, "message"),
        }
    }
}
