use cardgen_core::{Block, Card, CardConfig, Row};

use crate::segment::{segmenter_for, ScanHooks, Segmenter};
use crate::validate::{BlockValidator, Rejection};

/// A card together with the sheet rows it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedCard {
    pub card: Card,
    pub first_row: usize,
    pub last_row: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedBlock {
    pub block: Block,
    pub reason: Rejection,
}

/// Everything one scan produced, accepted and rejected, in row order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub anchor_row: Option<usize>,
    pub cards: Vec<ExtractedCard>,
    pub rejected: Vec<RejectedBlock>,
    pub truncated: usize,
    pub cancelled: bool,
}

impl Extraction {
    pub fn anchor_found(&self) -> bool {
        self.anchor_row.is_some()
    }

    pub fn blocks_seen(&self) -> usize {
        self.cards.len() + self.rejected.len()
    }
}

/// Segmentation followed by validation, configured once.
pub struct CardExtractor {
    segmenter: Box<dyn Segmenter>,
    validator: BlockValidator,
}

impl CardExtractor {
    pub fn new(config: &CardConfig) -> Self {
        Self {
            segmenter: segmenter_for(config),
            validator: BlockValidator::new(config),
        }
    }

    pub fn validator(&self) -> &BlockValidator {
        &self.validator
    }

    pub fn extract(&self, rows: &[Row]) -> Extraction {
        self.extract_with(rows, &ScanHooks::default())
    }

    pub fn extract_with(&self, rows: &[Row], hooks: &ScanHooks<'_>) -> Extraction {
        let segmentation = self.segmenter.segment_with(rows, hooks);

        let mut out = Extraction {
            anchor_row: segmentation.anchor_row,
            truncated: segmentation.truncated,
            cancelled: segmentation.cancelled,
            ..Extraction::default()
        };

        for block in segmentation.blocks {
            match self.validator.validate(&block) {
                Ok(card) => out.cards.push(ExtractedCard {
                    card,
                    first_row: block.first_row,
                    last_row: block.last_row,
                }),
                Err(reason) => {
                    tracing::debug!(
                        "Rejected block at rows {}-{}: {reason}",
                        block.first_row + 1,
                        block.last_row + 1
                    );
                    out.rejected.push(RejectedBlock { block, reason });
                }
            }
        }

        tracing::info!(
            "Extraction complete: {} cards, {} rejected, {} truncated",
            out.cards.len(),
            out.rejected.len(),
            out.truncated
        );
        out
    }
}
