use std::sync::atomic::{AtomicBool, Ordering};

use cardgen_core::{Block, CardConfig, Row, RowKind, SegmentPolicy};

use crate::classify::{looks_like_phone, RowClassifier};

/// Result of one top-to-bottom scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segmentation {
    /// Row of the first anchor; `None` means the sheet has no anchor and no
    /// blocks were produced.
    pub anchor_row: Option<usize>,
    pub blocks: Vec<Block>,
    /// Blocks cut short by an early header and dropped rather than emitted.
    pub truncated: usize,
    /// The scan stopped at a block boundary because cancellation was requested.
    pub cancelled: bool,
}

/// Optional side channels for a scan. Both are advisory: progress is a
/// non-decreasing percentage, cancellation is polled between blocks only.
#[derive(Default, Clone, Copy)]
pub struct ScanHooks<'a> {
    pub progress: Option<&'a (dyn Fn(u8) + Sync)>,
    pub cancel: Option<&'a AtomicBool>,
}

impl ScanHooks<'_> {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|c| c.load(Ordering::Relaxed))
    }
}

struct Progress<'a> {
    sink: Option<&'a (dyn Fn(u8) + Sync)>,
    total: usize,
    last: Option<u8>,
}

impl<'a> Progress<'a> {
    fn new(hooks: &ScanHooks<'a>, total: usize) -> Self {
        Self { sink: hooks.progress, total, last: None }
    }

    fn report(&mut self, cursor: usize) {
        let Some(sink) = self.sink else { return };
        let pct = if self.total == 0 {
            100
        } else {
            (cursor.min(self.total) * 100 / self.total) as u8
        };
        if self.last.map_or(true, |last| pct > last) {
            self.last = Some(pct);
            sink(pct);
        }
    }
}

/// Groups an ordered row sequence into per-recipient blocks.
pub trait Segmenter: Send + Sync {
    fn segment_with(&self, rows: &[Row], hooks: &ScanHooks<'_>) -> Segmentation;

    fn segment(&self, rows: &[Row]) -> Segmentation {
        self.segment_with(rows, &ScanHooks::default())
    }
}

pub fn segmenter_for(config: &CardConfig) -> Box<dyn Segmenter> {
    match config.policy {
        SegmentPolicy::StrictGrid => Box::new(StrictGridSegmenter::new(config)),
        SegmentPolicy::Gap => Box::new(GapSegmenter::new(config)),
    }
}

fn find_anchor(rows: &[Row], classifier: &RowClassifier) -> Option<usize> {
    let found = rows
        .iter()
        .position(|r| classifier.classify_row(r) == RowKind::Header);
    match found {
        Some(idx) => tracing::info!("Found anchor at row {}", idx + 1),
        None => tracing::warn!("Anchor not found; no cards will be produced"),
    }
    found
}

/// Collect `rows[start..end]` into one block, leaving out boilerplate address lines.
fn collect_block(rows: &[Row], start: usize, end: usize, classifier: &RowClassifier) -> Block {
    let mut block = Block::starting_at(start);
    for (idx, row) in rows.iter().enumerate().take(end).skip(start) {
        let address = (classifier.classify_row(row) == RowKind::Data).then_some(row.address.as_str());
        block.push_row(idx, address, &row.message);
    }
    block.last_row = end.saturating_sub(1).max(start);
    block
}

// ── Strict grid ───────────────────────────────────────────────────────────────

/// Consumes a fixed stride of `window` rows per recipient, starting right after
/// each header row.
pub struct StrictGridSegmenter {
    classifier: RowClassifier,
    window: usize,
    keep_truncated: bool,
}

impl StrictGridSegmenter {
    pub fn new(config: &CardConfig) -> Self {
        Self {
            classifier: RowClassifier::new(config),
            window: config.window.max(1),
            keep_truncated: config.keep_truncated_blocks,
        }
    }
}

impl Segmenter for StrictGridSegmenter {
    fn segment_with(&self, rows: &[Row], hooks: &ScanHooks<'_>) -> Segmentation {
        let mut out = Segmentation::default();
        let Some(anchor) = find_anchor(rows, &self.classifier) else {
            return out;
        };
        out.anchor_row = Some(anchor);

        let mut progress = Progress::new(hooks, rows.len());
        let mut cursor = anchor;

        while cursor < rows.len() {
            if hooks.is_cancelled() {
                tracing::info!("Scan cancelled at row {}", cursor + 1);
                out.cancelled = true;
                return out;
            }
            progress.report(cursor);

            if self.classifier.classify_row(&rows[cursor]) == RowKind::Header {
                cursor += 1;
                continue;
            }

            let end = cursor.saturating_add(self.window).min(rows.len());

            // A header inside the window means this recipient ended early.
            if let Some(offset) = rows[cursor..end]
                .iter()
                .position(|r| self.classifier.classify_row(r) == RowKind::Header)
            {
                let header = cursor + offset;
                let partial = collect_block(rows, cursor, header, &self.classifier);
                if !partial.is_empty() {
                    if self.keep_truncated {
                        out.blocks.push(partial);
                    } else {
                        tracing::debug!(
                            "Dropping truncated block at rows {}-{}",
                            cursor + 1,
                            header
                        );
                        out.truncated += 1;
                    }
                }
                cursor = header;
                continue;
            }

            let block = collect_block(rows, cursor, end, &self.classifier);
            if !block.is_empty() {
                out.blocks.push(block);
            }
            cursor = cursor.saturating_add(self.window);
        }

        progress.report(rows.len());
        out
    }
}

// ── Gap heuristic ─────────────────────────────────────────────────────────────

/// Starts a new block at every message cell, and at an address line that
/// follows two or more blank rows unless it looks like a phone continuation.
pub struct GapSegmenter {
    classifier: RowClassifier,
}

impl GapSegmenter {
    /// Blank rows needed before an address line opens a new block.
    const MIN_GAP: usize = 2;

    pub fn new(config: &CardConfig) -> Self {
        Self { classifier: RowClassifier::new(config) }
    }
}

impl Segmenter for GapSegmenter {
    fn segment_with(&self, rows: &[Row], hooks: &ScanHooks<'_>) -> Segmentation {
        let mut out = Segmentation::default();
        let Some(anchor) = find_anchor(rows, &self.classifier) else {
            return out;
        };
        out.anchor_row = Some(anchor);

        let mut progress = Progress::new(hooks, rows.len());
        let mut current: Option<Block> = None;
        let mut gap = 0usize;

        fn flush(current: &mut Option<Block>, blocks: &mut Vec<Block>) {
            if let Some(block) = current.take().filter(|b| !b.is_empty()) {
                blocks.push(block);
            }
        }

        for (idx, row) in rows.iter().enumerate().skip(anchor + 1) {
            let starting_block = current.is_none();
            if starting_block && hooks.is_cancelled() {
                tracing::info!("Scan cancelled at row {}", idx + 1);
                out.cancelled = true;
                return out;
            }
            progress.report(idx);

            let kind = self.classifier.classify_row(row);
            if kind == RowKind::Header {
                flush(&mut current, &mut out.blocks);
                gap = 0;
                continue;
            }
            if row.is_blank() {
                gap += 1;
                continue;
            }

            let address = (kind == RowKind::Data).then_some(row.address.as_str());
            if address.is_none() && row.message.is_empty() {
                continue;
            }

            let opens_block = !row.message.is_empty()
                || address.is_some_and(|a| gap >= Self::MIN_GAP && !looks_like_phone(a));
            if opens_block {
                flush(&mut current, &mut out.blocks);
                if hooks.is_cancelled() {
                    tracing::info!("Scan cancelled at row {}", idx + 1);
                    out.cancelled = true;
                    return out;
                }
            }

            current
                .get_or_insert_with(|| Block::starting_at(idx))
                .push_row(idx, address, &row.message);
            gap = 0;
        }

        flush(&mut current, &mut out.blocks);
        progress.report(rows.len());
        out
    }
}
