pub mod classify;
pub mod extract;
pub mod segment;
pub mod sheet;
pub mod validate;
pub(crate) mod util;

pub use classify::{looks_like_phone, RowClassifier};
pub use extract::{CardExtractor, ExtractedCard, Extraction, RejectedBlock};
pub use segment::{
    segmenter_for, GapSegmenter, ScanHooks, Segmentation, Segmenter, StrictGridSegmenter,
};
pub use sheet::{normalize_cell, read_sheet, Sheet, SheetError, SheetReader};
pub use validate::{clean_labels, strip_label, BlockValidator, Rejection, MIN_ADDRESS_CHARS};
