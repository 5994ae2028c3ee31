pub mod card;
pub mod config;

pub use card::{Block, Card, RefineKind, Row, RowKind};
pub use config::{
    CardConfig, ConfigError, SegmentPolicy, DEFAULT_ANCHOR, DEFAULT_BLACKLIST,
    DEFAULT_IGNORE_KEYWORDS,
};
