pub mod pipeline;
pub mod settings;

pub use pipeline::{CardPipeline, PipelineReport};
pub use settings::{RefinerSettings, Settings, SETTINGS_FILE};
