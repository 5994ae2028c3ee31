pub mod backend;
pub mod openai;
pub mod refiner;

pub use backend::{MockBackend, RefineBackend, RefineError, RefineRequest};
pub use openai::{prompt_for, OpenAiCompatBackend, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use refiner::{is_conversational, TextRefiner, FILLER_PREFIXES};
