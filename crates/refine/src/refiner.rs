use std::sync::Arc;

use cardgen_core::RefineKind;

use crate::backend::{RefineBackend, RefineRequest};
use crate::openai::DEFAULT_MODEL;

/// Reply openings that mark a chatty non-answer rather than formatted text.
pub const FILLER_PREFIXES: &[&str] = &[
    "sure",
    "here is",
    "here's",
    "i cannot",
    "i can't",
    "i'm sorry",
    "sorry",
    "certainly",
    "please provide",
    "as an ai",
];

/// Whether a service reply opens with conversational filler. The phrase must
/// end at a word boundary, so "Suresh" or "Surety Ln" are not filler.
pub fn is_conversational(reply: &str) -> bool {
    let lower = reply.trim_start().to_lowercase();
    FILLER_PREFIXES.iter().any(|p| {
        lower
            .strip_prefix(p)
            .is_some_and(|rest| !rest.starts_with(char::is_alphanumeric))
    })
}

/// Applies the refinement policy around an optional backend: short inputs are
/// skipped, failures and non-answers fall back to the input.
#[derive(Clone)]
pub struct TextRefiner {
    backend: Option<Arc<dyn RefineBackend>>,
    model: String,
}

impl TextRefiner {
    /// A refiner that returns every input unchanged.
    pub fn disabled() -> Self {
        Self { backend: None, model: DEFAULT_MODEL.to_string() }
    }

    pub fn new(backend: Arc<dyn RefineBackend>, model: impl Into<String>) -> Self {
        let model = model.into();
        let model = if model.trim().is_empty() { DEFAULT_MODEL.to_string() } else { model };
        Self { backend: Some(backend), model }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the refined text, or `text` itself whenever refinement is skipped
    /// or fails. An empty address reply is returned as empty: the service judged
    /// the input not to be an address.
    pub async fn refine(&self, text: &str, kind: RefineKind) -> String {
        let Some(backend) = &self.backend else {
            return text.to_string();
        };
        if text.trim().chars().count() < kind.min_input_chars() {
            return text.to_string();
        }

        let request = RefineRequest {
            raw_text: text.to_string(),
            task: kind,
            model: self.model.clone(),
        };

        let reply = match backend.complete(&request).await {
            Ok(reply) => reply.trim().to_string(),
            Err(e) => {
                tracing::warn!("Refiner error ({kind}), keeping original text: {e}");
                return text.to_string();
            }
        };

        if is_conversational(&reply) {
            tracing::warn!("Refiner gave a conversational reply ({kind}), keeping original text");
            return text.to_string();
        }
        if reply.is_empty() && kind == RefineKind::Message {
            return text.to_string();
        }
        reply
    }
}

impl std::fmt::Debug for TextRefiner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRefiner")
            .field("enabled", &self.is_enabled())
            .field("model", &self.model)
            .finish()
    }
}
