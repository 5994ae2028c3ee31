use std::sync::Mutex;

use cardgen_core::RefineKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RefineError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Service returned HTTP {0}")]
    Status(u16),
    #[error("Malformed service reply: {0}")]
    Decode(String),
    #[error("Refiner not configured: {0}")]
    NotConfigured(String),
}

/// One refinement call as sent across the service boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefineRequest {
    pub raw_text: String,
    pub task: RefineKind,
    pub model: String,
}

/// Abstraction over a text-formatting service.
/// Implementations return the service's reply verbatim; fallback and reply
/// sanitation are applied by [`crate::TextRefiner`].
#[async_trait::async_trait]
pub trait RefineBackend: Send + Sync {
    async fn complete(&self, request: &RefineRequest) -> Result<String, RefineError>;
}

// ── Mock backend (always available, used for tests) ───────────────────────────

enum MockReply {
    Text(String),
    Echo { prefix: String },
    Fail,
}

/// Replies without a network: a fixed text, an echo of the input, or a failure.
/// Every request is recorded for inspection.
pub struct MockBackend {
    reply: MockReply,
    seen: Mutex<Vec<RefineRequest>>,
}

impl MockBackend {
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_reply(MockReply::Text(text.into()))
    }

    /// Replies with `prefix` followed by the request text.
    pub fn echo(prefix: impl Into<String>) -> Self {
        Self::with_reply(MockReply::Echo { prefix: prefix.into() })
    }

    pub fn failing() -> Self {
        Self::with_reply(MockReply::Fail)
    }

    fn with_reply(reply: MockReply) -> Self {
        Self { reply, seen: Mutex::new(Vec::new()) }
    }

    pub fn requests(&self) -> Vec<RefineRequest> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl RefineBackend for MockBackend {
    async fn complete(&self, request: &RefineRequest) -> Result<String, RefineError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(request.clone());
        }
        match &self.reply {
            MockReply::Text(text) => Ok(text.clone()),
            MockReply::Echo { prefix } => Ok(format!("{prefix}{}", request.raw_text)),
            MockReply::Fail => Err(RefineError::Status(503)),
        }
    }
}
