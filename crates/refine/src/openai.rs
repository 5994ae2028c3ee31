use std::time::Duration;

use cardgen_core::RefineKind;
use serde::{Deserialize, Serialize};

use crate::backend::{RefineBackend, RefineError, RefineRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

const TEMPERATURE: f64 = 0.1;

/// Prompt sent for each refinement task.
pub fn prompt_for(kind: RefineKind, raw_text: &str) -> String {
    match kind {
        RefineKind::Address => format!(
            "Format this shipping address block.\n\
             Input:\n---\n{raw_text}\n---\n\
             Rules:\n\
             1. Remove every label such as \"TEL:\", \"Phone:\", \"Attention:\". Keep only the value.\n\
             2. Never write placeholders like \"[insert phone number]\". If no number exists, leave it out.\n\
             3. Put the phone number on the last line.\n\
             4. If the input is not an address at all, reply with nothing.\n\
             5. Output plain text only."
        ),
        RefineKind::Message => format!(
            "Tidy this gift card message.\n\
             Input:\n---\n{raw_text}\n---\n\
             Rules:\n\
             1. Merge broken lines into one coherent paragraph.\n\
             2. Keep a closing attribution (e.g. \"Love, Ann\") on its own last line.\n\
             3. Do not add quotation marks, greetings or commentary.\n\
             4. Output plain text only."
        ),
    }
}

/// Client for any service exposing the OpenAI `chat/completions` API.
#[derive(Debug, Clone)]
pub struct OpenAiCompatBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatBackend {
    pub fn new(
        base_url: Option<&str>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RefineError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
            .to_string();
        Ok(Self {
            client,
            base_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint_chat_completions(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl RefineBackend for OpenAiCompatBackend {
    async fn complete(&self, request: &RefineRequest) -> Result<String, RefineError> {
        let body = ChatCompletionsRequest {
            model: request.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt_for(request.task, &request.raw_text),
            }],
            temperature: TEMPERATURE,
        };

        let mut rb = self.client.post(self.endpoint_chat_completions()).json(&body);
        if let Some(key) = &self.api_key {
            rb = rb.bearer_auth(key);
        }

        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(RefineError::Status(status.as_u16()));
        }

        let parsed: ChatCompletionsResponse = resp
            .json()
            .await
            .map_err(|e| RefineError::Decode(e.to_string()))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RefineError::Decode("reply has no choices".to_string()))?;
        choice.message.into_text()
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

impl ChoiceMessage {
    /// Only a present `content` string is an answer; a refusal or a null
    /// content is a failed call, never an empty reply.
    fn into_text(self) -> Result<String, RefineError> {
        if let Some(refusal) = self.refusal.filter(|r| !r.trim().is_empty()) {
            return Err(RefineError::Decode(format!("service refused: {refusal}")));
        }
        self.content
            .map(|c| c.trim().to_string())
            .ok_or_else(|| RefineError::Decode("reply has no content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use std::net::SocketAddr;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    fn request(kind: RefineKind, text: &str) -> RefineRequest {
        RefineRequest {
            raw_text: text.to_string(),
            task: kind,
            model: "stub-model".to_string(),
        }
    }

    fn backend(base_url: &str, key: Option<&str>) -> OpenAiCompatBackend {
        OpenAiCompatBackend::new(Some(base_url), key.map(String::from), Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn sends_prompt_and_reads_first_choice() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                let content = body["messages"][0]["content"].as_str().unwrap_or("");
                let ok = auth == "Bearer sk-test"
                    && body["model"] == "stub-model"
                    && content.contains("12 oak rd");
                let reply = if ok { "  12 Oak Rd\n555-1234 \n" } else { "bad request" };
                Json(serde_json::json!({
                    "choices": [{ "message": { "content": reply } }]
                }))
            }),
        );
        let base = serve(app).await;

        let reply = backend(&base, Some("sk-test"))
            .complete(&request(RefineKind::Address, "12 oak rd"))
            .await
            .unwrap();
        assert_eq!(reply, "12 Oak Rd\n555-1234");
    }

    #[tokio::test]
    async fn http_error_status_is_reported() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::UNAUTHORIZED, "no key") }),
        );
        let base = serve(app).await;

        let err = backend(&base, None)
            .complete(&request(RefineKind::Message, "hi there"))
            .await
            .unwrap_err();
        assert!(matches!(err, RefineError::Status(401)));
    }

    #[tokio::test]
    async fn empty_choices_is_decode_error() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(serde_json::json!({ "choices": [] })) }),
        );
        let base = serve(app).await;

        let err = backend(&base, None)
            .complete(&request(RefineKind::Message, "hi there"))
            .await
            .unwrap_err();
        assert!(matches!(err, RefineError::Decode(_)));
    }

    #[tokio::test]
    async fn null_content_with_refusal_is_decode_error() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                Json(serde_json::json!({
                    "choices": [{ "message": { "content": null, "refusal": "I can't help with that." } }]
                }))
            }),
        );
        let base = serve(app).await;

        let err = backend(&base, None)
            .complete(&request(RefineKind::Address, "123 Main St\n555-1234"))
            .await
            .unwrap_err();
        assert!(matches!(err, RefineError::Decode(ref m) if m.contains("refused")));
    }

    #[tokio::test]
    async fn empty_string_content_is_a_valid_reply() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(serde_json::json!({ "choices": [{ "message": { "content": "" } }] })) }),
        );
        let base = serve(app).await;

        let reply = backend(&base, None)
            .complete(&request(RefineKind::Address, "asdf qwerty"))
            .await
            .unwrap();
        assert_eq!(reply, "");
    }

    #[tokio::test]
    async fn refusal_keeps_original_address_through_refiner() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                Json(serde_json::json!({
                    "choices": [{ "message": { "content": null, "refusal": "I can't help with that." } }]
                }))
            }),
        );
        let base = serve(app).await;

        let refiner = crate::TextRefiner::new(std::sync::Arc::new(backend(&base, None)), "stub-model");
        let text = "123 Main St\n555-1234";
        assert_eq!(refiner.refine(text, RefineKind::Address).await, text);
    }

    #[test]
    fn null_content_without_refusal_is_decode_error() {
        let msg: ChoiceMessage = serde_json::from_str(r#"{ "content": null }"#).unwrap();
        assert!(matches!(msg.into_text(), Err(RefineError::Decode(_))));
    }

    #[test]
    fn blank_base_url_uses_default() {
        let b = OpenAiCompatBackend::new(Some("  "), Some(" ".into()), Duration::from_secs(1)).unwrap();
        assert_eq!(b.base_url(), DEFAULT_BASE_URL);
        assert!(b.api_key.is_none());
        assert_eq!(b.endpoint_chat_completions(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn prompts_embed_input() {
        assert!(prompt_for(RefineKind::Address, "1 A St").contains("---\n1 A St\n---"));
        assert!(prompt_for(RefineKind::Message, "Love, Ann").contains("attribution"));
    }
}
