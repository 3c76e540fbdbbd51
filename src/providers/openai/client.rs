use std::sync::LazyLock;
use std::time::Duration;

use async_stream::stream;
use futures_util::StreamExt;
use regex::Regex;
use reqwest::Client;
use tracing::warn;

use super::types::{ChatChunk, ChatRequest, ChatRequestMessage};
use crate::prompt::build_system_prompt;
use crate::provider::{ProviderAdapter, ProviderDescriptor, TextStream};
use crate::sse_stream::SseStreamExt;
use crate::types::{Role, Settings, StreamRequest};
use crate::Error;

pub const PROVIDER_ID: &str = "openai";
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

static DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
    id: PROVIDER_ID,
    label: "OpenAI",
    description: "GPT-4.1 family via Chat Completions API",
    default_model: DEFAULT_MODEL,
    docs_url: Some("https://platform.openai.com/docs/api-reference/chat"),
};

static KEY_SHAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sk-\w{20,}").expect("key shape regex"));

/// OpenAI-style chat-completions adapter.
pub struct OpenAIProvider {
    client: Client,
    base_url: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI-style adapter against the public endpoint.
    pub fn new() -> Result<Self, Error> {
        Self::new_with_base_url(DEFAULT_BASE_URL.to_string())
    }

    /// Create a new OpenAI-style adapter with a custom base URL.
    pub fn new_with_base_url(base_url: String) -> Result<Self, Error> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self { client, base_url })
    }

    /// Assemble the outbound message list: system prompt first, then the
    /// prior history with roles preserved, then the new input as the final
    /// user entry.
    fn build_request(&self, model: String, request: &StreamRequest) -> ChatRequest {
        let include_context = request.settings.send_context && request.context.text.is_some();
        let system_prompt = build_system_prompt(&request.context, include_context);

        let mut messages = vec![ChatRequestMessage {
            role: Role::System,
            content: system_prompt,
        }];
        for message in &request.history {
            messages.push(ChatRequestMessage {
                role: message.role,
                content: message.content.clone(),
            });
        }
        messages.push(ChatRequestMessage {
            role: Role::User,
            content: request.input.clone(),
        });

        ChatRequest {
            model,
            stream: true,
            messages,
        }
    }
}

/// What one wire event contributes to the reply.
#[derive(Debug, Default, PartialEq)]
struct EventText {
    text: Option<String>,
    finished: bool,
}

/// Interpret one framed event. Events must carry the `data:` prefix; `[DONE]`
/// finishes the stream, a non-null finish reason finishes it after this
/// event's text, and a payload that fails to parse is skipped.
fn handle_event(event: &str) -> EventText {
    let payload = event.trim();
    let Some(data) = payload.strip_prefix("data:") else {
        return EventText::default();
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return EventText {
            text: None,
            finished: true,
        };
    }

    match serde_json::from_str::<ChatChunk>(data) {
        Ok(chunk) => {
            let Some(choice) = chunk.choices.into_iter().next() else {
                return EventText::default();
            };
            let text = choice.delta.content.filter(|t| !t.is_empty());
            let finished = choice
                .finish_reason
                .as_deref()
                .is_some_and(|reason| !reason.is_empty());
            EventText { text, finished }
        }
        Err(e) => {
            warn!(provider = PROVIDER_ID, error = %e, "chunk parse failed, skipping event");
            EventText::default()
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for OpenAIProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &DESCRIPTOR
    }

    fn resolve_model(&self, settings: &Settings) -> String {
        settings
            .provider(PROVIDER_ID)
            .map(|p| p.model_id.trim())
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    fn resolve_api_key(&self, settings: &Settings) -> Option<String> {
        settings
            .provider(PROVIDER_ID)
            .map(|p| p.api_key.trim())
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }

    fn validate_key_shape(&self, key: &str) -> bool {
        KEY_SHAPE_RE.is_match(key.trim())
    }

    async fn stream(&self, request: &StreamRequest) -> Result<TextStream, Error> {
        let api_key = self
            .resolve_api_key(&request.settings)
            .ok_or_else(|| Error::missing_key(PROVIDER_ID))?;
        let body = self.build_request(self.resolve_model(&request.settings), request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|e| e.to_string());
            warn!(
                provider = PROVIDER_ID,
                status = status.as_u16(),
                "streaming request rejected"
            );
            return Err(Error::http_failure(
                PROVIDER_ID,
                status.as_u16(),
                error_text,
            ));
        }

        let mut events = response.bytes_stream().sse_events();
        let cancel = request.cancel.clone();

        let increments = stream! {
            loop {
                // The token races each read so a stop releases the connection
                // without waiting for the next frame.
                let event = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    event = events.next() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                let event = match event {
                    Ok(event) => event,
                    Err(e @ Error::MalformedEvent(_)) => {
                        warn!(provider = PROVIDER_ID, error = %e, "skipping malformed frame");
                        continue;
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                };
                let outcome = handle_event(&event);
                if let Some(text) = outcome.text {
                    yield Ok(text);
                }
                if outcome.finished {
                    break;
                }
            }
        };

        Ok(Box::pin(increments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DocContext;
    use crate::types::Message;
    use tokio_util::sync::CancellationToken;

    fn settings_with(key: &str, model: &str) -> Settings {
        let mut settings = Settings::default();
        let cfg = settings.provider_mut(PROVIDER_ID);
        cfg.api_key = key.to_string();
        cfg.model_id = model.to_string();
        settings
    }

    #[test]
    fn model_falls_back_to_default_when_blank() {
        let provider = OpenAIProvider::new().unwrap();
        assert_eq!(
            provider.resolve_model(&settings_with("sk-x", "  ")),
            DEFAULT_MODEL
        );
        assert_eq!(
            provider.resolve_model(&settings_with("sk-x", "gpt-4.1-mini")),
            "gpt-4.1-mini"
        );
    }

    #[test]
    fn blank_key_counts_as_absent() {
        let provider = OpenAIProvider::new().unwrap();
        assert_eq!(provider.resolve_api_key(&settings_with("   ", "m")), None);
        assert_eq!(
            provider.resolve_api_key(&settings_with(" sk-abc ", "m")),
            Some("sk-abc".to_string())
        );
    }

    #[test]
    fn key_shape_requires_sk_prefix_and_length() {
        let provider = OpenAIProvider::new().unwrap();
        assert!(provider.validate_key_shape("sk-abcdefghij0123456789"));
        assert!(provider.validate_key_shape("  sk-abcdefghij0123456789  "));
        assert!(!provider.validate_key_shape("sk-short"));
        assert!(!provider.validate_key_shape("abcdefghij0123456789"));
    }

    #[test]
    fn request_lists_system_history_input_in_order() {
        let provider = OpenAIProvider::new().unwrap();
        let history = vec![
            Message::user("first question", PROVIDER_ID),
            Message::assistant("first answer", PROVIDER_ID),
            Message::system("note to self", PROVIDER_ID),
        ];
        let request = StreamRequest::new(
            "second question",
            history,
            DocContext::empty(),
            settings_with("sk-x", ""),
            CancellationToken::new(),
        );

        let body = provider.build_request("gpt-4.1-nano".to_string(), &request);
        assert_eq!(body.model, "gpt-4.1-nano");
        assert!(body.stream);

        let roles: Vec<Role> = body.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::System,
                Role::User
            ]
        );
        assert_eq!(body.messages.last().unwrap().content, "second question");
    }

    #[test]
    fn done_sentinel_finishes_without_text() {
        let outcome = handle_event("data: [DONE]");
        assert_eq!(outcome.text, None);
        assert!(outcome.finished);
    }

    #[test]
    fn delta_content_is_extracted() {
        let outcome = handle_event(r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#);
        assert_eq!(outcome.text.as_deref(), Some("Hel"));
        assert!(!outcome.finished);
    }

    #[test]
    fn finish_reason_ends_after_this_events_text() {
        let outcome = handle_event(
            r#"data: {"choices":[{"delta":{"content":"bye"},"finish_reason":"stop"}]}"#,
        );
        assert_eq!(outcome.text.as_deref(), Some("bye"));
        assert!(outcome.finished);
    }

    #[test]
    fn null_finish_reason_keeps_streaming() {
        let outcome =
            handle_event(r#"data: {"choices":[{"delta":{},"finish_reason":null}]}"#);
        assert_eq!(outcome.text, None);
        assert!(!outcome.finished);
    }

    #[test]
    fn event_without_data_prefix_is_ignored() {
        let outcome = handle_event(r#"{"choices":[{"delta":{"content":"x"}}]}"#);
        assert_eq!(outcome, EventText::default());
    }

    #[test]
    fn unparseable_payload_is_skipped() {
        let outcome = handle_event("data: not json at all");
        assert_eq!(outcome, EventText::default());
    }
}
