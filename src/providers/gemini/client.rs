use std::time::Duration;

use async_stream::stream;
use futures_util::StreamExt;
use reqwest::Client;
use tracing::warn;

use super::types::{
    GeminiChunkContent, GeminiContent, GeminiGenerationConfig, GeminiPart, GeminiPayload,
    GeminiRequest,
};
use crate::prompt::build_system_prompt;
use crate::provider::{ProviderAdapter, ProviderDescriptor, TextStream};
use crate::sse_stream::SseStreamExt;
use crate::types::{Role, Settings, StreamRequest};
use crate::Error;

pub const PROVIDER_ID: &str = "gemini";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const TEMPERATURE: f32 = 0.6;
const MIN_KEY_LENGTH: usize = 20;

static DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
    id: PROVIDER_ID,
    label: "Google Gemini",
    description: "Gemini 2.0 family over Generative Language API",
    default_model: DEFAULT_MODEL,
    docs_url: Some("https://ai.google.dev/api/generate-content"),
};

/// Gemini-style streamGenerateContent adapter.
pub struct GeminiProvider {
    client: Client,
    base_url: String,
}

impl GeminiProvider {
    /// Create a new Gemini-style adapter against the public endpoint.
    pub fn new() -> Result<Self, Error> {
        Self::new_with_base_url(DEFAULT_BASE_URL.to_string())
    }

    /// Create a new Gemini-style adapter with a custom base URL.
    pub fn new_with_base_url(base_url: String) -> Result<Self, Error> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self { client, base_url })
    }

    /// Build the outbound body. System-role history entries are dropped from
    /// `contents` (this API has no system content role); the primer+context
    /// composition travels in `systemInstruction` instead. The new input is
    /// the trailing user turn.
    fn build_request(&self, request: &StreamRequest) -> GeminiRequest {
        let include_context = request.settings.send_context && request.context.text.is_some();
        let system_prompt = build_system_prompt(&request.context, include_context);

        let mut contents = Vec::new();
        for message in &request.history {
            let role = match message.role {
                Role::System => continue,
                Role::Assistant => "model",
                Role::User => "user",
            };
            contents.push(GeminiContent {
                role: role.to_string(),
                parts: vec![GeminiPart {
                    text: message.content.clone(),
                }],
            });
        }
        contents.push(GeminiContent {
            role: "user".to_string(),
            parts: vec![GeminiPart {
                text: request.input.clone(),
            }],
        });

        GeminiRequest {
            contents,
            system_instruction: GeminiContent {
                role: "system".to_string(),
                parts: vec![GeminiPart {
                    text: system_prompt,
                }],
            },
            generation_config: GeminiGenerationConfig {
                temperature: TEMPERATURE,
            },
        }
    }
}

/// What one framed event contributes to the reply.
#[derive(Debug, Default, PartialEq)]
struct EventTexts {
    texts: Vec<String>,
    finished: bool,
}

/// Interpret one framed event. Each line is treated as its own JSON payload,
/// with a leading `data:` prefix stripped when present but not required
/// (backends emit it inconsistently). `[DONE]` finishes the stream, keeping
/// any text gathered from earlier lines of the same event.
fn handle_event(event: &str) -> EventTexts {
    let lines: Vec<&str> = event
        .lines()
        .map(|line| match line.strip_prefix("data:") {
            Some(rest) => rest.trim_start(),
            None => line,
        })
        .collect();

    let mut texts = Vec::new();
    for payload in &lines {
        let trimmed = payload.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "[DONE]" {
            return EventTexts {
                texts,
                finished: true,
            };
        }
        match serde_json::from_str::<GeminiPayload>(trimmed) {
            Ok(parsed) => texts.extend(extract_texts(parsed)),
            Err(e) => {
                warn!(provider = PROVIDER_ID, error = %e, "line parse failed, skipping");
            }
        }
    }

    // Some response variants stream one JSON document across several lines of
    // a single event; when per-line parsing produced nothing, try the lines
    // rejoined as one document before giving up on the event.
    if texts.is_empty() {
        let joined = lines.join("\n");
        let joined = joined.trim();
        if !joined.is_empty() && joined != "[DONE]" {
            if let Ok(parsed) = serde_json::from_str::<GeminiPayload>(joined) {
                texts.extend(extract_texts(parsed));
            }
        }
    }

    EventTexts {
        texts,
        finished: false,
    }
}

/// Pull reply fragments out of one parsed payload.
///
/// Per chunk, extraction tries `candidates[0].content.parts[].text`
/// (concatenated), then `candidates[0].delta.text`, then
/// `candidates[0].delta.content.parts[].text` (concatenated); the first
/// shape that yields text wins, so a fragment is never counted twice. The
/// order is pinned by tests below.
fn extract_texts(payload: GeminiPayload) -> Vec<String> {
    let chunks = match payload {
        GeminiPayload::Many(chunks) => chunks,
        GeminiPayload::One(chunk) => vec![chunk],
    };

    let mut texts = Vec::new();
    for chunk in chunks {
        let Some(candidate) = chunk.candidates.into_iter().next() else {
            continue;
        };

        if let Some(combined) = candidate
            .content
            .as_ref()
            .map(join_parts)
            .filter(|t| !t.is_empty())
        {
            texts.push(combined);
            continue;
        }

        let Some(delta) = candidate.delta else {
            continue;
        };

        if let Some(text) = delta.text.filter(|t| !t.is_empty()) {
            texts.push(text);
            continue;
        }

        if let Some(combined) = delta
            .content
            .as_ref()
            .map(join_parts)
            .filter(|t| !t.is_empty())
        {
            texts.push(combined);
        }
    }
    texts
}

fn join_parts(content: &GeminiChunkContent) -> String {
    content
        .parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect()
}

#[async_trait::async_trait]
impl ProviderAdapter for GeminiProvider {
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
        key.trim().chars().count() >= MIN_KEY_LENGTH
    }

    async fn stream(&self, request: &StreamRequest) -> Result<TextStream, Error> {
        let api_key = self
            .resolve_api_key(&request.settings)
            .ok_or_else(|| Error::missing_key(PROVIDER_ID))?;
        let model = self.resolve_model(&request.settings);
        let body = self.build_request(request);

        let url = format!("{}/models/{}:streamGenerateContent", self.base_url, model);
        let response = self
            .client
            .post(url)
            .query(&[("alt", "sse"), ("key", api_key.as_str())])
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
                for text in outcome.texts {
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
    use crate::prompt::ASSISTANT_PRIMER;
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
    fn key_shape_is_a_length_check() {
        let provider = GeminiProvider::new().unwrap();
        assert!(provider.validate_key_shape("a".repeat(20).as_str()));
        assert!(provider.validate_key_shape(&format!("  {}  ", "a".repeat(20))));
        assert!(!provider.validate_key_shape("short"));
    }

    #[test]
    fn request_drops_system_history_and_maps_roles() {
        let provider = GeminiProvider::new().unwrap();
        let history = vec![
            Message::system("internal note", PROVIDER_ID),
            Message::user("question", PROVIDER_ID),
            Message::assistant("answer", PROVIDER_ID),
        ];
        let request = StreamRequest::new(
            "follow-up",
            history,
            DocContext::empty(),
            settings_with("k".repeat(24).as_str(), ""),
            CancellationToken::new(),
        );

        let body = provider.build_request(&request);
        let roles: Vec<&str> = body.contents.iter().map(|c| c.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
        assert_eq!(body.contents.last().unwrap().parts[0].text, "follow-up");
        assert_eq!(body.system_instruction.role, "system");
        assert_eq!(body.system_instruction.parts[0].text, ASSISTANT_PRIMER);
        assert_eq!(body.generation_config.temperature, 0.6);
    }

    #[test]
    fn primary_shape_concatenates_parts() {
        let outcome = handle_event(
            r#"data: {"candidates":[{"content":{"parts":[{"text":"Hel"},{"text":"lo"}]}}]}"#,
        );
        assert_eq!(outcome.texts, vec!["Hello"]);
        assert!(!outcome.finished);
    }

    #[test]
    fn array_payload_yields_each_chunk() {
        let outcome = handle_event(
            r#"data: [{"candidates":[{"content":{"parts":[{"text":"one"}]}}]},{"candidates":[{"content":{"parts":[{"text":"two"}]}}]}]"#,
        );
        assert_eq!(outcome.texts, vec!["one", "two"]);
    }

    #[test]
    fn delta_text_is_used_when_primary_is_empty() {
        let outcome = handle_event(r#"data: {"candidates":[{"delta":{"text":"inc"}}]}"#);
        assert_eq!(outcome.texts, vec!["inc"]);
    }

    #[test]
    fn delta_content_parts_are_the_last_resort() {
        let outcome = handle_event(
            r#"data: {"candidates":[{"delta":{"content":{"parts":[{"text":"a"},{"text":"b"}]}}}]}"#,
        );
        assert_eq!(outcome.texts, vec!["ab"]);
    }

    #[test]
    fn primary_shape_wins_over_delta_without_duplicating() {
        let outcome = handle_event(
            r#"data: {"candidates":[{"content":{"parts":[{"text":"primary"}]},"delta":{"text":"shadowed"}}]}"#,
        );
        assert_eq!(outcome.texts, vec!["primary"]);
    }

    #[test]
    fn data_prefix_is_optional() {
        let outcome = handle_event(r#"{"candidates":[{"content":{"parts":[{"text":"bare"}]}}]}"#);
        assert_eq!(outcome.texts, vec!["bare"]);
    }

    #[test]
    fn carriage_returns_are_tolerated() {
        let outcome =
            handle_event("data: {\"candidates\":[{\"delta\":{\"text\":\"crlf\"}}]}\r");
        assert_eq!(outcome.texts, vec!["crlf"]);
    }

    #[test]
    fn done_sentinel_keeps_texts_from_same_event() {
        let event = "data: {\"candidates\":[{\"delta\":{\"text\":\"tail\"}}]}\ndata: [DONE]";
        let outcome = handle_event(event);
        assert_eq!(outcome.texts, vec!["tail"]);
        assert!(outcome.finished);
    }

    #[test]
    fn multi_line_document_is_rejoined_and_reparsed() {
        let event =
            "data: {\"candidates\":\ndata: [{\"content\":{\"parts\":[{\"text\":\"joined\"}]}}]}";
        let outcome = handle_event(event);
        assert_eq!(outcome.texts, vec!["joined"]);
    }

    #[test]
    fn unparseable_line_does_not_stop_the_others() {
        let event = "data: %%garbage%%\ndata: {\"candidates\":[{\"delta\":{\"text\":\"ok\"}}]}";
        let outcome = handle_event(event);
        assert_eq!(outcome.texts, vec!["ok"]);
    }

    #[test]
    fn non_first_candidates_are_ignored() {
        let outcome = handle_event(
            r#"data: {"candidates":[{"delta":{"text":"first"}},{"delta":{"text":"second"}}]}"#,
        );
        assert_eq!(outcome.texts, vec!["first"]);
    }
}
