//! Streaming session controller.
//!
//! Owns the conversation transcript and drives one streaming request at a
//! time: `Idle` until a send is accepted, `Sending` while increments arrive,
//! back to `Idle` on completion, error, or stop. The transcript is mutated
//! only here; adapters produce text increments and never touch it.

use std::sync::{Mutex, MutexGuard};

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::context::DocContext;
use crate::error::{Error, SurfacedError};
use crate::provider::ProviderDescriptor;
use crate::registry::ProviderRegistry;
use crate::settings_store::{FileSettingsStore, SettingsStore, StoreError};
use crate::types::{Message, Settings, StreamRequest};

pub struct AssistantSession {
    registry: ProviderRegistry,
    store: Box<dyn SettingsStore>,
    context: DocContext,
    state: Mutex<SessionState>,
}

struct SessionState {
    settings: Settings,
    messages: Vec<Message>,
    streaming: bool,
    error: Option<SurfacedError>,
    cancel: Option<CancellationToken>,
    /// Bumped on every accepted send. A finishing stream loop only cleans up
    /// state belonging to its own epoch, so a stop-then-resend never has its
    /// fresh `Sending` state clobbered by the previous loop winding down.
    epoch: u64,
}

impl AssistantSession {
    /// Create a session over the given catalogue, settings store, and
    /// document context. Settings are loaded from the store up front.
    pub fn new(registry: ProviderRegistry, store: Box<dyn SettingsStore>, context: DocContext) -> Self {
        let settings = store.load();
        AssistantSession {
            registry,
            store,
            context,
            state: Mutex::new(SessionState {
                settings,
                messages: Vec::new(),
                streaming: false,
                error: None,
                cancel: None,
                epoch: 0,
            }),
        }
    }

    /// Session with the standard provider catalogue and the file-backed
    /// settings store.
    pub fn standard(context: DocContext) -> Result<Self, Error> {
        Ok(Self::new(
            ProviderRegistry::standard()?,
            Box::new(FileSettingsStore::new()),
            context,
        ))
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().expect("session state mutex poisoned")
    }

    /// Send one user turn and stream the reply into the transcript.
    ///
    /// Blank input is a no-op. A send while one is already streaming, a
    /// document context over the length limit, or a missing API key for the
    /// active provider is rejected before any network call, surfacing the
    /// corresponding error value and leaving the transcript untouched.
    ///
    /// On acceptance the user message and an empty assistant message are
    /// appended immediately, then each increment is applied to the assistant
    /// message in arrival order. The future resolves when the stream ends,
    /// fails, or is stopped.
    pub async fn send(&self, input: &str) {
        let input = input.trim();
        if input.is_empty() {
            return;
        }

        let (request, label, provider_id, assistant_id, my_token, my_epoch) = {
            let mut state = self.state();
            let adapter = self.registry.get(&state.settings.active_provider);
            let label = adapter.descriptor().label;

            if state.streaming {
                state.error = Some(SurfacedError::from_error(&Error::Busy, label));
                return;
            }
            if self.context.is_too_long() {
                let error = Error::ContextTooLarge {
                    length: self.context.original_length,
                    limit: self.context.limit,
                };
                state.error = Some(SurfacedError::from_error(&error, label));
                return;
            }
            if adapter.resolve_api_key(&state.settings).is_none() {
                let error = Error::missing_key(adapter.id());
                state.error = Some(SurfacedError::from_error(&error, label));
                return;
            }

            state.error = None;

            // Snapshot before appending: the new input travels separately in
            // the request and the adapter places it last itself.
            let history = state.messages.clone();

            let user = Message::user(input, adapter.id());
            let assistant = Message::assistant("", adapter.id());
            let assistant_id = assistant.id.clone();
            state.messages.push(user);
            state.messages.push(assistant);

            state.epoch += 1;
            let my_epoch = state.epoch;
            let token = CancellationToken::new();
            state.cancel = Some(token.clone());
            state.streaming = true;

            let request = StreamRequest::new(
                input,
                history,
                self.context.clone(),
                state.settings.clone(),
                token.clone(),
            );
            (request, label, adapter.id(), assistant_id, token, my_epoch)
        };

        let adapter = self.registry.get(provider_id);
        info!(
            provider = provider_id,
            model = %adapter.resolve_model(&request.settings),
            "starting stream"
        );

        let mut increments = match adapter.stream(&request).await {
            Ok(increments) => increments,
            Err(e) => {
                warn!(provider = provider_id, error = %e, "streaming request failed");
                let mut state = self.state();
                if state.epoch == my_epoch {
                    if !my_token.is_cancelled() {
                        state.error = Some(SurfacedError::from_error(&e, label));
                    }
                    state.streaming = false;
                    state.cancel = None;
                }
                return;
            }
        };

        loop {
            // The token races the next increment so a stop resolves this
            // future promptly even while the adapter sits on a quiet
            // connection. The adapter is not trusted to observe the token
            // itself.
            let item = tokio::select! {
                biased;
                _ = my_token.cancelled() => break,
                item = increments.next() => match item {
                    Some(item) => item,
                    None => break,
                },
            };
            match item {
                Ok(text) => {
                    let mut state = self.state();
                    // Checked under the lock so an increment racing a stop
                    // can never land after the token fired.
                    if state.epoch != my_epoch || my_token.is_cancelled() {
                        break;
                    }
                    if let Some(message) =
                        state.messages.iter_mut().find(|m| m.id == assistant_id)
                    {
                        message.content.push_str(&text);
                    }
                }
                Err(e) => {
                    warn!(provider = provider_id, error = %e, "stream failed mid-response");
                    let mut state = self.state();
                    if state.epoch == my_epoch && !my_token.is_cancelled() {
                        state.error = Some(SurfacedError::from_error(&e, label));
                    }
                    break;
                }
            }
        }

        let mut state = self.state();
        if state.epoch == my_epoch {
            state.streaming = false;
            state.cancel = None;
        }
    }

    /// Stop the in-flight stream, if any. The assistant message keeps what it
    /// accumulated before the token fired; a "stopped" notice is surfaced in
    /// place of a hard failure.
    pub fn stop(&self) {
        let mut state = self.state();
        if !state.streaming {
            return;
        }
        if let Some(cancel) = state.cancel.take() {
            cancel.cancel();
        }
        state.streaming = false;
        let label = self
            .registry
            .get(&state.settings.active_provider)
            .descriptor()
            .label;
        state.error = Some(SurfacedError::from_error(&Error::Cancelled, label));
    }

    /// Stop any in-flight stream, then clear the transcript and surfaced
    /// error.
    pub fn reset(&self) {
        self.stop();
        let mut state = self.state();
        state.messages.clear();
        state.error = None;
    }

    /// Snapshot of the transcript.
    pub fn messages(&self) -> Vec<Message> {
        self.state().messages.clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.state().streaming
    }

    /// The current surfaced error value, if any.
    pub fn last_error(&self) -> Option<SurfacedError> {
        self.state().error.clone()
    }

    pub fn clear_error(&self) {
        self.state().error = None;
    }

    /// Descriptors of the registered providers, for display.
    pub fn descriptors(&self) -> Vec<&ProviderDescriptor> {
        self.registry.descriptors()
    }

    pub fn context(&self) -> &DocContext {
        &self.context
    }

    pub fn settings(&self) -> Settings {
        self.state().settings.clone()
    }

    /// Mutate settings and persist them through the store.
    pub fn update_settings<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Settings),
    {
        let mut state = self.state();
        apply(&mut state.settings);
        self.store.save(&state.settings)
    }
}
