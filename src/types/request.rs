use tokio_util::sync::CancellationToken;

use crate::context::DocContext;
use crate::types::{Message, Settings};

/// Everything one streaming turn needs. Built by the session controller for
/// each accepted send and handed to the active adapter; never persisted.
///
/// `history` is the transcript as it stood before this turn; the new input
/// travels separately and the adapter appends it as the final user entry of
/// the outbound message list.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub input: String,
    pub history: Vec<Message>,
    pub context: DocContext,
    pub settings: Settings,
    pub cancel: CancellationToken,
}

impl StreamRequest {
    pub fn new(
        input: impl Into<String>,
        history: Vec<Message>,
        context: DocContext,
        settings: Settings,
        cancel: CancellationToken,
    ) -> Self {
        StreamRequest {
            input: input.into(),
            history,
            context,
            settings,
            cancel,
        }
    }
}
