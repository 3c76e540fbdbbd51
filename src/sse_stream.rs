//! Stream adapter that splits a chunked byte stream into SSE-style events.
//!
//! An event is the maximal run of bytes ending at a blank line (`\n\n`).
//! Partial trailing data is buffered across reads, and a final unterminated
//! fragment is flushed as one last event when the transport closes. The
//! decoder yields raw event text and leaves all interpretation (`data:`
//! prefixes, sentinels, JSON payloads) to the provider adapters, whose wire
//! formats disagree about what an event contains.

use crate::Error;
use futures_util::{Stream, StreamExt};
use memchr::memmem;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// Maximum bytes held while waiting for an event delimiter.
const MAX_BUFFER_SIZE: usize = 1_000_000;

/// A stream adapter that frames SSE events out of a byte stream.
/// Maintains internal state to handle events split across chunks.
pub struct SseStream<S> {
    /// The underlying byte stream
    inner: S,
    /// Buffer for incomplete raw bytes from previous chunks
    buffer: Vec<u8>,
    /// Framed events ready to be yielded
    events: VecDeque<Result<String, Error>>,
    /// Whether the underlying stream has finished
    inner_done: bool,
}

impl<S> SseStream<S> {
    /// Create a new SSE stream from a byte stream.
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: Vec::new(),
            events: VecDeque::new(),
            inner_done: false,
        }
    }

    /// Frame complete events out of the buffer onto the internal queue.
    ///
    /// An event with invalid UTF-8 is queued as an error but still drained,
    /// so one bad frame never blocks the frames behind it.
    fn parse_buffer(&mut self) {
        // SSE event separator is "\n\n" (two consecutive newlines)
        let separator = b"\n\n";
        let finder = memmem::Finder::new(separator);
        let mut start = 0;

        // Find complete events using memmem for efficient byte pattern matching
        while let Some(pos) = finder.find(&self.buffer[start..]) {
            let event_end = start + pos;
            let event_bytes = &self.buffer[start..event_end];

            match std::str::from_utf8(event_bytes) {
                Ok(text) => {
                    // Blank runs between delimiters are not events
                    if !text.trim().is_empty() {
                        self.events.push_back(Ok(text.to_string()));
                    }
                }
                Err(e) => {
                    self.events
                        .push_back(Err(Error::malformed_event(format!(
                            "invalid UTF-8 in event: {e}"
                        ))));
                }
            }

            // Move past this event (including the separator)
            start = event_end + separator.len();
        }

        // Remove processed bytes from buffer
        if start > 0 {
            self.buffer.drain(..start);
        }
    }

    /// Flush whatever remains in the buffer as a final event at stream end.
    fn flush_trailing(&mut self) -> Option<Result<String, Error>> {
        if self.buffer.is_empty() {
            return None;
        }
        let bytes = std::mem::take(&mut self.buffer);
        match std::str::from_utf8(&bytes) {
            Ok(text) if text.trim().is_empty() => None,
            Ok(text) => Some(Ok(text.to_string())),
            Err(e) => Some(Err(Error::malformed_event(format!(
                "invalid UTF-8 in trailing event: {e}"
            )))),
        }
    }
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Item = Result<String, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            // First, yield any already-framed events (FIFO order)
            if let Some(event) = self.events.pop_front() {
                return Poll::Ready(Some(event));
            }

            if self.inner_done {
                return Poll::Ready(None);
            }

            // No buffered events, poll the underlying stream for more data
            let chunk = match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    return Poll::Ready(Some(Err(Error::unrecognized(format!(
                        "transport stream failed: {}",
                        e.into()
                    )))));
                }
                None => {
                    // Stream ended without a final delimiter; flush the
                    // remainder as one trailing event
                    self.inner_done = true;
                    return Poll::Ready(self.flush_trailing());
                }
            };

            // Append raw bytes to buffer
            self.buffer.extend_from_slice(&chunk);

            // Check buffer size limit
            if self.buffer.len() > MAX_BUFFER_SIZE {
                self.buffer.clear();
                return Poll::Ready(Some(Err(Error::malformed_event(
                    "event exceeded maximum buffer size",
                ))));
            }

            // Frame any complete events and continue loop
            self.parse_buffer();
        }
    }
}

/// Extension trait to add SSE framing to byte streams.
pub trait SseStreamExt: Stream {
    /// Frame this byte stream as SSE events.
    fn sse_events(self) -> SseStream<Self>
    where
        Self: Sized,
    {
        SseStream::new(self)
    }
}

impl<S: Stream> SseStreamExt for S {}
