//! Folds streamed assistant frames into the transcript.
//!
//! A single assistant turn moves through
//! `Idle -> Thinking -> Streaming -> Completed`, with `Errored` reachable
//! from `Thinking` or `Streaming`. Frames are applied strictly in arrival
//! order; nothing is reordered or deduplicated.

use tracing::{debug, warn};

use crate::frame::InboundFrame;
use crate::transcript::{Message, Role, Transcript};

/// Progress indicators the UI derives its state from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStatus {
    /// A user message was sent and no chunk has arrived yet.
    pub thinking: bool,
    /// A reply is in flight (cleared only by end or error).
    pub streaming: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Thinking,
    Streaming,
    Completed,
    Errored,
}

/// What a frame changed, in application order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptUpdate {
    /// An error message was appended.
    ErrorAppended(String),
    /// A new assistant message was started with this text.
    ReplyStarted(String),
    /// Text was appended to the in-progress assistant message.
    ReplyExtended(String),
    /// The last assistant message was marked completed.
    ReplyCompleted,
    /// The turn stopped without an assistant message to complete.
    StreamStopped,
}

/// Owns the transcript and the streaming indicators for one widget.
#[derive(Debug, Clone)]
pub struct StreamAssembler {
    transcript: Transcript,
    status: StreamStatus,
}

impl StreamAssembler {
    /// Start a conversation seeded with the introduction text.
    pub fn new(introduction: impl Into<String>) -> Self {
        Self {
            transcript: Transcript::seeded(introduction),
            status: StreamStatus::default(),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn status(&self) -> StreamStatus {
        self.status
    }

    /// Record an outgoing user message and wait for the reply.
    pub fn begin_turn(&mut self, user_text: impl Into<String>) {
        self.seal_open_reply();
        self.transcript.push(Message::user(user_text));
        self.status = StreamStatus {
            thinking: true,
            streaming: true,
        };
    }

    /// Decode and apply a raw text frame. Malformed frames are dropped
    /// without touching the transcript or the status.
    pub fn apply_raw(&mut self, raw: &str) -> Vec<TranscriptUpdate> {
        match InboundFrame::parse(raw) {
            Ok(frame) => self.apply(&frame),
            Err(e) => {
                warn!(error = %e, "dropping malformed frame");
                Vec::new()
            }
        }
    }

    /// Apply one frame. Error, chunk and end are handled independently and
    /// in that order, so a frame carrying several of them applies each.
    pub fn apply(&mut self, frame: &InboundFrame) -> Vec<TranscriptUpdate> {
        let mut updates = Vec::new();

        if let Some(error) = frame.error_text() {
            debug!(error, "assistant reported an error");
            self.seal_open_reply();
            self.transcript.push(Message::error(error));
            self.stop();
            updates.push(TranscriptUpdate::ErrorAppended(error.to_string()));
        }

        if let Some(chunk) = frame.chunk_text() {
            // First token hides the thinking indicator; streaming stays on.
            self.status.thinking = false;
            match self.transcript.last_mut() {
                Some(last) if last.is_in_progress() => {
                    last.text.push_str(chunk);
                    updates.push(TranscriptUpdate::ReplyExtended(chunk.to_string()));
                }
                _ => {
                    self.transcript.push(Message::streaming(chunk));
                    updates.push(TranscriptUpdate::ReplyStarted(chunk.to_string()));
                }
            }
        }

        if frame.is_end() {
            match self.transcript.last_mut() {
                Some(last) if last.role == Role::Assistant => {
                    last.completed = Some(true);
                    updates.push(TranscriptUpdate::ReplyCompleted);
                }
                _ => updates.push(TranscriptUpdate::StreamStopped),
            }
            self.stop();
        }

        updates
    }

    /// The transport failed mid-turn: clear the indicators, keep the text.
    pub fn interrupt(&mut self) {
        if self.status != StreamStatus::default() {
            debug!("stream interrupted by transport");
        }
        self.stop();
    }

    pub fn phase(&self) -> TurnPhase {
        if self.status.thinking {
            return TurnPhase::Thinking;
        }
        if self.status.streaming {
            return TurnPhase::Streaming;
        }
        match self.transcript.last() {
            Some(m) if m.role == Role::Error => TurnPhase::Errored,
            Some(m) if m.role == Role::Assistant && m.completed == Some(true) => {
                TurnPhase::Completed
            }
            _ => TurnPhase::Idle,
        }
    }

    /// Mark a reply that will never see its end frame as completed, so at
    /// most one assistant message is ever in progress.
    fn seal_open_reply(&mut self) {
        if let Some(last) = self.transcript.last_mut() {
            if last.is_in_progress() {
                last.completed = Some(true);
            }
        }
    }

    fn stop(&mut self) {
        self.status = StreamStatus::default();
    }
}
