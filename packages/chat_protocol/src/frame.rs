use serde::{Deserialize, Serialize};

use crate::error::FrameError;
use crate::transcript::Transcript;

/// A user message sent to the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub user_input: String,
    pub user_id: String,
    pub agent_key: String,
    pub agent_name: String,
    pub project_name: String,
    pub page_url: String,
}

/// One frame of a streamed assistant reply.
///
/// Every field is optional and a single frame may carry several of them.
/// Empty strings and `end: false` count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InboundFrame {
    /// Decode a text frame. Anything that is not a JSON object of the
    /// expected shape is rejected.
    pub fn parse(raw: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn chunk(text: impl Into<String>) -> Self {
        Self {
            chunk: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn end() -> Self {
        Self {
            end: Some(true),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// The chunk text, if non-empty.
    pub fn chunk_text(&self) -> Option<&str> {
        self.chunk.as_deref().filter(|s| !s.is_empty())
    }

    /// The application error, if non-empty.
    pub fn error_text(&self) -> Option<&str> {
        self.error.as_deref().filter(|s| !s.is_empty())
    }

    pub fn is_end(&self) -> bool {
        self.end.unwrap_or(false)
    }
}

/// Phone number and conversation snapshot posted to the lead-capture endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadSubmission {
    pub agent_key: String,
    pub agent_name: String,
    pub mobile: String,
    pub project_name: String,
    pub page_url: String,
    #[serde(rename = "chatHistory")]
    pub chat_history: Transcript,
}
