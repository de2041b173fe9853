//! Wire types for the chat backend's HTTP API

use serde::{Deserialize, Serialize};

/// Body of `POST /message` and `POST /stream`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            message: message.into(),
            session_id,
        }
    }
}

/// Response of `POST /message`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub response: String,
    pub agent_used: String,
    pub success: bool,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of `POST /reset`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResetResponse {
    pub status: String,
    pub message: String,
}

impl ResetResponse {
    /// Whether the server actually dropped a session.
    pub fn is_reset(&self) -> bool {
        self.status == "conversation_reset"
    }
}

/// Response of `POST /session/new`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewSessionResponse {
    pub session_id: String,
    pub message: String,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_sessions: Option<u64>,
}

/// Response of `GET /session/{id}/history`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionHistory {
    pub session_id: String,
    #[serde(default)]
    pub messages: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub agent_used: Option<String>,
    /// ISO-8601, usually without an offset.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// One frame of the `/stream` event channel, tagged by its `type` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Session assigned (or confirmed) by the server.
    Session { session_id: String },
    /// The agent now handling the turn.
    Agent { agent: String },
    /// A fragment of reply text.
    Content { content: String },
    /// Terminal success, optionally naming the agent that produced the reply.
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent: Option<String>,
    },
    /// Terminal failure.
    Error { error: String },
}

impl StreamEvent {
    /// `done` and `error` end a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}
