use serde::{Deserialize, Serialize};

/// Request body for the synchronous `/chat/wait` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatWaitRequest {
    /// The user's message.
    pub message: String,

    /// Optional correlation id for conversation continuity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

impl ChatWaitRequest {
    /// Creates a new request.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context_id: None,
        }
    }

    /// Sets the correlation id.
    pub fn with_context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }
}
