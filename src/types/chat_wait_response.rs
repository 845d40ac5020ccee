use serde::{Deserialize, Serialize};

/// Response body from the synchronous `/chat/wait` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatWaitResponse {
    /// The complete assistant response.
    pub message: String,

    /// Correlation id for this conversation.
    pub context_id: String,

    /// Number of tokens in the response.
    pub token_count: u64,

    /// Server-side processing time in milliseconds.
    pub processing_time_ms: f64,
}
