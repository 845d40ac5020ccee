use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// An incremental token delivered over the stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamTokenEvent {
    /// The token text.
    pub token: String,

    /// Sequential index of this token within the turn.
    pub token_index: u64,

    /// Correlation id for the conversation.
    #[serde(default)]
    pub context_id: Option<String>,
}

/// The explicit stream terminator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamEndEvent {
    /// Correlation id for the conversation.
    #[serde(default)]
    pub context_id: Option<String>,

    /// Full response text, when the service repeats it at the end.
    #[serde(default)]
    pub final_output: Option<String>,
}

/// An in-band error record from the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamErrorEvent {
    /// Correlation id for the conversation.
    #[serde(default)]
    pub context_id: Option<String>,

    /// Service error code.
    #[serde(default)]
    pub error_code: Option<String>,

    /// Human-readable error message.
    #[serde(default)]
    pub message: Option<String>,
}

/// One decoded record from the streaming endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// An incremental token.
    Token(StreamTokenEvent),

    /// The explicit end of the turn.
    End(StreamEndEvent),

    /// An in-band error reported by the service.
    Error(StreamErrorEvent),

    /// A well-formed record of a shape we do not handle. Skipped.
    Ignored,
}

impl StreamEvent {
    /// Decodes a parsed JSON record into a stream event.
    ///
    /// The discriminator is either a `type`/`event_type` field or, absent
    /// that, the presence of a `token` field. Records that parse as JSON but
    /// match no known shape decode to [`StreamEvent::Ignored`]; a record that
    /// claims a known type but is missing required fields is a parse error.
    pub fn from_value(value: Value) -> Result<StreamEvent> {
        let discriminator = value
            .get("event_type")
            .or_else(|| value.get("type"))
            .and_then(Value::as_str)
            .map(str::to_string);
        match discriminator.as_deref() {
            Some("token") => Ok(StreamEvent::Token(serde_json::from_value(value)?)),
            Some("end") => Ok(StreamEvent::End(serde_json::from_value(value)?)),
            Some("error") => Ok(StreamEvent::Error(serde_json::from_value(value)?)),
            Some(_) => Ok(StreamEvent::Ignored),
            None if value.get("token").is_some() => {
                Ok(StreamEvent::Token(serde_json::from_value(value)?))
            }
            None => Ok(StreamEvent::Ignored),
        }
    }
}
