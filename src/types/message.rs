use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Identifier for a message within a transcript.
///
/// Ids are assigned by the transcript in insertion order and are never reused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// The author of a message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSender {
    /// Authored by the user.
    User,

    /// Authored by the assistant.
    Assistant,
}

/// Delivery status of a message.
///
/// Transitions are monotonic: `Sending` and `Streaming` may move to `Sent` or
/// `Failed`; the terminal states admit nothing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// A user message awaiting acknowledgment.
    Sending,

    /// An assistant message still accumulating tokens.
    Streaming,

    /// Delivery completed.
    Sent,

    /// Delivery failed.
    Failed,
}

impl MessageStatus {
    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Sent | MessageStatus::Failed)
    }

    /// Returns true if the monotonic transition table permits moving to `next`.
    pub fn can_transition_to(&self, next: MessageStatus) -> bool {
        match self {
            MessageStatus::Sending | MessageStatus::Streaming => {
                matches!(next, MessageStatus::Sent | MessageStatus::Failed)
            }
            MessageStatus::Sent | MessageStatus::Failed => false,
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageStatus::Sending => "sending",
            MessageStatus::Streaming => "streaming",
            MessageStatus::Sent => "sent",
            MessageStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// One entry in the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Transcript-assigned identifier.
    pub id: MessageId,

    /// The text of the message. Grows by append while an assistant message
    /// is streaming; set once for user messages.
    pub content: String,

    /// When the message was created.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,

    /// Who authored the message.
    pub sender: MessageSender,

    /// Current delivery status.
    pub status: MessageStatus,
}
