//! Ordered, append-only store of conversation messages.
//!
//! The transcript owns every [`Message`] and is the only place message
//! content or status changes. Iteration order is insertion order, always.

use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::observability;
use crate::types::{Message, MessageId, MessageSender, MessageStatus};

/// The visible conversation: an ordered, append-only-by-id message store.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    next_id: u64,
}

impl Transcript {
    /// Creates an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, content: String, sender: MessageSender, status: MessageStatus) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(Message {
            id,
            content,
            timestamp: OffsetDateTime::now_utc(),
            sender,
            status,
        });
        id
    }

    /// Appends a user message in `Sending` status.
    ///
    /// Content is trimmed; blank content is rejected with `EmptyContent`.
    pub fn append_user(&mut self, content: &str) -> Result<MessageId> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::empty_content("user message is blank after trimming"));
        }
        Ok(self.push(content.to_string(), MessageSender::User, MessageStatus::Sending))
    }

    /// Appends an empty assistant message in `Streaming` status.
    pub fn append_assistant_placeholder(&mut self) -> MessageId {
        self.push(
            String::new(),
            MessageSender::Assistant,
            MessageStatus::Streaming,
        )
    }

    /// Concatenates `token` onto the message's content.
    ///
    /// Fails with `InvalidTransition` when the id is unknown or the message
    /// is no longer streaming. Callers holding a stale turn swallow the
    /// error; the violation is still counted for diagnostics.
    pub fn append_token(&mut self, id: MessageId, token: &str) -> Result<()> {
        let Some(message) = self.messages.iter_mut().find(|m| m.id == id) else {
            observability::INVALID_TRANSITIONS.click();
            return Err(Error::invalid_transition(format!(
                "token for unknown message {id}"
            )));
        };
        if message.status != MessageStatus::Streaming {
            observability::INVALID_TRANSITIONS.click();
            return Err(Error::invalid_transition(format!(
                "token for message {id} in status {}",
                message.status
            )));
        }
        message.content.push_str(token);
        Ok(())
    }

    /// Moves the message to `status`, enforcing the monotonic table.
    pub fn set_status(&mut self, id: MessageId, status: MessageStatus) -> Result<()> {
        let Some(message) = self.messages.iter_mut().find(|m| m.id == id) else {
            observability::INVALID_TRANSITIONS.click();
            return Err(Error::invalid_transition(format!(
                "status change for unknown message {id}"
            )));
        };
        if !message.status.can_transition_to(status) {
            observability::INVALID_TRANSITIONS.click();
            return Err(Error::invalid_transition(format!(
                "message {id} cannot move from {} to {status}",
                message.status
            )));
        }
        message.status = status;
        Ok(())
    }

    /// Returns the message with the given id, if present.
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Iterates messages in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Returns the messages in insertion order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Clones the messages out for a presentation snapshot.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Returns the number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if the transcript holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Removes every message.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_user_trims_and_rejects_blank() {
        let mut transcript = Transcript::new();
        let id = transcript.append_user("  hello  ").unwrap();
        assert_eq!(transcript.get(id).unwrap().content, "hello");
        assert_eq!(transcript.get(id).unwrap().status, MessageStatus::Sending);

        let err = transcript.append_user("   ").unwrap_err();
        assert!(matches!(err, Error::EmptyContent { .. }));
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn tokens_concatenate_in_order() {
        let mut transcript = Transcript::new();
        let id = transcript.append_assistant_placeholder();
        transcript.append_token(id, "Hello").unwrap();
        transcript.append_token(id, " world!").unwrap();
        assert_eq!(transcript.get(id).unwrap().content, "Hello world!");
    }

    #[test]
    fn token_after_terminal_status_is_rejected() {
        let mut transcript = Transcript::new();
        let id = transcript.append_assistant_placeholder();
        transcript.set_status(id, MessageStatus::Sent).unwrap();

        let err = transcript.append_token(id, "late").unwrap_err();
        assert!(err.is_invalid_transition());
        assert_eq!(transcript.get(id).unwrap().content, "");
    }

    #[test]
    fn token_for_unknown_id_is_rejected() {
        let mut transcript = Transcript::new();
        let err = transcript.append_token(MessageId(42), "x").unwrap_err();
        assert!(err.is_invalid_transition());
    }

    #[test]
    fn status_transitions_are_monotonic() {
        let mut transcript = Transcript::new();
        let id = transcript.append_user("hi").unwrap();
        transcript.set_status(id, MessageStatus::Sent).unwrap();

        let err = transcript.set_status(id, MessageStatus::Failed).unwrap_err();
        assert!(err.is_invalid_transition());
        assert_eq!(transcript.get(id).unwrap().status, MessageStatus::Sent);
    }

    #[test]
    fn iteration_order_is_insertion_order() {
        let mut transcript = Transcript::new();
        let a = transcript.append_user("one").unwrap();
        let b = transcript.append_assistant_placeholder();
        let c = transcript.append_user("two").unwrap();

        let ids: Vec<MessageId> = transcript.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![a, b, c]);
    }
}
