use serde::{Deserialize, Serialize};

/// Parameters for opening a streaming turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamParams {
    /// The user's message for this turn.
    pub message: String,

    /// Optional correlation id for conversation continuity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,

    /// Index of the last token already received, sent when resuming.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_token_index: Option<u64>,
}

impl StreamParams {
    /// Creates parameters for a fresh turn.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context_id: None,
            last_token_index: None,
        }
    }

    /// Sets the correlation id.
    pub fn with_context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    /// Sets the resume index.
    pub fn with_last_token_index(mut self, last_token_index: u64) -> Self {
        self.last_token_index = Some(last_token_index);
        self
    }

    /// Renders the parameters as URL query pairs.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("message", self.message.clone())];
        if let Some(context_id) = &self.context_id {
            query.push(("context_id", context_id.clone()));
        }
        if let Some(last_token_index) = self.last_token_index {
            query.push(("last_token_index", last_token_index.to_string()));
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_includes_optional_fields_when_set() {
        let params = StreamParams::new("hi")
            .with_context_id("default")
            .with_last_token_index(7);
        assert_eq!(
            params.query(),
            vec![
                ("message", "hi".to_string()),
                ("context_id", "default".to_string()),
                ("last_token_index", "7".to_string()),
            ]
        );
    }

    #[test]
    fn query_omits_unset_fields() {
        let params = StreamParams::new("hi");
        assert_eq!(params.query(), vec![("message", "hi".to_string())]);
    }
}
