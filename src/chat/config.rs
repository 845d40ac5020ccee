//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::watchdog::TimingPolicy;

/// Command-line arguments for the chatwait-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the ChatWait service.
    #[arrrg(
        optional,
        "Service base URL (default: http://localhost:8000/api/v1/)",
        "URL"
    )]
    pub url: Option<String>,

    /// Hard per-turn deadline, in seconds.
    #[arrrg(optional, "Hard per-turn deadline in seconds (default: 30)", "SECONDS")]
    pub deadline: Option<u64>,

    /// Silence tolerated before a turn is treated as complete, in seconds.
    #[arrrg(optional, "Idle threshold in seconds (default: 5)", "SECONDS")]
    pub idle: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Base URL of the service, `None` for the client default.
    pub base_url: Option<String>,

    /// Timing knobs for the stream controller.
    pub timing: TimingPolicy,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    pub fn new() -> Self {
        Self {
            base_url: None,
            timing: TimingPolicy::default(),
            use_color: true,
        }
    }

    /// Sets the service base URL.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let mut timing = TimingPolicy::default();
        if let Some(deadline) = args.deadline {
            timing.hard_deadline = Duration::from_secs(deadline);
        }
        if let Some(idle) = args.idle {
            timing.idle_threshold = Duration::from_secs(idle);
        }
        Self {
            base_url: args.url,
            timing,
            use_color: !args.no_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_override_timing() {
        let args = ChatArgs {
            url: Some("http://chat.example.com/api/v1/".to_string()),
            deadline: Some(60),
            idle: Some(10),
            no_color: true,
        };
        let config = ChatConfig::from(args);
        assert_eq!(
            config.base_url.as_deref(),
            Some("http://chat.example.com/api/v1/")
        );
        assert_eq!(config.timing.hard_deadline, Duration::from_secs(60));
        assert_eq!(config.timing.idle_threshold, Duration::from_secs(10));
        assert!(!config.use_color);
    }

    #[test]
    fn defaults_keep_standard_timing() {
        let config = ChatConfig::from(ChatArgs::default());
        assert!(config.base_url.is_none());
        assert_eq!(config.timing.hard_deadline, Duration::from_secs(30));
        assert!(config.use_color);
    }
}
