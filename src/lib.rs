// Public modules
pub mod backoff;
pub mod chat;
pub mod client;
pub mod controller;
pub mod error;
pub mod observability;
pub mod session;
pub mod sse;
pub mod transcript;
pub mod types;
pub mod watchdog;

// Re-exports
pub use backoff::{BackoffDecision, BackoffPolicy, MAX_RETRIES};
pub use client::{ChatWait, EventStream, StreamTransport};
pub use controller::{ChatSnapshot, StreamController, TurnState};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use session::SessionManager;
pub use transcript::Transcript;
pub use types::*;
pub use watchdog::{TimingPolicy, Watchdog, WatchdogSignal};
