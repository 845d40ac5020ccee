//! The streaming session controller.
//!
//! One controller owns one conversation: it opens a single event stream per
//! outbound turn, assembles inbound tokens into the transcript, detects
//! stalled or broken streams via the watchdog, and recovers through the
//! bounded backoff ladder plus a manual retry override. The transcript never
//! loses, duplicates, or misorders content: every write goes through the
//! controller, and writes from a superseded turn are no-ops.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::StreamExt;
use tokio::time::Instant;

use crate::backoff::{BackoffDecision, BackoffPolicy};
use crate::client::{EventStream, StreamTransport};
use crate::error::{Error, Result};
use crate::observability;
use crate::session::SessionManager;
use crate::transcript::Transcript;
use crate::types::{Message, MessageId, MessageStatus, Session, StreamErrorEvent, StreamEvent, StreamParams};
use crate::watchdog::{TimingPolicy, Watchdog, WatchdogSignal};

/// Where the controller's current turn stands.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TurnState {
    /// No turn has started.
    Idle,

    /// Opening the event stream.
    Connecting,

    /// Receiving tokens.
    Streaming,

    /// Waiting out a backoff delay before reconnecting.
    Retrying,

    /// The turn ended with a complete assistant message.
    Completed,

    /// The turn failed; manual retry is available.
    Failed,

    /// The turn exceeded its hard deadline; manual retry is available.
    TimedOut,
}

impl TurnState {
    /// Returns true if the turn reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TurnState::Completed | TurnState::Failed | TurnState::TimedOut
        )
    }
}

/// Read-only view of the conversation for the presentation layer.
#[derive(Debug, Clone)]
pub struct ChatSnapshot {
    /// The conversation identity, if initialized.
    pub session: Option<Session>,

    /// The transcript, in insertion order.
    pub messages: Vec<Message>,

    /// Where the current turn stands.
    pub turn_state: TurnState,

    /// Whether a stream connection is currently open.
    pub is_connected: bool,

    /// Whether tokens are currently arriving.
    pub is_streaming: bool,

    /// User-visible description of the last failure, if any.
    pub error: Option<String>,

    /// Reconnection attempts made within the current turn.
    pub retry_count: u32,
}

struct Shared {
    session: Option<Session>,
    transcript: Transcript,
    turn_state: TurnState,
    is_connected: bool,
    retry_count: u32,
    error: Option<String>,
    last_user_content: Option<String>,
    live_placeholder: Option<MessageId>,
    // Writes are accepted only from the turn whose generation matches.
    generation: u64,
}

impl Shared {
    fn ack_user(&mut self, user_id: Option<MessageId>, status: MessageStatus) {
        if let Some(user_id) = user_id
            && self
                .transcript
                .get(user_id)
                .map(|m| m.status == MessageStatus::Sending)
                .unwrap_or(false)
        {
            let _ = self.transcript.set_status(user_id, status);
        }
    }
}

struct TurnHandle {
    task: tokio::task::JoinHandle<()>,
}

/// Orchestrates one event-stream connection per outbound turn.
pub struct StreamController {
    transport: Arc<dyn StreamTransport>,
    timing: TimingPolicy,
    backoff: BackoffPolicy,
    shared: Arc<Mutex<Shared>>,
    turn: Option<TurnHandle>,
}

impl StreamController {
    /// Creates a controller over the given transport.
    pub fn new(transport: Arc<dyn StreamTransport>) -> Self {
        Self {
            transport,
            timing: TimingPolicy::default(),
            backoff: BackoffPolicy::default(),
            shared: Arc::new(Mutex::new(Shared {
                session: None,
                transcript: Transcript::new(),
                turn_state: TurnState::Idle,
                is_connected: false,
                retry_count: 0,
                error: None,
                last_user_content: None,
                live_placeholder: None,
                generation: 0,
            })),
            turn: None,
        }
    }

    /// Overrides the timing policy.
    pub fn with_timing(mut self, timing: TimingPolicy) -> Self {
        self.timing = timing;
        self
    }

    /// Overrides the backoff policy.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Creates the conversation identity for this controller.
    ///
    /// Replaces any prior session; a live turn is torn down first.
    pub fn initialize_session(&mut self) -> Result<Session> {
        let session = SessionManager::create()?;
        self.teardown_current_turn();
        let mut shared = self.lock();
        shared.session = Some(session.clone());
        shared.turn_state = TurnState::Idle;
        shared.error = None;
        shared.retry_count = 0;
        Ok(session)
    }

    /// Submits a user message and starts a streaming turn for it.
    ///
    /// Any live turn is torn down before the new one begins. Fails fast with
    /// `NoActiveSession` when no session is initialized and `EmptyContent`
    /// when the message is blank.
    pub fn send_message(&mut self, content: &str) -> Result<MessageId> {
        let trimmed = content.trim();
        let context_id = {
            let shared = self.lock();
            match &shared.session {
                Some(session) if session.is_active() => session.id.clone(),
                Some(_) => {
                    return Err(Error::no_active_session("session has been torn down"));
                }
                None => {
                    return Err(Error::no_active_session(
                        "initialize a session before sending messages",
                    ));
                }
            }
        };
        if trimmed.is_empty() {
            return Err(Error::empty_content("user message is blank after trimming"));
        }

        self.teardown_current_turn();
        let user_id = {
            let mut shared = self.lock();
            let user_id = shared.transcript.append_user(trimmed)?;
            shared.last_user_content = Some(trimmed.to_string());
            user_id
        };
        self.start_turn(trimmed.to_string(), context_id, Some(user_id));
        Ok(user_id)
    }

    /// Manually retries the last turn after `Failed` or `TimedOut`.
    ///
    /// Resets the retry counter and replays the original user content
    /// verbatim in a fresh turn with a fresh assistant placeholder.
    pub fn retry(&mut self) -> Result<()> {
        let (content, context_id) = {
            let shared = self.lock();
            if !matches!(shared.turn_state, TurnState::Failed | TurnState::TimedOut) {
                return Err(Error::invalid_transition(
                    "manual retry is only available after a failed or timed out turn",
                ));
            }
            let content = shared
                .last_user_content
                .clone()
                .ok_or_else(|| Error::invalid_transition("no previous turn to retry"))?;
            let context_id = match &shared.session {
                Some(session) if session.is_active() => session.id.clone(),
                _ => return Err(Error::no_active_session("session has been torn down")),
            };
            (content, context_id)
        };
        observability::MANUAL_RETRIES.click();
        self.teardown_current_turn();
        self.start_turn(content, context_id, None);
        Ok(())
    }

    /// Returns a point-in-time view for the presentation layer.
    pub fn snapshot(&self) -> ChatSnapshot {
        let shared = self.lock();
        ChatSnapshot {
            session: shared.session.clone(),
            messages: shared.transcript.snapshot(),
            turn_state: shared.turn_state,
            is_connected: shared.is_connected,
            is_streaming: shared.turn_state == TurnState::Streaming,
            error: shared.error.clone(),
            retry_count: shared.retry_count,
        }
    }

    /// Cancels the live turn, if any, leaving the session usable.
    pub fn cancel(&mut self) {
        self.teardown_current_turn();
        let mut shared = self.lock();
        if !shared.turn_state.is_terminal() {
            shared.turn_state = TurnState::Idle;
        }
    }

    /// Cancels the live turn and empties the transcript.
    pub fn clear_transcript(&mut self) {
        self.teardown_current_turn();
        let mut shared = self.lock();
        shared.transcript.clear();
        shared.turn_state = TurnState::Idle;
        shared.error = None;
        shared.retry_count = 0;
        shared.last_user_content = None;
    }

    /// Tears down the live turn and deactivates the session.
    pub fn shutdown(&mut self) {
        self.teardown_current_turn();
        let mut shared = self.lock();
        if let Some(session) = &mut shared.session {
            session.deactivate();
        }
        shared.turn_state = TurnState::Idle;
        shared.is_connected = false;
    }

    /// Cancels the live turn, if any.
    ///
    /// The generation bump happens under the lock, so a late write from the
    /// aborted task observes the mismatch and becomes a no-op.
    fn teardown_current_turn(&mut self) {
        {
            let mut shared = self.lock();
            shared.generation += 1;
            shared.is_connected = false;
            // The superseded turn's placeholder will never complete.
            if let Some(placeholder) = shared.live_placeholder.take() {
                let _ = shared.transcript.set_status(placeholder, MessageStatus::Failed);
            }
        }
        if let Some(handle) = self.turn.take() {
            handle.task.abort();
        }
    }

    fn start_turn(&mut self, content: String, context_id: String, user_id: Option<MessageId>) {
        let (generation, placeholder) = {
            let mut shared = self.lock();
            shared.generation += 1;
            shared.turn_state = TurnState::Connecting;
            shared.is_connected = false;
            shared.retry_count = 0;
            shared.error = None;
            let placeholder = shared.transcript.append_assistant_placeholder();
            shared.live_placeholder = Some(placeholder);
            (shared.generation, placeholder)
        };
        let driver = TurnDriver {
            transport: Arc::clone(&self.transport),
            shared: Arc::clone(&self.shared),
            timing: self.timing,
            backoff: self.backoff,
            generation,
            placeholder,
            user_id,
            params: StreamParams::new(content).with_context_id(context_id),
        };
        let task = tokio::spawn(driver.run());
        self.turn = Some(TurnHandle { task });
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        if let Some(handle) = self.turn.take() {
            handle.task.abort();
        }
    }
}

enum Verdict {
    Ended,
    Idle,
    Expired,
    Transport(Error),
    Fatal(Error),
}

enum Connect {
    Opened(Result<EventStream>),
    Idle,
    Expired,
}

enum RetryStep {
    Reconnect,
    Exhausted,
    DeadlineHit,
}

enum TurnOutcome {
    Completed { idle: bool },
    TimedOut,
    Failed(Error),
}

struct TurnDriver {
    transport: Arc<dyn StreamTransport>,
    shared: Arc<Mutex<Shared>>,
    timing: TimingPolicy,
    backoff: BackoffPolicy,
    generation: u64,
    placeholder: MessageId,
    user_id: Option<MessageId>,
    params: StreamParams,
}

impl TurnDriver {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Runs one turn to a terminal state.
    ///
    /// All waiting happens inside `select!`: the stream, the idle probe, the
    /// hard deadline, and backoff delays. Aborting the task cancels them all
    /// and drops the connection.
    async fn run(self) {
        observability::TURNS_STARTED.click();
        let started = Instant::now();
        let mut watchdog = Watchdog::new(started, &self.timing);
        let deadline = watchdog.deadline_at();
        let mut attempt: u32 = 0;

        // The probe runs from turn start, so a connection attempt that stalls
        // idle-completes instead of hanging until the deadline.
        let mut idle_probe = tokio::time::interval_at(
            started + self.timing.idle_check_interval,
            self.timing.idle_check_interval,
        );

        let outcome = loop {
            let connect = {
                let open = self.transport.open(&self.params);
                tokio::pin!(open);
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => break Connect::Expired,
                        _ = idle_probe.tick() => {
                            match watchdog.check(Instant::now()) {
                                Some(WatchdogSignal::Expired) => break Connect::Expired,
                                Some(WatchdogSignal::Idle) => break Connect::Idle,
                                None => {}
                            }
                        }
                        opened = &mut open => break Connect::Opened(opened),
                    }
                }
            };
            let mut stream = match connect {
                Connect::Expired => break TurnOutcome::TimedOut,
                Connect::Idle => break TurnOutcome::Completed { idle: true },
                Connect::Opened(Ok(stream)) => stream,
                Connect::Opened(Err(err)) if err.is_retryable() => {
                    match self.schedule_retry(&mut attempt, deadline).await {
                        RetryStep::Reconnect => {
                            // Each fresh attempt gets a full idle window.
                            watchdog.record_activity(Instant::now());
                            continue;
                        }
                        RetryStep::Exhausted => break self.exhausted(attempt),
                        RetryStep::DeadlineHit => break TurnOutcome::TimedOut,
                    }
                }
                Connect::Opened(Err(err)) => break TurnOutcome::Failed(err),
            };

            if !self.mark_connected() {
                return;
            }
            // A fresh connection counts as activity for the idle clock.
            watchdog.record_activity(Instant::now());

            let verdict = loop {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => break Verdict::Expired,
                    _ = idle_probe.tick() => {
                        match watchdog.check(Instant::now()) {
                            Some(WatchdogSignal::Expired) => break Verdict::Expired,
                            Some(WatchdogSignal::Idle) => break Verdict::Idle,
                            None => {}
                        }
                    }
                    event = stream.next() => {
                        observability::STREAM_EVENTS.click();
                        match event {
                            Some(Ok(StreamEvent::Token(token))) => {
                                watchdog.record_activity(Instant::now());
                                if !self.apply_token(&token.token) {
                                    return;
                                }
                            }
                            Some(Ok(StreamEvent::End(_))) => break Verdict::Ended,
                            Some(Ok(StreamEvent::Error(event))) => {
                                break Verdict::Transport(in_band_error(event));
                            }
                            Some(Ok(StreamEvent::Ignored)) => {}
                            Some(Err(err)) if err.is_retryable() => break Verdict::Transport(err),
                            Some(Err(err)) => break Verdict::Fatal(err),
                            None => {
                                break Verdict::Transport(Error::transport(
                                    "stream closed without an end record",
                                    None,
                                ));
                            }
                        }
                    }
                }
            };

            match verdict {
                Verdict::Ended => break TurnOutcome::Completed { idle: false },
                Verdict::Idle => break TurnOutcome::Completed { idle: true },
                Verdict::Expired => break TurnOutcome::TimedOut,
                Verdict::Fatal(err) => break TurnOutcome::Failed(err),
                Verdict::Transport(_) => {
                    drop(stream);
                    match self.schedule_retry(&mut attempt, deadline).await {
                        RetryStep::Reconnect => {
                            watchdog.record_activity(Instant::now());
                            continue;
                        }
                        RetryStep::Exhausted => break self.exhausted(attempt),
                        RetryStep::DeadlineHit => break TurnOutcome::TimedOut,
                    }
                }
            }
        };

        self.finish(outcome, started);
    }

    fn exhausted(&self, attempts: u32) -> TurnOutcome {
        TurnOutcome::Failed(Error::retry_exhausted(
            attempts,
            "could not maintain a stream connection",
        ))
    }

    /// Advances the retry ladder and waits out the backoff delay.
    ///
    /// The hard deadline keeps running across the delay.
    async fn schedule_retry(&self, attempt: &mut u32, deadline: Instant) -> RetryStep {
        *attempt += 1;
        let delay = match self.backoff.delay(*attempt) {
            BackoffDecision::Delay(delay) => delay,
            BackoffDecision::Exhausted => {
                *attempt -= 1;
                return RetryStep::Exhausted;
            }
        };
        {
            let mut shared = self.lock();
            if shared.generation != self.generation {
                observability::STALE_EVENTS.click();
                return RetryStep::DeadlineHit;
            }
            shared.turn_state = TurnState::Retrying;
            shared.is_connected = false;
            shared.retry_count = *attempt;
        }
        observability::RETRIES.click();
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => RetryStep::DeadlineHit,
            _ = tokio::time::sleep(delay) => {
                let mut shared = self.lock();
                if shared.generation != self.generation {
                    observability::STALE_EVENTS.click();
                    return RetryStep::DeadlineHit;
                }
                shared.turn_state = TurnState::Connecting;
                RetryStep::Reconnect
            }
        }
    }

    fn mark_connected(&self) -> bool {
        let mut shared = self.lock();
        if shared.generation != self.generation {
            observability::STALE_EVENTS.click();
            return false;
        }
        shared.is_connected = true;
        shared.ack_user(self.user_id, MessageStatus::Sent);
        true
    }

    fn apply_token(&self, token: &str) -> bool {
        let mut shared = self.lock();
        if shared.generation != self.generation {
            observability::STALE_EVENTS.click();
            return false;
        }
        // InvalidTransition here means a stale reference; swallowed, counted.
        let _ = shared.transcript.append_token(self.placeholder, token);
        shared.turn_state = TurnState::Streaming;
        observability::TOKENS_APPLIED.click();
        true
    }

    fn finish(&self, outcome: TurnOutcome, started: Instant) {
        let mut shared = self.lock();
        if shared.generation != self.generation {
            observability::STALE_EVENTS.click();
            return;
        }
        shared.is_connected = false;
        shared.live_placeholder = None;
        let retry_count = shared.retry_count;
        match outcome {
            TurnOutcome::Completed { idle } => {
                let _ = shared.transcript.set_status(self.placeholder, MessageStatus::Sent);
                shared.ack_user(self.user_id, MessageStatus::Sent);
                shared.turn_state = TurnState::Completed;
                shared.error = None;
                if idle {
                    observability::IDLE_COMPLETIONS.click();
                }
                observability::TURNS_COMPLETED.click();
            }
            TurnOutcome::TimedOut => {
                let _ = shared
                    .transcript
                    .set_status(self.placeholder, MessageStatus::Failed);
                shared.ack_user(self.user_id, MessageStatus::Failed);
                shared.turn_state = TurnState::TimedOut;
                shared.error = Some(user_facing(
                    &Error::hard_timeout(
                        "the response took too long",
                        self.timing.hard_deadline.as_secs_f64(),
                    ),
                    retry_count,
                ));
                observability::HARD_TIMEOUTS.click();
                observability::TURNS_FAILED.click();
            }
            TurnOutcome::Failed(err) => {
                let _ = shared
                    .transcript
                    .set_status(self.placeholder, MessageStatus::Failed);
                shared.ack_user(self.user_id, MessageStatus::Failed);
                shared.turn_state = TurnState::Failed;
                shared.error = Some(user_facing(&err, retry_count));
                observability::TURNS_FAILED.click();
            }
        }
        observability::TURN_DURATION.add(started.elapsed().as_secs_f64());
    }
}

/// Converts an in-band error record into a transport error for the ladder.
fn in_band_error(event: StreamErrorEvent) -> Error {
    let code = event.error_code.as_deref().unwrap_or("UNKNOWN_ERROR");
    let message = event
        .message
        .as_deref()
        .unwrap_or("the service reported a stream error");
    Error::transport(format!("{code}: {message}"), None)
}

/// Renders a failure for the presentation layer.
///
/// Includes the retry count when the ladder was used; never includes raw
/// payloads or source chains.
fn user_facing(err: &Error, retry_count: u32) -> String {
    if retry_count > 0 {
        format!("{err} (after {retry_count} reconnection attempts)")
    } else {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(TurnState::Completed.is_terminal());
        assert!(TurnState::Failed.is_terminal());
        assert!(TurnState::TimedOut.is_terminal());
        assert!(!TurnState::Idle.is_terminal());
        assert!(!TurnState::Connecting.is_terminal());
        assert!(!TurnState::Streaming.is_terminal());
        assert!(!TurnState::Retrying.is_terminal());
    }

    #[test]
    fn user_facing_mentions_retry_count() {
        let err = Error::retry_exhausted(3, "could not maintain a stream connection");
        let rendered = user_facing(&err, 3);
        assert!(rendered.contains("3 reconnection attempts"));
    }

    #[test]
    fn in_band_error_is_retryable() {
        let err = in_band_error(StreamErrorEvent {
            context_id: None,
            error_code: Some("STREAMING_SERVICE_ERROR".to_string()),
            message: Some("upstream failed".to_string()),
        });
        assert!(err.is_retryable());
    }
}
