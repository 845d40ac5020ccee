//! Integration tests for the stream controller.
//!
//! These tests drive turns against scripted transports under tokio's paused
//! clock, so idle detection, the hard deadline, and the backoff ladder run
//! deterministically without a real service.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream;

use chatwait::types::{
    MessageSender, MessageStatus, StreamEndEvent, StreamErrorEvent, StreamEvent, StreamParams,
    StreamTokenEvent,
};
use chatwait::{
    ChatSnapshot, Error, EventStream, StreamController, StreamTransport, TurnState,
};

/// One scripted item on a scripted connection.
enum Step {
    /// Wait, then yield a token.
    Token(Duration, &'static str),

    /// Wait, then yield the end record.
    End(Duration),

    /// Wait, then yield the end record with a final_output field.
    EndWithFinalOutput(Duration, &'static str),

    /// Wait, then fail at the transport level.
    TransportError(Duration),

    /// Wait, then yield an in-band error record.
    InBandError(Duration),

    /// Wait, then fail to parse a record.
    Malformed(Duration),

    /// Keep the connection open and silent forever.
    Hang,
}

fn scripted_stream(steps: Vec<Step>) -> EventStream {
    Box::pin(stream::unfold(
        (VecDeque::from(steps), 0u64),
        |(mut steps, mut index)| async move {
            let step = steps.pop_front()?;
            let item = match step {
                Step::Token(delay, text) => {
                    tokio::time::sleep(delay).await;
                    let event = StreamEvent::Token(StreamTokenEvent {
                        token: text.to_string(),
                        token_index: index,
                        context_id: None,
                    });
                    index += 1;
                    Ok(event)
                }
                Step::End(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(StreamEvent::End(StreamEndEvent {
                        context_id: None,
                        final_output: None,
                    }))
                }
                Step::EndWithFinalOutput(delay, text) => {
                    tokio::time::sleep(delay).await;
                    Ok(StreamEvent::End(StreamEndEvent {
                        context_id: None,
                        final_output: Some(text.to_string()),
                    }))
                }
                Step::TransportError(delay) => {
                    tokio::time::sleep(delay).await;
                    Err(Error::transport("connection reset by peer", None))
                }
                Step::InBandError(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(StreamEvent::Error(StreamErrorEvent {
                        context_id: None,
                        error_code: Some("STREAMING_SERVICE_ERROR".to_string()),
                        message: Some("upstream failed".to_string()),
                    }))
                }
                Step::Malformed(delay) => {
                    tokio::time::sleep(delay).await;
                    Err(Error::parse("malformed record on stream", None))
                }
                Step::Hang => {
                    futures::future::pending::<()>().await;
                    return None;
                }
            };
            Some((item, (steps, index)))
        },
    ))
}

/// A transport that answers each `open` with the next scripted connection
/// and refuses once the scripts run out.
struct ScriptedTransport {
    connections: Mutex<VecDeque<Vec<Step>>>,
    opens: AtomicU32,
    params_seen: Mutex<Vec<StreamParams>>,
}

impl ScriptedTransport {
    fn new(connections: Vec<Vec<Step>>) -> Arc<Self> {
        Arc::new(Self {
            connections: Mutex::new(VecDeque::from(connections)),
            opens: AtomicU32::new(0),
            params_seen: Mutex::new(Vec::new()),
        })
    }

    fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    fn params_seen(&self) -> Vec<StreamParams> {
        self.params_seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl StreamTransport for ScriptedTransport {
    async fn open(&self, params: &StreamParams) -> chatwait::Result<EventStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.params_seen.lock().unwrap().push(params.clone());
        match self.connections.lock().unwrap().pop_front() {
            Some(steps) => Ok(scripted_stream(steps)),
            None => Err(Error::transport("connection refused", None)),
        }
    }
}

/// A transport whose connection attempts never complete.
struct StalledTransport;

#[async_trait::async_trait]
impl StreamTransport for StalledTransport {
    async fn open(&self, _: &StreamParams) -> chatwait::Result<EventStream> {
        futures::future::pending().await
    }
}

async fn wait_terminal(controller: &StreamController) -> ChatSnapshot {
    for _ in 0..30_000 {
        let snapshot = controller.snapshot();
        if snapshot.turn_state.is_terminal() {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("turn never reached a terminal state");
}

async fn wait_for_assistant_content(controller: &StreamController, needle: &str) {
    for _ in 0..30_000 {
        let snapshot = controller.snapshot();
        if snapshot
            .messages
            .iter()
            .any(|m| m.sender == MessageSender::Assistant && m.content.contains(needle))
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("assistant content {needle:?} never appeared");
}

fn controller_over(transport: Arc<ScriptedTransport>) -> StreamController {
    StreamController::new(transport)
}

#[tokio::test(start_paused = true)]
async fn hello_world_turn() {
    let transport = ScriptedTransport::new(vec![vec![
        Step::Token(Duration::ZERO, "Hello"),
        Step::Token(Duration::from_millis(20), " world!"),
        Step::End(Duration::from_millis(20)),
    ]]);
    let mut controller = controller_over(Arc::clone(&transport));
    controller.initialize_session().unwrap();

    controller.send_message("Hello, world!").unwrap();
    let snapshot = wait_terminal(&controller).await;

    assert_eq!(snapshot.turn_state, TurnState::Completed);
    assert_eq!(snapshot.error, None);
    assert_eq!(snapshot.retry_count, 0);

    let user = &snapshot.messages[0];
    assert_eq!(user.sender, MessageSender::User);
    assert_eq!(user.content, "Hello, world!");
    assert_eq!(user.status, MessageStatus::Sent);

    let reply = &snapshot.messages[1];
    assert_eq!(reply.sender, MessageSender::Assistant);
    assert_eq!(reply.content, "Hello world!");
    assert_eq!(reply.status, MessageStatus::Sent);
}

#[tokio::test(start_paused = true)]
async fn tokens_assemble_in_delivery_order_despite_jitter() {
    let transport = ScriptedTransport::new(vec![vec![
        Step::Token(Duration::ZERO, "a"),
        Step::Token(Duration::from_millis(300), "b"),
        Step::Token(Duration::ZERO, "c"),
        Step::Token(Duration::from_secs(3), "d"),
        Step::Token(Duration::from_millis(1), "e"),
        Step::End(Duration::ZERO),
    ]]);
    let mut controller = controller_over(transport);
    controller.initialize_session().unwrap();

    controller.send_message("order").unwrap();
    let snapshot = wait_terminal(&controller).await;

    assert_eq!(snapshot.turn_state, TurnState::Completed);
    assert_eq!(snapshot.messages[1].content, "abcde");
}

#[tokio::test(start_paused = true)]
async fn silence_after_tokens_completes_the_turn() {
    let transport = ScriptedTransport::new(vec![vec![
        Step::Token(Duration::ZERO, "partial"),
        Step::Hang,
    ]]);
    let mut controller = controller_over(transport);
    controller.initialize_session().unwrap();

    controller.send_message("idle?").unwrap();
    let snapshot = wait_terminal(&controller).await;

    assert_eq!(snapshot.turn_state, TurnState::Completed);
    assert_eq!(snapshot.messages[1].content, "partial");
    assert_eq!(snapshot.messages[1].status, MessageStatus::Sent);
    assert_eq!(snapshot.error, None);
}

#[tokio::test(start_paused = true)]
async fn stalled_connection_attempt_idle_completes() {
    let mut controller = StreamController::new(Arc::new(StalledTransport));
    controller.initialize_session().unwrap();

    let begun = tokio::time::Instant::now();
    controller.send_message("anyone there?").unwrap();
    let snapshot = wait_terminal(&controller).await;

    // Idle completion at the threshold, well short of the hard deadline.
    assert_eq!(snapshot.turn_state, TurnState::Completed);
    assert!(begun.elapsed() < Duration::from_secs(10));
    assert_eq!(snapshot.messages[1].content, "");
    assert_eq!(snapshot.messages[1].status, MessageStatus::Sent);
}

#[tokio::test(start_paused = true)]
async fn final_output_never_overrides_streamed_content() {
    let transport = ScriptedTransport::new(vec![vec![
        Step::Token(Duration::ZERO, "partial"),
        Step::EndWithFinalOutput(Duration::from_millis(10), "a totally different text"),
    ]]);
    let mut controller = controller_over(transport);
    controller.initialize_session().unwrap();

    controller.send_message("override?").unwrap();
    let snapshot = wait_terminal(&controller).await;

    assert_eq!(snapshot.turn_state, TurnState::Completed);
    assert_eq!(snapshot.messages[1].content, "partial");
}

#[tokio::test(start_paused = true)]
async fn slow_but_not_silent_turn_hits_the_hard_deadline() {
    // Tokens every 3 seconds stay under the 5 second idle threshold but
    // run far past the 30 second deadline.
    let mut steps = Vec::new();
    for _ in 0..20 {
        steps.push(Step::Token(Duration::from_secs(3), "drip "));
    }
    steps.push(Step::End(Duration::ZERO));
    let transport = ScriptedTransport::new(vec![steps]);
    let mut controller = controller_over(transport);
    controller.initialize_session().unwrap();

    controller.send_message("slow").unwrap();
    let snapshot = wait_terminal(&controller).await;

    assert_eq!(snapshot.turn_state, TurnState::TimedOut);
    assert_eq!(snapshot.messages[1].status, MessageStatus::Failed);
    let error = snapshot.error.expect("timeout must surface an error");
    assert!(error.contains("Hard timeout"), "unexpected error: {error}");
}

#[tokio::test(start_paused = true)]
async fn transport_error_reconnects_with_the_same_request() {
    let transport = ScriptedTransport::new(vec![
        vec![Step::TransportError(Duration::ZERO)],
        vec![
            Step::Token(Duration::ZERO, "recovered"),
            Step::End(Duration::ZERO),
        ],
    ]);
    let mut controller = controller_over(Arc::clone(&transport));
    controller.initialize_session().unwrap();

    controller.send_message("try me").unwrap();
    let snapshot = wait_terminal(&controller).await;

    assert_eq!(snapshot.turn_state, TurnState::Completed);
    assert_eq!(snapshot.retry_count, 1);
    assert_eq!(snapshot.messages[1].content, "recovered");

    let params = transport.params_seen();
    assert_eq!(params.len(), 2);
    assert_eq!(params[0].message, "try me");
    assert_eq!(params[0], params[1]);
}

#[tokio::test(start_paused = true)]
async fn in_band_error_record_feeds_the_retry_ladder() {
    let transport = ScriptedTransport::new(vec![
        vec![Step::InBandError(Duration::ZERO)],
        vec![Step::Token(Duration::ZERO, "ok"), Step::End(Duration::ZERO)],
    ]);
    let mut controller = controller_over(Arc::clone(&transport));
    controller.initialize_session().unwrap();

    controller.send_message("again").unwrap();
    let snapshot = wait_terminal(&controller).await;

    assert_eq!(snapshot.turn_state, TurnState::Completed);
    assert_eq!(snapshot.retry_count, 1);
    assert_eq!(transport.opens(), 2);
}

#[tokio::test(start_paused = true)]
async fn ladder_exhaustion_fails_the_turn_with_no_fourth_attempt() {
    let transport = ScriptedTransport::new(vec![
        vec![Step::TransportError(Duration::ZERO)],
        vec![Step::TransportError(Duration::ZERO)],
        vec![Step::TransportError(Duration::ZERO)],
        vec![Step::TransportError(Duration::ZERO)],
    ]);
    let mut controller = controller_over(Arc::clone(&transport));
    controller.initialize_session().unwrap();

    controller.send_message("doomed").unwrap();
    let snapshot = wait_terminal(&controller).await;

    assert_eq!(snapshot.turn_state, TurnState::Failed);
    assert_eq!(snapshot.retry_count, 3);
    let error = snapshot.error.expect("exhaustion must surface an error");
    assert!(error.contains("3"), "unexpected error: {error}");

    // Initial connection plus the three rungs of the ladder; never a fourth
    // automatic retry.
    assert_eq!(transport.opens(), 4);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.opens(), 4);
}

#[tokio::test(start_paused = true)]
async fn parse_error_is_terminal_and_never_retried() {
    let transport = ScriptedTransport::new(vec![vec![
        Step::Token(Duration::ZERO, "ok so far"),
        Step::Malformed(Duration::from_millis(10)),
    ]]);
    let mut controller = controller_over(Arc::clone(&transport));
    controller.initialize_session().unwrap();

    controller.send_message("garbage incoming").unwrap();
    let snapshot = wait_terminal(&controller).await;

    assert_eq!(snapshot.turn_state, TurnState::Failed);
    assert_eq!(snapshot.retry_count, 0);
    assert_eq!(transport.opens(), 1);
    let error = snapshot.error.expect("parse failure must surface an error");
    assert!(error.contains("Parse error"), "unexpected error: {error}");

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn manual_retry_resets_the_counter_and_replays_the_original_message() {
    let transport = ScriptedTransport::new(vec![
        vec![Step::TransportError(Duration::ZERO)],
        vec![Step::TransportError(Duration::ZERO)],
        vec![Step::TransportError(Duration::ZERO)],
        vec![Step::TransportError(Duration::ZERO)],
        vec![
            Step::Token(Duration::ZERO, "better late"),
            Step::End(Duration::ZERO),
        ],
    ]);
    let mut controller = controller_over(Arc::clone(&transport));
    controller.initialize_session().unwrap();

    controller.send_message("please answer").unwrap();
    let failed = wait_terminal(&controller).await;
    assert_eq!(failed.turn_state, TurnState::Failed);
    assert_eq!(failed.retry_count, 3);

    controller.retry().unwrap();
    let snapshot = wait_terminal(&controller).await;

    assert_eq!(snapshot.turn_state, TurnState::Completed);
    assert_eq!(snapshot.retry_count, 0);
    assert_eq!(snapshot.error, None);

    // Every attempt, automatic and manual, carried the original message
    // verbatim, never a concatenation of partial output.
    for params in transport.params_seen() {
        assert_eq!(params.message, "please answer");
    }

    let reply = snapshot
        .messages
        .iter()
        .rev()
        .find(|m| m.sender == MessageSender::Assistant)
        .unwrap();
    assert_eq!(reply.content, "better late");
    assert_eq!(reply.status, MessageStatus::Sent);
}

#[tokio::test(start_paused = true)]
async fn retry_without_a_failed_turn_is_rejected() {
    let transport = ScriptedTransport::new(vec![]);
    let mut controller = controller_over(transport);
    controller.initialize_session().unwrap();

    let err = controller.retry().unwrap_err();
    assert!(err.is_invalid_transition());
}

#[tokio::test(start_paused = true)]
async fn starting_a_new_turn_freezes_the_superseded_one() {
    let transport = ScriptedTransport::new(vec![
        vec![
            Step::Token(Duration::ZERO, "A1"),
            Step::Token(Duration::from_secs(4), "A2"),
            Step::Hang,
        ],
        vec![Step::Token(Duration::ZERO, "B1"), Step::End(Duration::ZERO)],
    ]);
    let mut controller = controller_over(transport);
    controller.initialize_session().unwrap();

    controller.send_message("first").unwrap();
    wait_for_assistant_content(&controller, "A1").await;

    controller.send_message("second").unwrap();
    let snapshot = wait_terminal(&controller).await;
    assert_eq!(snapshot.turn_state, TurnState::Completed);

    // Give the superseded turn's would-be token every chance to land.
    tokio::time::sleep(Duration::from_secs(10)).await;
    let snapshot = controller.snapshot();

    let first_reply = snapshot
        .messages
        .iter()
        .find(|m| m.sender == MessageSender::Assistant)
        .unwrap();
    assert_eq!(first_reply.content, "A1");
    assert_eq!(first_reply.status, MessageStatus::Failed);

    let second_reply = snapshot
        .messages
        .iter()
        .rev()
        .find(|m| m.sender == MessageSender::Assistant)
        .unwrap();
    assert_eq!(second_reply.content, "B1");
    assert_eq!(second_reply.status, MessageStatus::Sent);
}

#[tokio::test(start_paused = true)]
async fn send_without_session_fails_fast() {
    let transport = ScriptedTransport::new(vec![]);
    let mut controller = controller_over(Arc::clone(&transport));

    let err = controller.send_message("hello").unwrap_err();
    assert!(err.is_no_active_session());
    assert_eq!(transport.opens(), 0);
    assert!(controller.snapshot().messages.is_empty());
}

#[tokio::test(start_paused = true)]
async fn blank_message_is_rejected_before_any_turn_starts() {
    let transport = ScriptedTransport::new(vec![]);
    let mut controller = controller_over(Arc::clone(&transport));
    controller.initialize_session().unwrap();

    let err = controller.send_message("   \t  ").unwrap_err();
    assert!(matches!(err, Error::EmptyContent { .. }));
    assert_eq!(transport.opens(), 0);
    assert!(controller.snapshot().messages.is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_deactivates_the_session() {
    let transport = ScriptedTransport::new(vec![vec![Step::Hang]]);
    let mut controller = controller_over(transport);
    controller.initialize_session().unwrap();
    controller.send_message("still going").unwrap();

    controller.shutdown();
    let snapshot = controller.snapshot();
    assert!(!snapshot.session.unwrap().is_active());

    let err = controller.send_message("one more").unwrap_err();
    assert!(err.is_no_active_session());
}
