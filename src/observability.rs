use biometrics::{Collector, Counter, Moments};

pub(crate) static TURNS_STARTED: Counter = Counter::new("chatwait.controller.turns_started");
pub(crate) static TURNS_COMPLETED: Counter = Counter::new("chatwait.controller.turns_completed");
pub(crate) static TURNS_FAILED: Counter = Counter::new("chatwait.controller.turns_failed");
pub(crate) static TURN_DURATION: Moments =
    Moments::new("chatwait.controller.turn_duration_seconds");

pub(crate) static STREAM_EVENTS: Counter = Counter::new("chatwait.stream.events");
pub(crate) static TOKENS_APPLIED: Counter = Counter::new("chatwait.stream.tokens_applied");
pub(crate) static STALE_EVENTS: Counter = Counter::new("chatwait.stream.stale_events");

pub(crate) static RETRIES: Counter = Counter::new("chatwait.controller.retries");
pub(crate) static MANUAL_RETRIES: Counter = Counter::new("chatwait.controller.manual_retries");
pub(crate) static IDLE_COMPLETIONS: Counter = Counter::new("chatwait.controller.idle_completions");
pub(crate) static HARD_TIMEOUTS: Counter = Counter::new("chatwait.controller.hard_timeouts");

pub(crate) static INVALID_TRANSITIONS: Counter =
    Counter::new("chatwait.transcript.invalid_transitions");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&TURNS_STARTED);
    collector.register_counter(&TURNS_COMPLETED);
    collector.register_counter(&TURNS_FAILED);
    collector.register_moments(&TURN_DURATION);

    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&TOKENS_APPLIED);
    collector.register_counter(&STALE_EVENTS);

    collector.register_counter(&RETRIES);
    collector.register_counter(&MANUAL_RETRIES);
    collector.register_counter(&IDLE_COMPLETIONS);
    collector.register_counter(&HARD_TIMEOUTS);

    collector.register_counter(&INVALID_TRANSITIONS);
}
