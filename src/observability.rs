use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("chatterpi.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("chatterpi.client.request_errors");
pub(crate) static CLIENT_EMPTY_COMPLETIONS: Counter =
    Counter::new("chatterpi.client.empty_completions");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("chatterpi.client.request_duration_seconds");

pub(crate) static SESSION_SUBMISSIONS: Counter = Counter::new("chatterpi.session.submissions");
pub(crate) static SESSION_REPLIES: Counter = Counter::new("chatterpi.session.replies");
pub(crate) static SESSION_COMPLETION_FAILURES: Counter =
    Counter::new("chatterpi.session.completion_failures");
pub(crate) static SESSION_CANCELLED: Counter = Counter::new("chatterpi.session.cancelled");
pub(crate) static SESSION_REPLY_LATENCY: Moments =
    Moments::new("chatterpi.session.reply_latency_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_counter(&CLIENT_EMPTY_COMPLETIONS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&SESSION_SUBMISSIONS);
    collector.register_counter(&SESSION_REPLIES);
    collector.register_counter(&SESSION_COMPLETION_FAILURES);
    collector.register_counter(&SESSION_CANCELLED);
    collector.register_moments(&SESSION_REPLY_LATENCY);
}
