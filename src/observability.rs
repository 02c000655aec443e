use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("threadchat.client.requests");
pub(crate) static CLIENT_NETWORK_ERRORS: Counter =
    Counter::new("threadchat.client.network_errors");
pub(crate) static CLIENT_FORMAT_ERRORS: Counter = Counter::new("threadchat.client.format_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("threadchat.client.request_duration_seconds");

pub(crate) static STORE_WRITES: Counter = Counter::new("threadchat.store.writes");
pub(crate) static STORE_WRITE_ERRORS: Counter = Counter::new("threadchat.store.write_errors");

pub(crate) static SESSION_SUBMISSIONS: Counter = Counter::new("threadchat.session.submissions");
pub(crate) static SESSION_ROLLBACKS: Counter = Counter::new("threadchat.session.rollbacks");
pub(crate) static SESSION_DISCARDED_REPLIES: Counter =
    Counter::new("threadchat.session.discarded_replies");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_NETWORK_ERRORS);
    collector.register_counter(&CLIENT_FORMAT_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STORE_WRITES);
    collector.register_counter(&STORE_WRITE_ERRORS);

    collector.register_counter(&SESSION_SUBMISSIONS);
    collector.register_counter(&SESSION_ROLLBACKS);
    collector.register_counter(&SESSION_DISCARDED_REPLIES);
}
