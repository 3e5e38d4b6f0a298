use std::time::Duration;

// Recorded through the `metrics` facade; the embedding application installs the recorder.

pub(crate) fn record_request(endpoint: &'static str, outcome: &'static str, elapsed: Duration) {
    metrics::counter!("exercise_api_requests_total", "endpoint" => endpoint, "outcome" => outcome)
        .increment(1);
    metrics::histogram!("exercise_api_request_duration_seconds", "endpoint" => endpoint)
        .record(elapsed.as_secs_f64());
}

pub(crate) fn record_validation(status: &'static str) {
    metrics::counter!("exercise_validations_total", "status" => status).increment(1);
}

pub(crate) fn record_poll_tick() {
    metrics::counter!("exercise_attempt_poll_ticks_total").increment(1);
}

pub(crate) fn record_poll_outcome(outcome: &'static str) {
    metrics::counter!("exercise_attempt_poll_outcomes_total", "outcome" => outcome).increment(1);
}
