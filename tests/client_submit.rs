use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tally::{
    ActorId, Event, EventKind, IdentityError, LoopbackState, LoopbackTransport, OperationKind,
    SubmitClient, SubmitError, SubmitOptions, SubmitRequest, SubmitResponse, SubmitStatus,
    SubmitTransport, TransportError,
};

struct ScriptedTransport {
    statuses: VecDeque<SubmitStatus>,
    sends: Arc<Mutex<Vec<SubmitRequest>>>,
}

impl ScriptedTransport {
    fn new(statuses: Vec<SubmitStatus>, sends: Arc<Mutex<Vec<SubmitRequest>>>) -> Self {
        Self {
            statuses: statuses.into(),
            sends,
        }
    }
}

impl SubmitTransport for ScriptedTransport {
    fn send(&mut self, request: SubmitRequest) -> Result<SubmitResponse, TransportError> {
        self.sends.lock().unwrap().push(request.clone());
        let status = self.statuses.pop_front().unwrap_or(SubmitStatus::Rejected);
        let event = match status {
            SubmitStatus::Committed => Some(Event {
                sequence_number: 1,
                kind: EventKind::Incremented,
                resulting_value: 1,
                actor: request.actor,
                timestamp_ms: 0,
            }),
            _ => None,
        };
        Ok(SubmitResponse {
            request_id: request.request_id,
            status,
            event,
            status_reason: match status {
                SubmitStatus::Rejected => Some("scripted_reject".into()),
                _ => None,
            },
        })
    }

    fn poll_commit(&mut self, _request_id: &str) -> Result<Option<Event>, TransportError> {
        Ok(None)
    }
}

fn actor(name: &str) -> ActorId {
    ActorId::new(name).unwrap()
}

fn fast_options() -> SubmitOptions {
    SubmitOptions {
        max_retries: 3,
        commit_timeout: Duration::from_millis(200),
        poll_interval: Duration::from_millis(1),
    }
}

#[test]
fn missing_identity_fails_fast_before_transport() {
    let sends = Arc::new(Mutex::new(Vec::new()));
    let transport = ScriptedTransport::new(vec![SubmitStatus::Committed], Arc::clone(&sends));
    let mut client = SubmitClient::new(transport);

    let err = client
        .submit(OperationKind::Increment, None, fast_options())
        .unwrap_err();
    assert_eq!(
        err,
        SubmitError::IdentityUnavailable(IdentityError::Unavailable)
    );
    assert!(sends.lock().unwrap().is_empty());
}

#[test]
fn backpressure_is_retried_with_stable_request_id() {
    let sends = Arc::new(Mutex::new(Vec::new()));
    let transport = ScriptedTransport::new(
        vec![
            SubmitStatus::Backpressure,
            SubmitStatus::Backpressure,
            SubmitStatus::Committed,
        ],
        Arc::clone(&sends),
    );
    let mut client = SubmitClient::new(transport);

    let (pending, committed) = client
        .submit(OperationKind::Increment, Some(actor("alice")), fast_options())
        .unwrap();
    assert!(committed.is_some());

    let sends = sends.lock().unwrap();
    assert_eq!(sends.len(), 3);
    assert!(sends.iter().all(|r| r.request_id == pending.request_id));
    assert_eq!(client.telemetry().metrics().submit_retry_total, 2);
    assert_eq!(client.telemetry().spans().len(), 3);
}

#[test]
fn exhausted_backpressure_surfaces_attempts() {
    let sends = Arc::new(Mutex::new(Vec::new()));
    let transport = ScriptedTransport::new(
        vec![SubmitStatus::Backpressure, SubmitStatus::Backpressure],
        Arc::clone(&sends),
    );
    let mut client = SubmitClient::new(transport);
    let options = SubmitOptions {
        max_retries: 1,
        ..fast_options()
    };

    let err = client
        .submit(OperationKind::Decrement, Some(actor("alice")), options)
        .unwrap_err();
    match err {
        SubmitError::Exhausted { attempts, .. } => assert_eq!(attempts, 2),
        other => panic!("expected Exhausted, got {other:?}"),
    }
}

#[test]
fn rejection_carries_the_endpoint_reason() {
    let sends = Arc::new(Mutex::new(Vec::new()));
    let transport = ScriptedTransport::new(vec![SubmitStatus::Rejected], Arc::clone(&sends));
    let mut client = SubmitClient::new(transport);

    let err = client
        .submit(OperationKind::Reset, Some(actor("alice")), fast_options())
        .unwrap_err();
    match err {
        SubmitError::Exhausted { reason, .. } => {
            assert_eq!(reason.as_deref(), Some("scripted_reject"));
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
    assert_eq!(client.telemetry().metrics().reject_total, 1);
}

#[test]
fn loopback_commits_are_ordered_in_the_ledger() {
    let shared = LoopbackState::new(0);
    let mut client = SubmitClient::new(LoopbackTransport::new(Arc::clone(&shared)));

    for operation in [
        OperationKind::Increment,
        OperationKind::Increment,
        OperationKind::Decrement,
    ] {
        client
            .submit_and_await(operation, Some(actor("alice")), fast_options())
            .unwrap();
    }

    let shared = shared.lock().unwrap();
    assert_eq!(shared.engine.read(), 1);
    let sequences: Vec<u64> = shared
        .ledger
        .history()
        .iter()
        .map(|e| e.sequence_number)
        .collect();
    assert_eq!(sequences, vec![1, 2, 3]);
}

#[test]
fn timeout_means_unknown_outcome_not_failure() {
    let shared = LoopbackState::new(0);
    let transport = LoopbackTransport::new(Arc::clone(&shared)).with_deferred_commits(3);
    let mut client = SubmitClient::new(transport);

    let (pending, committed) = client
        .submit(OperationKind::Increment, Some(actor("alice")), fast_options())
        .unwrap();
    assert!(committed.is_none());

    let impatient = SubmitOptions {
        commit_timeout: Duration::ZERO,
        ..fast_options()
    };
    let err = client.await_commit(&pending, impatient).unwrap_err();
    assert!(matches!(err, SubmitError::Timeout { .. }));
    assert_eq!(client.telemetry().metrics().timeout_total, 1);

    // The abandoned mutation still commits once the caller waits again:
    // timeout is not rollback.
    let event = client.await_commit(&pending, fast_options()).unwrap();
    assert_eq!(event.resulting_value, 1);
    assert_eq!(shared.lock().unwrap().engine.read(), 1);
}

#[test]
fn each_retry_is_an_independently_ordered_event() {
    let shared = LoopbackState::new(0);
    let mut client = SubmitClient::new(LoopbackTransport::new(Arc::clone(&shared)));

    // Two deliberate re-submissions of the same logical increment: the
    // operations are idempotent-by-effect, not idempotent-by-call.
    for _ in 0..2 {
        client
            .submit_and_await(OperationKind::Increment, Some(actor("alice")), fast_options())
            .unwrap();
    }
    assert_eq!(shared.lock().unwrap().engine.read(), 2);
}
