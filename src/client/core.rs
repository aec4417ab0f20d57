use crate::event::{ActorId, Event, IdentityError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Statically typed mutation operations accepted at the submission boundary.
/// External payloads bind to this enum or are rejected; there is no dynamic
/// operation dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Increment,
    Decrement,
    Reset,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Increment => "increment",
            OperationKind::Decrement => "decrement",
            OperationKind::Reset => "reset",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutation request sent on every submission RPC. The `request_id` stays
/// stable across transport retries of one logical attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub request_id: String,
    pub operation: OperationKind,
    pub actor: ActorId,
}

/// Disposition reported by the submission endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    /// Commit observed; the response carries the committed event.
    Committed,
    /// Accepted but the commit has not been observed yet; poll for it.
    Accepted,
    /// Transient overload; retrying with the same request id is safe.
    Backpressure,
    /// Permanently refused (malformed request, policy denial).
    Rejected,
}

/// Submission response carrying the committed event when available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResponse {
    pub request_id: String,
    pub status: SubmitStatus,
    pub event: Option<Event>,
    pub status_reason: Option<String>,
}

/// Transport trait representing the underlying submission RPC stub.
pub trait SubmitTransport {
    fn send(&mut self, request: SubmitRequest) -> Result<SubmitResponse, TransportError>;

    /// Checks whether a previously accepted submission has committed.
    fn poll_commit(&mut self, request_id: &str) -> Result<Option<Event>, TransportError>;
}

impl SubmitTransport for Box<dyn SubmitTransport> {
    fn send(&mut self, request: SubmitRequest) -> Result<SubmitResponse, TransportError> {
        (**self).send(request)
    }

    fn poll_commit(&mut self, request_id: &str) -> Result<Option<Event>, TransportError> {
        (**self).poll_commit(request_id)
    }
}

/// Transport-level error returned when the RPC itself fails.
#[derive(Debug, Clone)]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {}

/// Client-side submission errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// Failed fast before any transport call: no actor identity.
    #[error(transparent)]
    IdentityUnavailable(#[from] IdentityError),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("submission {request_id} failed after {attempts} attempts (reason: {reason:?})")]
    Exhausted {
        request_id: String,
        attempts: usize,
        reason: Option<String>,
    },
    /// The commit was not observed within the bound. Outcome unknown: the
    /// mutation may still commit after the caller stops waiting, and a
    /// retry issues a new, independently ordered event.
    #[error("submission {request_id} outcome unknown after {waited_ms} ms")]
    Timeout { request_id: String, waited_ms: u64 },
}

/// Retry and await bounds for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOptions {
    pub max_retries: usize,
    pub commit_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            commit_timeout: Duration::from_millis(2_000),
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Handle for a submission whose commit has not been observed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission {
    pub request_id: String,
    pub operation: OperationKind,
    pub actor: ActorId,
}

/// Submission client that validates identity up front, retries backpressure
/// with a stable request id, and awaits commit confirmation with a bounded
/// timeout.
pub struct SubmitClient<T: SubmitTransport> {
    transport: T,
    next_request_serial: u64,
    telemetry: SubmitTelemetry,
}

impl<T: SubmitTransport> SubmitClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_request_serial: 1,
            telemetry: SubmitTelemetry::default(),
        }
    }

    /// Recorded telemetry, including per-attempt spans and structured logs.
    pub fn telemetry(&self) -> &SubmitTelemetry {
        &self.telemetry
    }

    /// Submits a mutation, retrying transient backpressure. Returns the
    /// pending handle plus the committed event when the endpoint commits
    /// synchronously.
    pub fn submit(
        &mut self,
        operation: OperationKind,
        actor: Option<ActorId>,
        options: SubmitOptions,
    ) -> Result<(PendingSubmission, Option<Event>), SubmitError> {
        let actor = actor.ok_or(IdentityError::Unavailable)?;
        let request_id = self.allocate_request_id(operation);
        let mut attempts = 0usize;
        loop {
            let request = SubmitRequest {
                request_id: request_id.clone(),
                operation,
                actor: actor.clone(),
            };
            self.telemetry.record_log(SubmitLog {
                request_id: request_id.clone(),
                attempt: attempts + 1,
                message: "submit_attempt_start".into(),
            });
            let start = Instant::now();
            let response = self
                .transport
                .send(request)
                .map_err(|err| SubmitError::Transport(err.to_string()))?;
            self.telemetry.record_span(SubmitSpan {
                request_id: response.request_id.clone(),
                attempt: attempts + 1,
                duration_ms: start.elapsed().as_millis() as u64,
                status: response.status,
                status_reason: response.status_reason.clone(),
            });
            if attempts > 0 {
                self.telemetry.metrics.submit_retry_total += 1;
            }
            let handle = PendingSubmission {
                request_id: request_id.clone(),
                operation,
                actor: actor.clone(),
            };
            match response.status {
                SubmitStatus::Committed => return Ok((handle, response.event)),
                SubmitStatus::Accepted => return Ok((handle, None)),
                SubmitStatus::Backpressure if attempts < options.max_retries => {
                    attempts += 1;
                    continue;
                }
                _ => {
                    self.telemetry.metrics.reject_total += 1;
                    return Err(SubmitError::Exhausted {
                        request_id,
                        attempts: attempts + 1,
                        reason: response.status_reason,
                    });
                }
            }
        }
    }

    /// Blocks until the submission's commit is observed or the bound lapses.
    /// A timeout means the outcome is unknown, not that the mutation failed;
    /// abandoning the wait does not prevent the commit.
    pub fn await_commit(
        &mut self,
        pending: &PendingSubmission,
        options: SubmitOptions,
    ) -> Result<Event, SubmitError> {
        let start = Instant::now();
        loop {
            match self
                .transport
                .poll_commit(&pending.request_id)
                .map_err(|err| SubmitError::Transport(err.to_string()))?
            {
                Some(event) => return Ok(event),
                None => {
                    if start.elapsed() >= options.commit_timeout {
                        self.telemetry.metrics.timeout_total += 1;
                        return Err(SubmitError::Timeout {
                            request_id: pending.request_id.clone(),
                            waited_ms: start.elapsed().as_millis() as u64,
                        });
                    }
                    thread::sleep(options.poll_interval);
                }
            }
        }
    }

    /// Convenience path: submit and wait for the commit in one call.
    pub fn submit_and_await(
        &mut self,
        operation: OperationKind,
        actor: Option<ActorId>,
        options: SubmitOptions,
    ) -> Result<Event, SubmitError> {
        let (pending, committed) = self.submit(operation, actor, options)?;
        match committed {
            Some(event) => Ok(event),
            None => self.await_commit(&pending, options),
        }
    }

    fn allocate_request_id(&mut self, operation: OperationKind) -> String {
        let serial = self.next_request_serial;
        self.next_request_serial += 1;
        format!("{}-{serial}", operation.as_str())
    }
}

/// Aggregated client telemetry.
#[derive(Debug, Default, Clone)]
pub struct SubmitTelemetry {
    spans: Vec<SubmitSpan>,
    logs: Vec<SubmitLog>,
    metrics: SubmitMetrics,
}

impl SubmitTelemetry {
    pub fn spans(&self) -> &[SubmitSpan] {
        &self.spans
    }

    pub fn logs(&self) -> &[SubmitLog] {
        &self.logs
    }

    pub fn metrics(&self) -> &SubmitMetrics {
        &self.metrics
    }

    fn record_span(&mut self, span: SubmitSpan) {
        self.spans.push(span);
    }

    fn record_log(&mut self, log: SubmitLog) {
        self.logs.push(log);
    }

    /// Renders client metrics as Prometheus exposition text.
    pub fn render_metrics(&self) -> String {
        format!(
            "tally_submit_retry_total {}\ntally_submit_reject_total {}\ntally_submit_timeout_total {}\n",
            self.metrics.submit_retry_total,
            self.metrics.reject_total,
            self.metrics.timeout_total
        )
    }
}

/// Per-attempt span around a submission RPC.
#[derive(Debug, Clone)]
pub struct SubmitSpan {
    pub request_id: String,
    pub attempt: usize,
    pub duration_ms: u64,
    pub status: SubmitStatus,
    pub status_reason: Option<String>,
}

/// Structured log emitted around the submission hot-path.
#[derive(Debug, Clone)]
pub struct SubmitLog {
    pub request_id: String,
    pub attempt: usize,
    pub message: String,
}

/// Counters exposed via `/metrics`.
#[derive(Debug, Default, Clone)]
pub struct SubmitMetrics {
    pub submit_retry_total: u64,
    pub reject_total: u64,
    pub timeout_total: u64,
}
