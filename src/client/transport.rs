use crate::client::core::{
    OperationKind, SubmitRequest, SubmitResponse, SubmitStatus, SubmitTransport, TransportError,
};
use crate::engine::CounterEngine;
use crate::event::{ActorId, Event};
use crate::ledger::EventLedger;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const SUBMIT_PATH: &str = "/v1/submit";
const COMMIT_PATH: &str = "/v1/commit";

/// Blocking HTTP transport that forwards submissions to a remote engine
/// endpoint and translates the response into the client contract.
#[derive(Debug, Clone)]
pub struct HttpSubmitTransport {
    client: Client,
    endpoint: String,
}

impl HttpSubmitTransport {
    /// Creates a transport targeting the provided base endpoint (e.g.
    /// `https://tally.internal:8443`).
    pub fn new(endpoint: impl Into<String>) -> Result<Self, TransportError> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(TransportError::new("submit endpoint must not be empty"));
        }
        let client = Client::builder()
            .build()
            .map_err(|err| TransportError::new(format!("http client build failed: {err}")))?;
        Ok(Self { client, endpoint })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }
}

impl SubmitTransport for HttpSubmitTransport {
    fn send(&mut self, request: SubmitRequest) -> Result<SubmitResponse, TransportError> {
        let wire_request = WireSubmitRequest::from(request);
        let response = self
            .client
            .post(self.url(SUBMIT_PATH))
            .json(&wire_request)
            .send()
            .map_err(|err| TransportError::new(format!("submit rpc failed: {err}")))?;
        if !response.status().is_success() {
            return Err(TransportError::new(format!(
                "submit rpc returned status {}",
                response.status()
            )));
        }
        let wire: WireSubmitResponse = response
            .json()
            .map_err(|err| TransportError::new(format!("submit rpc decode failed: {err}")))?;
        Ok(wire.into())
    }

    fn poll_commit(&mut self, request_id: &str) -> Result<Option<Event>, TransportError> {
        let response = self
            .client
            .get(self.url(COMMIT_PATH))
            .query(&[("request_id", request_id)])
            .send()
            .map_err(|err| TransportError::new(format!("commit poll failed: {err}")))?;
        if !response.status().is_success() {
            return Err(TransportError::new(format!(
                "commit poll returned status {}",
                response.status()
            )));
        }
        let wire: WireCommitResponse = response
            .json()
            .map_err(|err| TransportError::new(format!("commit poll decode failed: {err}")))?;
        Ok(wire.event)
    }
}

#[derive(Debug, Serialize)]
struct WireSubmitRequest {
    request_id: String,
    operation: OperationKind,
    actor: ActorId,
}

impl From<SubmitRequest> for WireSubmitRequest {
    fn from(request: SubmitRequest) -> Self {
        Self {
            request_id: request.request_id,
            operation: request.operation,
            actor: request.actor,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireSubmitResponse {
    request_id: String,
    status: SubmitStatus,
    #[serde(default)]
    event: Option<Event>,
    #[serde(default)]
    status_reason: Option<String>,
}

impl From<WireSubmitResponse> for SubmitResponse {
    fn from(wire: WireSubmitResponse) -> Self {
        Self {
            request_id: wire.request_id,
            status: wire.status,
            event: wire.event,
            status_reason: wire.status_reason,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireCommitResponse {
    #[serde(default)]
    event: Option<Event>,
}

/// Engine plus ledger behind one lock, shared between the loopback transport
/// and the rest of the process. Appending inside the same critical section
/// that commits the mutation keeps the ledger gapless.
pub struct LoopbackState {
    pub engine: CounterEngine,
    pub ledger: EventLedger,
}

impl LoopbackState {
    pub fn new(initial_value: i64) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            engine: CounterEngine::new(initial_value),
            ledger: EventLedger::new(),
        }))
    }
}

/// In-process transport committing submissions straight against a shared
/// engine and ledger. Backpressure and deferred commits are scriptable so
/// tests can drive the retry and timeout paths.
pub struct LoopbackTransport {
    shared: Arc<Mutex<LoopbackState>>,
    backpressure_remaining: usize,
    defer_commit_polls: usize,
    pending: HashMap<String, DeferredCommit>,
}

struct DeferredCommit {
    operation: OperationKind,
    actor: ActorId,
    polls_remaining: usize,
    committed: Option<Event>,
}

impl LoopbackTransport {
    pub fn new(shared: Arc<Mutex<LoopbackState>>) -> Self {
        Self {
            shared,
            backpressure_remaining: 0,
            defer_commit_polls: 0,
            pending: HashMap::new(),
        }
    }

    /// Responds `Backpressure` to the next `count` sends.
    pub fn with_backpressure(mut self, count: usize) -> Self {
        self.backpressure_remaining = count;
        self
    }

    /// Defers every commit until `polls` poll-commit calls have been made,
    /// modeling a commit that lands after the caller may have stopped
    /// waiting.
    pub fn with_deferred_commits(mut self, polls: usize) -> Self {
        self.defer_commit_polls = polls;
        self
    }

    fn commit(&mut self, operation: OperationKind, actor: ActorId) -> Result<Event, String> {
        let mut shared = self
            .shared
            .lock()
            .map_err(|_| "loopback state poisoned".to_string())?;
        let result = match operation {
            OperationKind::Increment => shared.engine.increment(actor),
            OperationKind::Decrement => shared.engine.decrement(actor),
            OperationKind::Reset => shared.engine.reset(actor),
        };
        let event = result.map_err(|err| err.to_string())?;
        shared
            .ledger
            .append(event.clone())
            .map_err(|err| err.to_string())?;
        Ok(event)
    }
}

impl SubmitTransport for LoopbackTransport {
    fn send(&mut self, request: SubmitRequest) -> Result<SubmitResponse, TransportError> {
        if self.backpressure_remaining > 0 {
            self.backpressure_remaining -= 1;
            return Ok(SubmitResponse {
                request_id: request.request_id,
                status: SubmitStatus::Backpressure,
                event: None,
                status_reason: Some("loopback_backpressure".into()),
            });
        }
        if self.defer_commit_polls > 0 {
            self.pending.insert(
                request.request_id.clone(),
                DeferredCommit {
                    operation: request.operation,
                    actor: request.actor,
                    polls_remaining: self.defer_commit_polls,
                    committed: None,
                },
            );
            return Ok(SubmitResponse {
                request_id: request.request_id,
                status: SubmitStatus::Accepted,
                event: None,
                status_reason: None,
            });
        }
        match self.commit(request.operation, request.actor) {
            Ok(event) => Ok(SubmitResponse {
                request_id: request.request_id,
                status: SubmitStatus::Committed,
                event: Some(event),
                status_reason: None,
            }),
            Err(reason) => Ok(SubmitResponse {
                request_id: request.request_id,
                status: SubmitStatus::Rejected,
                event: None,
                status_reason: Some(reason),
            }),
        }
    }

    fn poll_commit(&mut self, request_id: &str) -> Result<Option<Event>, TransportError> {
        let (operation, actor) = match self.pending.get_mut(request_id) {
            None => return Ok(None),
            Some(deferred) => {
                if let Some(event) = &deferred.committed {
                    return Ok(Some(event.clone()));
                }
                if deferred.polls_remaining > 1 {
                    deferred.polls_remaining -= 1;
                    return Ok(None);
                }
                (deferred.operation, deferred.actor.clone())
            }
        };
        let event = self
            .commit(operation, actor)
            .map_err(TransportError::new)?;
        if let Some(deferred) = self.pending.get_mut(request_id) {
            deferred.polls_remaining = 0;
            deferred.committed = Some(event.clone());
        }
        Ok(Some(event))
    }
}
