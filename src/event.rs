use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use thiserror::Error;

/// Kind of a committed counter mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    Incremented,
    Decremented,
    Reset,
}

impl EventKind {
    /// Canonical lowercase name used in logs and wire payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Incremented => "incremented",
            EventKind::Decremented => "decremented",
            EventKind::Reset => "reset",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity attributed to a mutation request. Always non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActorId(String);

impl ActorId {
    /// Validates and wraps an identity string.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdentityError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(IdentityError::Unavailable);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ActorId {
    type Error = IdentityError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<ActorId> for String {
    fn from(actor: ActorId) -> Self {
        actor.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raised when a mutation is attempted without a usable actor identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("no actor identity available for this mutation")]
    Unavailable,
}

/// Immutable record of one committed mutation. This is also the durable
/// per-event record layout: append-only, ordered by `sequence_number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Total-order position assigned by the engine at emission, starting at 1.
    pub sequence_number: u64,
    pub kind: EventKind,
    /// Post-mutation snapshot of the counter value.
    pub resulting_value: i64,
    pub actor: ActorId,
    /// Engine-local tick at 1 ms granularity.
    pub timestamp_ms: u64,
}

/// Monotonic time source injected into the engine so timestamps are
/// deterministic under test.
pub trait MonotonicClock {
    /// Current monotonic tick in milliseconds.
    fn now_ms(&mut self) -> u64;
}

/// System clock backed by `Instant`.
#[derive(Clone)]
pub struct SystemMonotonicClock {
    start: Instant,
}

impl Default for SystemMonotonicClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl SystemMonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MonotonicClock for SystemMonotonicClock {
    fn now_ms(&mut self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Hand-advanced clock for tests.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now_ms: u64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self { now_ms }
    }

    pub fn advance_ms(&mut self, delta: u64) {
        self.now_ms = self.now_ms.saturating_add(delta);
    }
}

impl MonotonicClock for ManualClock {
    fn now_ms(&mut self) -> u64 {
        self.now_ms
    }
}
