use crate::event::{ActorId, Event, EventKind, MonotonicClock, SystemMonotonicClock};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access-control policy applied to `reset`. `Open` is the default: any
/// caller may zero the counter. `RestrictedTo` is the opt-in tightening for
/// deployments that consider an open reset a policy gap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ResetPolicy {
    #[default]
    Open,
    RestrictedTo {
        actor: ActorId,
    },
}

impl ResetPolicy {
    fn permits(&self, actor: &ActorId) -> bool {
        match self {
            ResetPolicy::Open => true,
            ResetPolicy::RestrictedTo { actor: allowed } => allowed == actor,
        }
    }
}

/// Errors surfaced by the mutation path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The counter sits at an `i64` bound; the mutation emits no event and
    /// advances no sequence number.
    #[error("counter overflow: {op} from {value} exceeds the i64 range")]
    Overflow { op: &'static str, value: i64 },
    /// Reset denied under `ResetPolicy::RestrictedTo`.
    #[error("reset denied for actor '{actor}'")]
    ResetDenied { actor: ActorId },
}

/// Authoritative counter state. Owns the value and the sequence cursor; both
/// are mutated only through the three operations below. `&mut self`
/// receivers serialize the read-modify-write path; shared deployments wrap
/// the engine in a mutex.
pub struct CounterEngine<C: MonotonicClock = SystemMonotonicClock> {
    value: i64,
    next_sequence: u64,
    reset_policy: ResetPolicy,
    clock: C,
}

impl CounterEngine<SystemMonotonicClock> {
    /// Engine starting at the given value with the open reset policy.
    pub fn new(initial_value: i64) -> Self {
        Self::with_clock(initial_value, ResetPolicy::Open, SystemMonotonicClock::new())
    }
}

impl<C: MonotonicClock> CounterEngine<C> {
    /// Engine with an explicit reset policy and injected clock.
    pub fn with_clock(initial_value: i64, reset_policy: ResetPolicy, clock: C) -> Self {
        Self {
            value: initial_value,
            next_sequence: 1,
            reset_policy,
            clock,
        }
    }

    /// Current authoritative value. Never fails, no side effect.
    pub fn read(&self) -> i64 {
        self.value
    }

    /// Sequence number the next committed mutation will carry.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Adds 1 unconditionally.
    pub fn increment(&mut self, actor: ActorId) -> Result<Event, EngineError> {
        let next = self.value.checked_add(1).ok_or(EngineError::Overflow {
            op: "increment",
            value: self.value,
        })?;
        Ok(self.commit(EventKind::Incremented, next, actor))
    }

    /// Subtracts 1 unconditionally. Negative values are valid; the counter is
    /// a free-running signed value, never clamped at zero.
    pub fn decrement(&mut self, actor: ActorId) -> Result<Event, EngineError> {
        let next = self.value.checked_sub(1).ok_or(EngineError::Overflow {
            op: "decrement",
            value: self.value,
        })?;
        Ok(self.commit(EventKind::Decremented, next, actor))
    }

    /// Sets the value to 0 regardless of its current value, subject only to
    /// the configured reset policy.
    pub fn reset(&mut self, actor: ActorId) -> Result<Event, EngineError> {
        if !self.reset_policy.permits(&actor) {
            return Err(EngineError::ResetDenied { actor });
        }
        Ok(self.commit(EventKind::Reset, 0, actor))
    }

    fn commit(&mut self, kind: EventKind, next_value: i64, actor: ActorId) -> Event {
        self.value = next_value;
        let sequence_number = self.next_sequence;
        self.next_sequence += 1;
        Event {
            sequence_number,
            kind,
            resulting_value: next_value,
            actor,
            timestamp_ms: self.clock.now_ms(),
        }
    }
}
