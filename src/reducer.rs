use crate::event::{Event, EventKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Result of feeding one event into the reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The event's sequence number was already consumed; the read model is
    /// untouched. Duplicates are expected from an at-least-once observer and
    /// are never an error.
    DuplicateIgnored,
}

/// Errors surfaced while folding the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReduceError {
    /// A sequence number was skipped. Not locally recoverable: the caller
    /// must rebuild from the full history rather than advance past the hole.
    #[error("sequence gap: expected {expected}, got {found}")]
    SequenceGap { expected: u64, found: u64 },
}

/// Read model derived purely by folding the event ledger. Rebuildable from
/// scratch at any time; owns no authoritative state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedReadModel {
    last_value: i64,
    last_sequence: u64,
    event_count: u64,
    events_by_kind: BTreeMap<EventKind, u64>,
}

impl DerivedReadModel {
    /// Empty model anchored at the initial counter value.
    pub fn new(initial_value: i64) -> Self {
        Self {
            last_value: initial_value,
            last_sequence: 0,
            event_count: 0,
            events_by_kind: BTreeMap::new(),
        }
    }

    /// `resulting_value` of the highest-sequence event consumed, or the
    /// initial value when nothing has been consumed yet.
    pub fn last_value(&self) -> i64 {
        self.last_value
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn count_for(&self, kind: EventKind) -> u64 {
        self.events_by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn events_by_kind(&self) -> &BTreeMap<EventKind, u64> {
        &self.events_by_kind
    }
}

/// Per-reducer counters for observability.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReducerStats {
    pub applied_total: u64,
    pub duplicates_ignored_total: u64,
    pub gaps_detected_total: u64,
}

/// Folds the ordered event stream into a [`DerivedReadModel`]. Because every
/// event carries a `resulting_value` snapshot the reducer re-derives no
/// arithmetic; it only enforces ordering.
#[derive(Debug, Clone)]
pub struct LedgerReducer {
    model: DerivedReadModel,
    initial_value: i64,
    stats: ReducerStats,
}

impl LedgerReducer {
    pub fn new(initial_value: i64) -> Self {
        Self {
            model: DerivedReadModel::new(initial_value),
            initial_value,
            stats: ReducerStats::default(),
        }
    }

    pub fn model(&self) -> &DerivedReadModel {
        &self.model
    }

    pub fn stats(&self) -> ReducerStats {
        self.stats
    }

    /// Consumes one event. Exactly-next sequence numbers apply; replays of
    /// already-consumed sequence numbers are idempotently ignored; anything
    /// further ahead is a gap and leaves the model untouched.
    pub fn apply(&mut self, event: &Event) -> Result<ApplyOutcome, ReduceError> {
        let expected = self.model.last_sequence + 1;
        if event.sequence_number <= self.model.last_sequence {
            self.stats.duplicates_ignored_total += 1;
            return Ok(ApplyOutcome::DuplicateIgnored);
        }
        if event.sequence_number != expected {
            self.stats.gaps_detected_total += 1;
            return Err(ReduceError::SequenceGap {
                expected,
                found: event.sequence_number,
            });
        }
        self.model.last_value = event.resulting_value;
        self.model.last_sequence = event.sequence_number;
        self.model.event_count += 1;
        *self.model.events_by_kind.entry(event.kind).or_insert(0) += 1;
        self.stats.applied_total += 1;
        Ok(ApplyOutcome::Applied)
    }

    /// Replays a full ordered history from sequence 1, replacing the current
    /// model. This is the recovery path after a [`ReduceError::SequenceGap`]
    /// and the correctness oracle for incremental `apply`.
    pub fn rebuild(&mut self, history: &[Event]) -> Result<&DerivedReadModel, ReduceError> {
        let mut fresh = DerivedReadModel::new(self.initial_value);
        for event in history {
            let expected = fresh.last_sequence + 1;
            if event.sequence_number != expected {
                return Err(ReduceError::SequenceGap {
                    expected,
                    found: event.sequence_number,
                });
            }
            fresh.last_value = event.resulting_value;
            fresh.last_sequence = event.sequence_number;
            fresh.event_count += 1;
            *fresh.events_by_kind.entry(event.kind).or_insert(0) += 1;
        }
        self.model = fresh;
        Ok(&self.model)
    }
}
