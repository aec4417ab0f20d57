use crate::event::Event;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the append path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// An event arrived whose sequence number does not extend the ledger by
    /// exactly one.
    #[error("non-contiguous append: expected sequence {expected}, got {found}")]
    NonContiguous { expected: u64, found: u64 },
}

/// Append-only, totally ordered store of committed events. The ledger never
/// rewrites or drops an entry; `sequence_number` is dense starting at 1.
#[derive(Debug, Default, Clone)]
pub struct EventLedger {
    events: Vec<Event>,
}

impl EventLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a committed event, enforcing contiguity.
    pub fn append(&mut self, event: Event) -> Result<(), LedgerError> {
        let expected = self.last_sequence() + 1;
        if event.sequence_number != expected {
            return Err(LedgerError::NonContiguous {
                expected,
                found: event.sequence_number,
            });
        }
        self.events.push(event);
        Ok(())
    }

    /// Highest committed sequence number, 0 when empty.
    pub fn last_sequence(&self) -> u64 {
        self.events.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    /// Full ordered history, for audit and display.
    pub fn history(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Opens a restartable cursor over the stream beginning at
    /// `from_sequence` (inclusive). The cursor survives later appends; each
    /// `next_batch` call drains whatever has committed since the last call.
    pub fn subscribe(&self, from_sequence: u64) -> LedgerCursor {
        LedgerCursor {
            next_sequence: from_sequence.max(1),
        }
    }

    /// Snapshot of the durable record layout, for recovery and replay.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            events: self.events.clone(),
        }
    }

    /// Restores a ledger from a snapshot, re-validating contiguity.
    pub fn restore(snapshot: LedgerSnapshot) -> Result<Self, LedgerError> {
        let mut ledger = Self::new();
        for event in snapshot.events {
            ledger.append(event)?;
        }
        Ok(ledger)
    }
}

/// Position-only subscription handle. Holding no ledger reference keeps the
/// cursor restartable from any sequence number and valid across appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerCursor {
    next_sequence: u64,
}

impl LedgerCursor {
    /// Sequence number the next drained event will carry.
    pub fn position(&self) -> u64 {
        self.next_sequence
    }

    /// Drains every event committed at or past the cursor position,
    /// advancing the cursor past what was returned. Empty when the cursor
    /// has caught up.
    pub fn next_batch<'a>(&mut self, ledger: &'a EventLedger) -> &'a [Event] {
        let start = (self.next_sequence - 1) as usize;
        if start >= ledger.events.len() {
            return &[];
        }
        let batch = &ledger.events[start..];
        self.next_sequence = ledger.last_sequence() + 1;
        batch
    }
}

/// Persisted ledger snapshot, serialized as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    events: Vec<Event>,
}

impl LedgerSnapshot {
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Serializes the snapshot to JSON for storage.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Restores a snapshot from JSON.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}
