use tally::{ActorId, Event, EventKind, EventLedger, LedgerError, LedgerSnapshot};

fn event(sequence_number: u64, kind: EventKind, resulting_value: i64) -> Event {
    Event {
        sequence_number,
        kind,
        resulting_value,
        actor: ActorId::new("alice").unwrap(),
        timestamp_ms: sequence_number * 10,
    }
}

#[test]
fn append_requires_contiguous_sequence() {
    let mut ledger = EventLedger::new();
    ledger.append(event(1, EventKind::Incremented, 1)).unwrap();

    let err = ledger.append(event(3, EventKind::Incremented, 2)).unwrap_err();
    assert_eq!(
        err,
        LedgerError::NonContiguous {
            expected: 2,
            found: 3
        }
    );
    // Duplicate appends are also non-contiguous at the ledger level.
    let err = ledger.append(event(1, EventKind::Incremented, 1)).unwrap_err();
    assert_eq!(
        err,
        LedgerError::NonContiguous {
            expected: 2,
            found: 1
        }
    );
    assert_eq!(ledger.last_sequence(), 1);
    assert_eq!(ledger.len(), 1);
}

#[test]
fn cursor_drains_committed_events_and_survives_appends() {
    let mut ledger = EventLedger::new();
    ledger.append(event(1, EventKind::Incremented, 1)).unwrap();
    ledger.append(event(2, EventKind::Incremented, 2)).unwrap();

    let mut cursor = ledger.subscribe(1);
    let batch: Vec<u64> = cursor
        .next_batch(&ledger)
        .iter()
        .map(|e| e.sequence_number)
        .collect();
    assert_eq!(batch, vec![1, 2]);
    assert!(cursor.next_batch(&ledger).is_empty());

    ledger.append(event(3, EventKind::Decremented, 1)).unwrap();
    let batch: Vec<u64> = cursor
        .next_batch(&ledger)
        .iter()
        .map(|e| e.sequence_number)
        .collect();
    assert_eq!(batch, vec![3]);
}

#[test]
fn cursor_restarts_from_any_sequence_number() {
    let mut ledger = EventLedger::new();
    for seq in 1..=5 {
        ledger
            .append(event(seq, EventKind::Incremented, seq as i64))
            .unwrap();
    }
    let mut cursor = ledger.subscribe(4);
    let batch: Vec<u64> = cursor
        .next_batch(&ledger)
        .iter()
        .map(|e| e.sequence_number)
        .collect();
    assert_eq!(batch, vec![4, 5]);

    // From-zero subscriptions are clamped to the start of the stream.
    let mut from_start = ledger.subscribe(0);
    assert_eq!(from_start.position(), 1);
    assert_eq!(from_start.next_batch(&ledger).len(), 5);
}

#[test]
fn snapshot_round_trips_through_json() {
    let mut ledger = EventLedger::new();
    ledger.append(event(1, EventKind::Incremented, 1)).unwrap();
    ledger.append(event(2, EventKind::Reset, 0)).unwrap();

    let payload = ledger.snapshot().to_json().unwrap();
    let snapshot = LedgerSnapshot::from_json(&payload).unwrap();
    let restored = EventLedger::restore(snapshot).unwrap();
    assert_eq!(restored.history(), ledger.history());
    assert_eq!(restored.last_sequence(), 2);
}

#[test]
fn restore_rejects_gapped_snapshot() {
    let payload = serde_json::json!({
        "events": [
            {
                "sequence_number": 1,
                "kind": "Incremented",
                "resulting_value": 1,
                "actor": "alice",
                "timestamp_ms": 10
            },
            {
                "sequence_number": 3,
                "kind": "Incremented",
                "resulting_value": 2,
                "actor": "alice",
                "timestamp_ms": 30
            }
        ]
    })
    .to_string();
    let snapshot = LedgerSnapshot::from_json(&payload).unwrap();
    let err = EventLedger::restore(snapshot).unwrap_err();
    assert_eq!(
        err,
        LedgerError::NonContiguous {
            expected: 2,
            found: 3
        }
    );
}
