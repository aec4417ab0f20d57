use tally::{ActorId, CounterEngine, EngineError, EventKind, ManualClock, ResetPolicy};

fn actor(name: &str) -> ActorId {
    ActorId::new(name).unwrap()
}

#[test]
fn increment_and_decrement_apply_unit_deltas() {
    let mut engine = CounterEngine::new(0);
    let up = engine.increment(actor("alice")).unwrap();
    assert_eq!(up.kind, EventKind::Incremented);
    assert_eq!(up.resulting_value, 1);
    assert_eq!(engine.read(), 1);

    let down = engine.decrement(actor("bob")).unwrap();
    assert_eq!(down.kind, EventKind::Decremented);
    assert_eq!(down.resulting_value, 0);
    assert_eq!(engine.read(), 0);
}

#[test]
fn decrement_from_zero_goes_negative() {
    let mut engine = CounterEngine::new(0);
    let event = engine.decrement(actor("alice")).unwrap();
    assert_eq!(event.resulting_value, -1);
    assert_eq!(engine.read(), -1);
}

#[test]
fn sequence_numbers_are_dense_and_start_at_one() {
    let mut engine = CounterEngine::new(0);
    let sequences: Vec<u64> = (0..5)
        .map(|_| engine.increment(actor("alice")).unwrap().sequence_number)
        .collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
    assert_eq!(engine.next_sequence(), 6);
}

#[test]
fn reset_is_open_to_any_actor_by_default() {
    let mut engine = CounterEngine::new(0);
    for _ in 0..3 {
        engine.increment(actor("alice")).unwrap();
    }
    // A stranger may zero the accumulated count under the open policy.
    let event = engine.reset(actor("mallory")).unwrap();
    assert_eq!(event.kind, EventKind::Reset);
    assert_eq!(event.resulting_value, 0);
    assert_eq!(engine.read(), 0);
}

#[test]
fn restricted_reset_policy_rejects_foreign_actor() {
    let policy = ResetPolicy::RestrictedTo {
        actor: actor("ops"),
    };
    let mut engine = CounterEngine::with_clock(7, policy, ManualClock::new(0));
    let err = engine.reset(actor("mallory")).unwrap_err();
    assert_eq!(
        err,
        EngineError::ResetDenied {
            actor: actor("mallory")
        }
    );
    assert_eq!(engine.read(), 7);

    engine.reset(actor("ops")).unwrap();
    assert_eq!(engine.read(), 0);
}

#[test]
fn overflow_fails_deterministically_without_emitting() {
    let mut engine = CounterEngine::with_clock(i64::MAX, ResetPolicy::Open, ManualClock::new(0));
    let err = engine.increment(actor("alice")).unwrap_err();
    assert_eq!(
        err,
        EngineError::Overflow {
            op: "increment",
            value: i64::MAX
        }
    );
    assert_eq!(engine.read(), i64::MAX);
    assert_eq!(engine.next_sequence(), 1);

    let mut engine = CounterEngine::with_clock(i64::MIN, ResetPolicy::Open, ManualClock::new(0));
    let err = engine.decrement(actor("alice")).unwrap_err();
    assert_eq!(
        err,
        EngineError::Overflow {
            op: "decrement",
            value: i64::MIN
        }
    );
    assert_eq!(engine.next_sequence(), 1);
}

#[test]
fn events_carry_injected_clock_timestamps() {
    let mut clock = ManualClock::new(100);
    clock.advance_ms(50);
    let mut engine = CounterEngine::with_clock(0, ResetPolicy::Open, clock);
    let event = engine.increment(actor("alice")).unwrap();
    assert_eq!(event.timestamp_ms, 150);
    assert_eq!(event.actor, actor("alice"));
}
