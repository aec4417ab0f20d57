use tally::{
    ActivityLog, ActorId, Event, EventKind, LedgerReducer, LiveCount, LiveCountSource, LogLevel,
    QueryFacade, TallyMetrics, UnreachableEngine,
};

fn committed_event(sequence: u64, value: i64) -> Event {
    Event {
        sequence_number: sequence,
        kind: EventKind::Incremented,
        resulting_value: value,
        actor: ActorId::new("alice").unwrap(),
        timestamp_ms: sequence * 10,
    }
}

#[test]
fn records_below_the_level_are_dropped() {
    let mut log = ActivityLog::new(16);
    log.set_level(LogLevel::Warn);

    log.record(1, LogLevel::Info, "reducer", "applied").unwrap();
    log.record(2, LogLevel::Warn, "reducer", "gap detected").unwrap();
    log.record(3, LogLevel::Error, "facade", "engine unreachable").unwrap();

    assert_eq!(log.len(), 2);
    let lines: Vec<&str> = log.lines().collect();
    assert!(lines[0].contains("gap detected"));
    assert!(lines[1].contains("engine unreachable"));
}

#[test]
fn plain_records_serialize_expected_fields() {
    let mut log = ActivityLog::new(16);
    log.record(42, LogLevel::Info, "engine", "committed").unwrap();

    let record: serde_json::Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
    assert_eq!(record["ts"], 42);
    assert_eq!(record["level"], "INFO");
    assert_eq!(record["component"], "engine");
    assert_eq!(record["message"], "committed");
    // No ledger correlation on plain records.
    assert!(record.get("ledger").is_none());
    assert!(record.get("actor").is_none());
}

#[test]
fn event_records_embed_ledger_reference_and_actor() {
    let mut log = ActivityLog::new(16);
    let event = committed_event(7, 7);
    log.record_event(70, LogLevel::Info, "app", &event, "committed")
        .unwrap();

    let record: serde_json::Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
    assert_eq!(record["ledger"]["sequence"], 7);
    assert_eq!(record["ledger"]["kind"], "Incremented");
    assert_eq!(record["ledger"]["resulting_value"], 7);
    assert_eq!(record["actor"], "alice");
}

#[test]
fn retention_cap_evicts_oldest_lines() {
    let mut log = ActivityLog::new(3);
    for sequence in 1..=5 {
        let event = committed_event(sequence, sequence as i64);
        log.record_event(sequence, LogLevel::Info, "app", &event, "committed")
            .unwrap();
    }

    assert_eq!(log.len(), 3);
    assert_eq!(log.evicted(), 2);
    // The oldest surviving line is sequence 3.
    let first: serde_json::Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
    assert_eq!(first["ledger"]["sequence"], 3);
}

struct DownSource;

impl LiveCountSource for DownSource {
    fn read(&mut self) -> Result<LiveCount, UnreachableEngine> {
        Err(UnreachableEngine::new("down"))
    }
}

#[test]
fn metrics_aggregate_reducer_and_facade_counters() {
    let mut reducer = LedgerReducer::new(0);
    let event = committed_event(1, 1);
    reducer.apply(&event).unwrap();
    reducer.apply(&event).unwrap();

    let mut facade = QueryFacade::new(DownSource);
    let answer = facade.query(reducer.model());

    let mut metrics = TallyMetrics::default();
    metrics.absorb_reducer(reducer.stats());
    metrics.record_answer(&answer);

    assert_eq!(metrics.events_applied_total, 1);
    assert_eq!(metrics.duplicates_ignored_total, 1);
    assert_eq!(metrics.stale_answers_served_total, 1);

    let rendered = metrics.render();
    assert!(rendered.contains("tally_events_applied_total 1"));
    assert!(rendered.contains("tally_duplicates_ignored_total 1"));
    assert!(rendered.contains("tally_stale_answers_served_total 1"));
}
