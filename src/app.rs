use crate::client::{
    HttpSubmitTransport, LoopbackState, LoopbackTransport, OperationKind, SubmitClient,
    SubmitTransport,
};
use crate::config::TallyConfig;
use crate::event::ActorId;
use crate::facade::{LiveCount, LiveCountSource, QueryFacade, RefreshTask, UnreachableEngine};
use crate::observability::{ActivityLog, LogLevel, TallyMetrics};
use crate::reducer::LedgerReducer;
use anyhow::{Context, Result};
use std::env;
use std::sync::{Arc, Mutex};

const LOG_RETENTION_LINES: usize = 1_024;

/// Live source backed by the in-process engine. A poisoned lock reads as an
/// unreachable engine rather than a panic, which exercises the façade's
/// fallback path.
struct SharedLiveSource {
    shared: Arc<Mutex<LoopbackState>>,
}

impl LiveCountSource for SharedLiveSource {
    fn read(&mut self) -> Result<LiveCount, UnreachableEngine> {
        let shared = self
            .shared
            .lock()
            .map_err(|_| UnreachableEngine::new("engine state poisoned"))?;
        Ok(LiveCount {
            value: shared.engine.read(),
            sequence: shared.engine.next_sequence() - 1,
        })
    }
}

/// Live source for remote deployments: the submission endpoint carries no
/// read channel, so every query degrades to the derived model with an
/// explicit staleness reason.
struct SubmissionOnlySource;

impl LiveCountSource for SubmissionOnlySource {
    fn read(&mut self) -> Result<LiveCount, UnreachableEngine> {
        Err(UnreachableEngine::new(
            "no live read channel over the submission endpoint",
        ))
    }
}

/// Application orchestrator entrypoint. Loads configuration, wires the
/// engine, ledger, reducer, and façade together, runs a short submission
/// round, and shuts the poller down cleanly. With an `endpoint` configured
/// the submissions travel over HTTP; otherwise everything runs in-process
/// against the loopback transport.
pub fn run() -> Result<()> {
    let config = match env::args().nth(1) {
        Some(path) => TallyConfig::load_from_file(&path)
            .with_context(|| format!("loading config from {path}"))?,
        None => TallyConfig::default(),
    };

    let mut logger = ActivityLog::new(LOG_RETENTION_LINES);
    let reducer = Arc::new(Mutex::new(LedgerReducer::new(config.initial_value)));

    let shared = match config.endpoint {
        Some(_) => None,
        None => Some(LoopbackState::new(config.initial_value)),
    };
    let transport: Box<dyn SubmitTransport> = match (&config.endpoint, &shared) {
        (Some(endpoint), _) => Box::new(
            HttpSubmitTransport::new(endpoint.clone())
                .with_context(|| format!("building submit transport for {endpoint}"))?,
        ),
        (None, Some(shared)) => Box::new(LoopbackTransport::new(Arc::clone(shared))),
        (None, None) => unreachable!("loopback state exists whenever no endpoint is set"),
    };
    let mut client = SubmitClient::new(transport);
    let live: Box<dyn LiveCountSource + Send> = match &shared {
        Some(shared) => Box::new(SharedLiveSource {
            shared: Arc::clone(shared),
        }),
        None => Box::new(SubmissionOnlySource),
    };

    let facade = Arc::new(Mutex::new(QueryFacade::new(live)));
    let poll_reducer = Arc::clone(&reducer);
    let poll_facade = Arc::clone(&facade);
    let refresh = RefreshTask::spawn(config.refresh_interval(), move || {
        let model = poll_reducer
            .lock()
            .map(|reducer| reducer.model().clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().model().clone());
        let mut facade = match poll_facade.lock() {
            Ok(facade) => facade,
            Err(poisoned) => poisoned.into_inner(),
        };
        facade.query(&model)
    });

    let actor = ActorId::new("tallyd").context("building local actor identity")?;
    let options = config.submit_options();
    for operation in [
        OperationKind::Increment,
        OperationKind::Increment,
        OperationKind::Decrement,
    ] {
        let event = client
            .submit_and_await(operation, Some(actor.clone()), options)
            .with_context(|| format!("submitting {operation}"))?;
        logger.record_event(event.timestamp_ms, LogLevel::Info, "app", &event, "committed")?;
        let mut reducer = reducer
            .lock()
            .map_err(|_| anyhow::anyhow!("reducer poisoned"))?;
        if let Err(err) = reducer.apply(&event) {
            // A remote engine with prior history starts us mid-stream; the
            // façade keeps answering from the live side while the mirror
            // stays behind.
            logger.record(event.timestamp_ms, LogLevel::Warn, "reducer", &err.to_string())?;
        }
    }

    let mut metrics = TallyMetrics::default();
    {
        // The ledger mirror path: drain the subscription and fold it in.
        // Events already applied from commit confirmations replay as
        // idempotent duplicates.
        if let Some(shared) = &shared {
            let shared = shared
                .lock()
                .map_err(|_| anyhow::anyhow!("engine state poisoned"))?;
            let mut cursor = shared.ledger.subscribe(1);
            let mut reducer = reducer
                .lock()
                .map_err(|_| anyhow::anyhow!("reducer poisoned"))?;
            for event in cursor.next_batch(&shared.ledger) {
                reducer.apply(event)?;
            }
        }
        let reducer = reducer
            .lock()
            .map_err(|_| anyhow::anyhow!("reducer poisoned"))?;
        metrics.absorb_reducer(reducer.stats());

        let mut facade = facade
            .lock()
            .map_err(|_| anyhow::anyhow!("facade poisoned"))?;
        let answer = facade.query(reducer.model());
        metrics.record_answer(&answer);
        logger.record(
            0,
            LogLevel::Info,
            "app",
            &format!("query answered: value {}, stale {}", answer.value, answer.is_stale),
        )?;
    }

    refresh.stop();
    for line in logger.lines() {
        println!("{line}");
    }
    print!("{}", metrics.render());
    Ok(())
}
