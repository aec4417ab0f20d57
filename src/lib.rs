//! Tally: an event-sourced counter engine with a replayable ledger mirror.
//!
//! The engine owns the authoritative value and emits one immutable event per
//! committed mutation; the ledger stores those events append-only in total
//! order; the reducer folds the stream into a derived read model that can be
//! rebuilt from scratch; the façade answers reads by reconciling the live
//! value against the derived one.

pub mod app;
pub mod client;
pub mod config;
pub mod engine;
pub mod event;
pub mod facade;
pub mod ledger;
pub mod observability;
pub mod reducer;

pub use client::{
    HttpSubmitTransport, LoopbackState, LoopbackTransport, OperationKind, PendingSubmission,
    SubmitClient, SubmitError, SubmitOptions, SubmitRequest, SubmitResponse, SubmitStatus,
    SubmitTelemetry, SubmitTransport, TransportError,
};
pub use config::{ConfigError, TallyConfig};
pub use engine::{CounterEngine, EngineError, ResetPolicy};
pub use event::{
    ActorId, Event, EventKind, IdentityError, ManualClock, MonotonicClock, SystemMonotonicClock,
};
pub use facade::{
    Discrepancy, LiveCount, LiveCountSource, QueryAnswer, QueryFacade, RefreshTask,
    UnreachableEngine, ValueSource,
};
pub use ledger::{EventLedger, LedgerCursor, LedgerError, LedgerSnapshot};
pub use observability::{ActivityLog, LedgerRef, LogLevel, LoggingError, TallyMetrics};
pub use reducer::{ApplyOutcome, DerivedReadModel, LedgerReducer, ReduceError, ReducerStats};
