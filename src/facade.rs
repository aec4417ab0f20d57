use crate::reducer::DerivedReadModel;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

/// Live engine value unavailable. Recovered locally by falling back to the
/// derived read model; the answer carries a staleness flag and the reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("live engine unreachable: {reason}")]
pub struct UnreachableEngine {
    pub reason: String,
}

impl UnreachableEngine {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Point-in-time reading of the authoritative engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveCount {
    pub value: i64,
    /// Highest sequence number the engine has committed.
    pub sequence: u64,
}

/// Seam over the live engine so reachability is controllable under test and
/// so the façade never holds the engine's lock across a poll interval.
pub trait LiveCountSource {
    fn read(&mut self) -> Result<LiveCount, UnreachableEngine>;
}

impl LiveCountSource for Box<dyn LiveCountSource + Send> {
    fn read(&mut self) -> Result<LiveCount, UnreachableEngine> {
        (**self).read()
    }
}

/// Which source of truth produced the answer's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Live,
    Derived,
}

/// The two sources disagreed while both were reachable. A lagging derived
/// sequence marks an in-flight propagation; equal sequences with unequal
/// values mark a missed or corrupted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discrepancy {
    pub live_value: i64,
    pub live_sequence: u64,
    pub derived_value: i64,
    pub derived_sequence: u64,
}

impl Discrepancy {
    /// True when the derived model simply lags the engine, which resolves on
    /// its own once the reducer catches up.
    pub fn is_transient(&self) -> bool {
        self.derived_sequence < self.live_sequence
    }

    /// Unconsumed events between the two sources.
    pub fn sequence_lag(&self) -> u64 {
        self.live_sequence.saturating_sub(self.derived_sequence)
    }
}

/// Single consistent answer to "what is the counter value".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryAnswer {
    pub value: i64,
    pub source: ValueSource,
    /// Set when the answer came from the derived model while the engine was
    /// unreachable.
    pub is_stale: bool,
    /// Sequence number backing `value`, so callers can judge recency.
    pub last_sequence: u64,
    pub discrepancy: Option<Discrepancy>,
    /// Why the live engine was unreachable, when `is_stale` is set.
    pub stale_reason: Option<String>,
}

/// Answers reads by preferring the live engine value and cross-checking it
/// against the reducer's derived value.
pub struct QueryFacade<L: LiveCountSource> {
    live: L,
    stale_answers_served: u64,
}

impl<L: LiveCountSource> QueryFacade<L> {
    pub fn new(live: L) -> Self {
        Self {
            live,
            stale_answers_served: 0,
        }
    }

    /// Answers served from the derived model while the engine was down.
    pub fn stale_answers_served(&self) -> u64 {
        self.stale_answers_served
    }

    /// Reconciles the two sources. Never fails: an unreachable engine
    /// degrades to a stale derived answer, and a disagreement is surfaced in
    /// full rather than silently resolved toward either side.
    pub fn query(&mut self, derived: &DerivedReadModel) -> QueryAnswer {
        match self.live.read() {
            Ok(live) => {
                let discrepancy = if live.value != derived.last_value()
                    || live.sequence != derived.last_sequence()
                {
                    Some(Discrepancy {
                        live_value: live.value,
                        live_sequence: live.sequence,
                        derived_value: derived.last_value(),
                        derived_sequence: derived.last_sequence(),
                    })
                } else {
                    None
                };
                QueryAnswer {
                    value: live.value,
                    source: ValueSource::Live,
                    is_stale: false,
                    last_sequence: live.sequence,
                    discrepancy,
                    stale_reason: None,
                }
            }
            Err(err) => {
                self.stale_answers_served += 1;
                QueryAnswer {
                    value: derived.last_value(),
                    source: ValueSource::Derived,
                    is_stale: true,
                    last_sequence: derived.last_sequence(),
                    discrepancy: None,
                    stale_reason: Some(err.reason),
                }
            }
        }
    }
}

/// Background poller that refreshes a shared [`QueryAnswer`] snapshot at a
/// bounded interval. Explicit handle with a stop flag and join, never an
/// ambient timer; ordering between a mutation's confirmation and the next
/// poll's read is not guaranteed.
pub struct RefreshTask {
    stop: Arc<AtomicBool>,
    wakeup: Arc<(Mutex<()>, Condvar)>,
    snapshot: Arc<Mutex<Option<QueryAnswer>>>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshTask {
    /// Spawns the poller. `poll` runs once per interval until [`stop`] is
    /// called.
    ///
    /// [`stop`]: RefreshTask::stop
    pub fn spawn<F>(interval: Duration, mut poll: F) -> Self
    where
        F: FnMut() -> QueryAnswer + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let wakeup = Arc::new((Mutex::new(()), Condvar::new()));
        let snapshot: Arc<Mutex<Option<QueryAnswer>>> = Arc::new(Mutex::new(None));

        let thread_stop = Arc::clone(&stop);
        let thread_wakeup = Arc::clone(&wakeup);
        let thread_snapshot = Arc::clone(&snapshot);
        let handle = thread::spawn(move || {
            while !thread_stop.load(Ordering::SeqCst) {
                let answer = poll();
                if let Ok(mut slot) = thread_snapshot.lock() {
                    *slot = Some(answer);
                }
                let (lock, cvar) = &*thread_wakeup;
                if let Ok(guard) = lock.lock() {
                    let _ = cvar.wait_timeout(guard, interval);
                }
            }
        });

        Self {
            stop,
            wakeup,
            snapshot,
            handle: Some(handle),
        }
    }

    /// Most recent answer produced by the poller, if any poll has completed.
    pub fn latest(&self) -> Option<QueryAnswer> {
        self.snapshot.lock().ok().and_then(|slot| slot.clone())
    }

    /// Signals the poller to stop and joins it.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        let (_, cvar) = &*self.wakeup;
        cvar.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.shutdown();
    }
}
