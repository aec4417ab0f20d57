use crate::facade::QueryAnswer;
use crate::reducer::ReducerStats;

/// Crate-wide counters aggregated from the reducer and the façade, exposed
/// via `/metrics`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TallyMetrics {
    pub events_applied_total: u64,
    pub duplicates_ignored_total: u64,
    pub gaps_detected_total: u64,
    pub stale_answers_served_total: u64,
    pub discrepancies_observed_total: u64,
}

impl TallyMetrics {
    /// Folds the reducer's counters into the snapshot.
    pub fn absorb_reducer(&mut self, stats: ReducerStats) {
        self.events_applied_total = stats.applied_total;
        self.duplicates_ignored_total = stats.duplicates_ignored_total;
        self.gaps_detected_total = stats.gaps_detected_total;
    }

    /// Records what one façade answer revealed.
    pub fn record_answer(&mut self, answer: &QueryAnswer) {
        if answer.is_stale {
            self.stale_answers_served_total += 1;
        }
        if answer.discrepancy.is_some() {
            self.discrepancies_observed_total += 1;
        }
    }

    /// Renders the counters as Prometheus exposition text.
    pub fn render(&self) -> String {
        format!(
            "tally_events_applied_total {}\ntally_duplicates_ignored_total {}\ntally_gaps_detected_total {}\ntally_stale_answers_served_total {}\ntally_discrepancies_observed_total {}\n",
            self.events_applied_total,
            self.duplicates_ignored_total,
            self.gaps_detected_total,
            self.stale_answers_served_total,
            self.discrepancies_observed_total
        )
    }
}
