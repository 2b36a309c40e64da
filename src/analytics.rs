use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Campaign counter bumped on each successful delivery
pub const COUNTER_DELIVERIES: &str = "deliveries";

/// Campaign counter bumped on each permanent failure
pub const COUNTER_BOUNCES: &str = "bounces";

/// The external analytics capability: accepts named counter increments keyed
/// by campaign id. Implementations must make each increment atomic.
pub trait AnalyticsSink: Send + Sync {
    fn increment(&self, campaign_id: &str, counter: &str, delta: u64);
}

/// The terminal outcome of one message job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Delivered,
    Bounced,
}

impl OutcomeKind {
    fn counter(self) -> &'static str {
        match self {
            OutcomeKind::Delivered => COUNTER_DELIVERIES,
            OutcomeKind::Bounced => COUNTER_BOUNCES,
        }
    }
}

/// Consumes per-job terminal outcomes and applies counter increments to the
/// analytics sink. Duplicate reports for the same job id are dropped, so an
/// at-least-once caller cannot double-count a campaign.
pub struct OutcomeAggregator {
    sink: Arc<dyn AnalyticsSink>,
    seen: Mutex<HashSet<String>>,
}

impl OutcomeAggregator {
    pub fn new(sink: Arc<dyn AnalyticsSink>) -> OutcomeAggregator {
        OutcomeAggregator {
            sink,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Record the terminal outcome of one message job
    pub fn record(&self, campaign_id: &str, job_id: &str, kind: OutcomeKind) {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(_) => {
                error!("(aggregator) seen-set lock poisoned, dropping outcome");
                return;
            }
        };
        if !seen.insert(job_id.to_owned()) {
            debug!(
                "(aggregator) duplicate outcome for job {} dropped",
                job_id
            );
            return;
        }
        self.sink.increment(campaign_id, kind.counter(), 1);
    }
}

/// In-memory analytics sink with monotonic counters, for tests and small
/// deployments
#[derive(Default)]
pub struct MemoryAnalytics {
    counters: Mutex<HashMap<(String, String), u64>>,
}

impl MemoryAnalytics {
    pub fn new() -> MemoryAnalytics {
        Default::default()
    }

    /// Current value of a campaign counter (zero if never incremented)
    pub fn value(&self, campaign_id: &str, counter: &str) -> u64 {
        match self.counters.lock() {
            Ok(guard) => *guard
                .get(&(campaign_id.to_owned(), counter.to_owned()))
                .unwrap_or(&0),
            Err(_) => 0,
        }
    }
}

impl AnalyticsSink for MemoryAnalytics {
    fn increment(&self, campaign_id: &str, counter: &str, delta: u64) {
        if let Ok(mut guard) = self.counters.lock() {
            let entry = guard
                .entry((campaign_id.to_owned(), counter.to_owned()))
                .or_insert(0);
            *entry += delta;
        }
    }
}
