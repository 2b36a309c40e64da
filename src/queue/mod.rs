mod job;
mod rate_limit;
mod worker;

use std::collections::{BTreeSet, BinaryHeap};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::analytics::OutcomeAggregator;
use crate::config::Config;
use crate::error::Error;
use crate::message_job::MessageJob;
use crate::transport::Transport;

use self::job::{DelayedJob, ReadyJob};
use self::rate_limit::TokenBucket;

/// A snapshot of queue occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Jobs admitted and waiting for a worker
    pub ready: usize,

    /// Jobs waiting out a retry backoff
    pub delayed: usize,

    /// Jobs currently being delivered
    pub in_flight: usize,

    pub paused: bool,
}

struct QueueState {
    ready: BinaryHeap<ReadyJob>,
    delayed: BTreeSet<DelayedJob>,
    limiter: Option<TokenBucket>,
    paused: bool,
    shutdown: bool,
    next_seq: u64,
    in_flight: usize,
}

struct Shared {
    state: Mutex<QueueState>,
    condvar: Condvar,
    handles: Mutex<Vec<thread::JoinHandle<()>>>,
    transport: Arc<dyn Transport>,
    aggregator: Arc<OutcomeAggregator>,
    base_retry_delay: Duration,
    max_retry_delay: Duration,
    max_attempts: u8,
}

/// A priority-ordered work queue of message jobs, consumed by a bounded pool
/// of worker threads with rate limiting and retry-with-backoff. Cheap to
/// clone; clones share the same queue.
#[derive(Clone)]
pub struct DispatchQueue {
    shared: Arc<Shared>,
}

impl DispatchQueue {
    /// Construct the queue and spawn its worker pool. Transport and
    /// analytics are injected; the queue owns no ambient globals.
    pub fn new(
        config: &Config,
        transport: Arc<dyn Transport>,
        aggregator: Arc<OutcomeAggregator>,
    ) -> DispatchQueue {
        let limiter = if config.max_jobs_per_second > 0 {
            Some(TokenBucket::new(config.max_jobs_per_second, Instant::now()))
        } else {
            None
        };

        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                ready: BinaryHeap::new(),
                delayed: BTreeSet::new(),
                limiter,
                paused: false,
                shutdown: false,
                next_seq: 0,
                in_flight: 0,
            }),
            condvar: Condvar::new(),
            handles: Mutex::new(Vec::new()),
            transport,
            aggregator,
            base_retry_delay: Duration::from_secs(config.base_retry_delay_secs),
            max_retry_delay: Duration::from_secs(config.max_retry_delay_secs),
            max_attempts: config.max_attempts,
        });

        for worker_id in 0..config.workers {
            let worker_shared = shared.clone();
            let handle = thread::spawn(move || {
                worker::run(worker_shared, worker_id);
            });
            if let Ok(mut handles) = shared.handles.lock() {
                handles.push(handle);
            }
        }

        DispatchQueue { shared }
    }

    /// Admit a job. Higher-priority jobs run first; equal priorities run in
    /// admission order.
    pub fn enqueue(&self, job: MessageJob) -> Result<(), Error> {
        let mut state = self.shared.state.lock().map_err(|_| Error::Lock)?;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.ready.push(ReadyJob { seq, job });
        drop(state);
        self.shared.condvar.notify_all();
        Ok(())
    }

    /// Suspend consumption. Queued and deferred jobs are kept; jobs already
    /// handed to a worker finish their current attempt.
    pub fn pause(&self) -> Result<(), Error> {
        let mut state = self.shared.state.lock().map_err(|_| Error::Lock)?;
        state.paused = true;
        info!("(queue) paused");
        Ok(())
    }

    /// Resume consumption
    pub fn resume(&self) -> Result<(), Error> {
        let mut state = self.shared.state.lock().map_err(|_| Error::Lock)?;
        state.paused = false;
        drop(state);
        self.shared.condvar.notify_all();
        info!("(queue) resumed");
        Ok(())
    }

    pub fn stats(&self) -> Result<QueueStats, Error> {
        let state = self.shared.state.lock().map_err(|_| Error::Lock)?;
        Ok(QueueStats {
            ready: state.ready.len(),
            delayed: state.delayed.len(),
            in_flight: state.in_flight,
            paused: state.paused,
        })
    }

    /// Stop the worker pool and wait for workers to finish their current
    /// attempt. Jobs still queued are dropped.
    pub fn shutdown(&self) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.shutdown = true;
        }
        self.shared.condvar.notify_all();

        let handles: Vec<thread::JoinHandle<()>> = match self.shared.handles.lock() {
            Ok(mut guard) => guard.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for handle in handles {
            let _ = handle.join();
        }
    }
}
