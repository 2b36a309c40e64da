use std::sync::{Arc, MutexGuard};
use std::time::{Duration, Instant};

use crate::analytics::OutcomeKind;
use crate::message_job::MessageJob;
use crate::transport::DeliveryResult;

use super::job::{DelayedJob, ReadyJob};
use super::{QueueState, Shared};

// How long an idle worker waits before re-checking for work
const LOOP_DELAY: u64 = 10;

pub(super) fn run(shared: Arc<Shared>, worker_id: usize) {
    debug!("(worker {}) started", worker_id);
    loop {
        let job = match next_job(&shared, worker_id) {
            Some(job) => job,
            None => break,
        };

        execute(&shared, job, worker_id);

        match shared.state.lock() {
            Ok(mut state) => {
                state.in_flight -= 1;
            }
            Err(_) => {
                error!("(worker {}) state lock poisoned", worker_id);
                break;
            }
        }
        shared.condvar.notify_all();
    }
    debug!("(worker {}) stopped", worker_id);
}

// Block until a job is admitted for this worker. Returns None on shutdown
// or a poisoned lock.
fn next_job(shared: &Shared, worker_id: usize) -> Option<MessageJob> {
    let mut state = match shared.state.lock() {
        Ok(guard) => guard,
        Err(_) => {
            error!("(worker {}) state lock poisoned", worker_id);
            return None;
        }
    };

    loop {
        if state.shutdown {
            return None;
        }

        let now = Instant::now();

        // Promote deferred jobs whose backoff has elapsed
        loop {
            let due = match state.delayed.iter().next() {
                Some(delayed) if delayed.due <= now => delayed.clone(),
                _ => break,
            };
            state.delayed.remove(&due);
            let seq = state.next_seq;
            state.next_seq += 1;
            state.ready.push(ReadyJob { seq, job: due.job });
        }

        if !state.paused && !state.ready.is_empty() {
            let admitted = match state.limiter {
                None => Ok(()),
                Some(ref mut limiter) => limiter.try_take(now),
            };
            match admitted {
                Ok(()) => {
                    if let Some(ready) = state.ready.pop() {
                        state.in_flight += 1;
                        return Some(ready.job);
                    }
                }
                Err(wait) => {
                    state = wait_on(shared, state, wait, worker_id)?;
                    continue;
                }
            }
        }

        let timeout = idle_timeout(&state, now);
        state = wait_on(shared, state, timeout, worker_id)?;
    }
}

fn wait_on<'a>(
    shared: &'a Shared,
    state: MutexGuard<'a, QueueState>,
    timeout: Duration,
    worker_id: usize,
) -> Option<MutexGuard<'a, QueueState>> {
    match shared.condvar.wait_timeout(state, timeout) {
        Ok((guard, _)) => Some(guard),
        Err(_) => {
            error!("(worker {}) state lock poisoned", worker_id);
            None
        }
    }
}

// Compute how long to wait for a wakeup. If any deferred job exists (and we
// are not paused), wait until the first one is due; otherwise LOOP_DELAY.
fn idle_timeout(state: &QueueState, now: Instant) -> Duration {
    if state.paused {
        Duration::from_secs(LOOP_DELAY)
    } else if let Some(delayed) = state.delayed.iter().next() {
        if delayed.due > now {
            delayed.due - now
        } else {
            Duration::new(0, 0)
        }
    } else {
        Duration::from_secs(LOOP_DELAY)
    }
}

// One delivery attempt. Terminal outcomes are reported to the aggregator
// from here and nowhere else, so each job reports exactly once.
fn execute(shared: &Shared, mut job: MessageJob, worker_id: usize) {
    let result = shared.transport.send(&job);

    match result {
        DeliveryResult::Delivered(ref response) => {
            debug!(
                "(worker {}) delivered job {}: {}",
                worker_id, job.job_id, response
            );
            shared
                .aggregator
                .record(&job.campaign_id, &job.job_id, OutcomeKind::Delivered);
        }
        DeliveryResult::Failed(ref reason) => {
            warn!(
                "(worker {}) permanent failure for job {}: {}",
                worker_id, job.job_id, reason
            );
            shared
                .aggregator
                .record(&job.campaign_id, &job.job_id, OutcomeKind::Bounced);
        }
        DeliveryResult::Deferred(ref reason) => {
            job.attempt += 1;
            if job.attempt >= shared.max_attempts {
                warn!(
                    "(worker {}) job {} failed after {} attempts: {}",
                    worker_id, job.job_id, job.attempt, reason
                );
                shared
                    .aggregator
                    .record(&job.campaign_id, &job.job_id, OutcomeKind::Bounced);
            } else {
                let delay =
                    backoff_delay(shared.base_retry_delay, shared.max_retry_delay, job.attempt);
                debug!(
                    "(worker {}) deferring job {} for {} seconds (attempt {}): {}",
                    worker_id,
                    job.job_id,
                    delay.as_secs(),
                    job.attempt,
                    reason
                );
                requeue(shared, job, delay, worker_id);
            }
        }
    }
}

fn requeue(shared: &Shared, job: MessageJob, delay: Duration, worker_id: usize) {
    let mut state = match shared.state.lock() {
        Ok(guard) => guard,
        Err(_) => {
            error!(
                "(worker {}) state lock poisoned, dropping job {}",
                worker_id, job.job_id
            );
            return;
        }
    };
    let seq = state.next_seq;
    state.next_seq += 1;
    state.delayed.insert(DelayedJob {
        due: Instant::now() + delay,
        seq,
        job,
    });
    drop(state);
    shared.condvar.notify_all();
}

// Exponential backoff: the base delay doubles per attempt, capped
fn backoff_delay(base: Duration, cap: Duration, attempt: u8) -> Duration {
    let factor = 2u32.saturating_pow(u32::from(attempt));
    let delay = base.checked_mul(factor).unwrap_or(cap);
    if delay > cap {
        cap
    } else {
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let base = Duration::from_secs(60);
        let cap = Duration::from_secs(900);
        assert_eq!(backoff_delay(base, cap, 1), Duration::from_secs(120));
        assert_eq!(backoff_delay(base, cap, 2), Duration::from_secs(240));
        assert_eq!(backoff_delay(base, cap, 3), Duration::from_secs(480));
    }

    #[test]
    fn test_backoff_is_capped() {
        let base = Duration::from_secs(60);
        let cap = Duration::from_secs(900);
        assert_eq!(backoff_delay(base, cap, 4), cap);
        assert_eq!(backoff_delay(base, cap, 50), cap);
    }
}
