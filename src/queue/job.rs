use std::cmp::{Ord, Ordering, PartialOrd};
use std::time::Instant;

use crate::message_job::MessageJob;

/// A job admitted to the ready heap. Higher priority pops first; admission
/// sequence breaks ties so equal-priority jobs run in FIFO order.
#[derive(Debug, Clone)]
pub struct ReadyJob {
    pub seq: u64,
    pub job: MessageJob,
}

impl Ord for ReadyJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: greater means popped sooner
        self.job
            .priority
            .cmp(&other.job.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ReadyJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ReadyJob {
    fn eq(&self, other: &Self) -> bool {
        self.job.priority == other.job.priority && self.seq == other.seq
    }
}

impl Eq for ReadyJob {}

/// A deferred job waiting out its retry backoff, ordered by due time.
/// The sequence number keeps jobs due at the same instant distinct.
#[derive(Debug, Clone)]
pub struct DelayedJob {
    pub due: Instant,
    pub seq: u64,
    pub job: MessageJob,
}

impl Ord for DelayedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .cmp(&other.due)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for DelayedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DelayedJob {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for DelayedJob {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    fn job(priority: u8) -> MessageJob {
        use crate::campaign::Campaign;
        let campaign = Campaign {
            campaign_id: "c-1".to_owned(),
            from: "news@example.com".to_owned(),
            reply_to: None,
            subject: "s".to_owned(),
            html_body: String::new(),
            text_body: String::new(),
            priority,
        };
        MessageJob::for_campaign(&campaign, "a@example.com")
    }

    #[test]
    fn test_higher_priority_pops_first() {
        let mut heap = BinaryHeap::new();
        heap.push(ReadyJob { seq: 0, job: job(1) });
        heap.push(ReadyJob { seq: 1, job: job(9) });
        heap.push(ReadyJob { seq: 2, job: job(5) });

        let order: Vec<u8> = std::iter::from_fn(|| heap.pop())
            .map(|r| r.job.priority)
            .collect();
        assert_eq!(order, vec![9, 5, 1]);
    }

    #[test]
    fn test_equal_priority_is_fifo() {
        let mut heap = BinaryHeap::new();
        for seq in 0..3 {
            let mut j = job(5);
            j.to = format!("r{}@example.com", seq);
            heap.push(ReadyJob { seq, job: j });
        }

        let order: Vec<String> = std::iter::from_fn(|| heap.pop())
            .map(|r| r.job.to)
            .collect();
        assert_eq!(order, vec!["r0@example.com", "r1@example.com", "r2@example.com"]);
    }

    #[test]
    fn test_delayed_jobs_sort_by_due_time() {
        use std::collections::BTreeSet;
        use std::time::Duration;

        let now = Instant::now();
        let mut set = BTreeSet::new();
        set.insert(DelayedJob {
            due: now + Duration::from_secs(30),
            seq: 0,
            job: job(1),
        });
        set.insert(DelayedJob {
            due: now + Duration::from_secs(10),
            seq: 1,
            job: job(1),
        });
        // Same due time as an existing entry must not collide
        set.insert(DelayedJob {
            due: now + Duration::from_secs(10),
            seq: 2,
            job: job(1),
        });

        assert_eq!(set.len(), 3);
        let first = set.iter().next().unwrap();
        assert_eq!(first.seq, 1);
    }
}
