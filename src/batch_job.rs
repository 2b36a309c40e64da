use chrono::{DateTime, Utc};

/// Where a dispatch run currently stands. `Halted` means a scheduled batch
/// would have breached the daily send limit; already-enqueued batches still
/// drain, nothing further is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Dispatching,
    Halted,
    Completed,
    Cancelled,
}

/// The progress record of one campaign dispatch run. Owned and mutated only
/// by the orchestrator; deleted when the run completes or is cancelled, so
/// it bounds memory rather than serving as an audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub job_id: String,

    pub campaign_id: String,

    /// How many eligible recipients this run covers
    pub total_recipients: u32,

    /// How many recipients have had their jobs enqueued so far.
    /// Never exceeds `total_recipients`.
    pub sent_count: u32,

    /// Index of the next batch to dispatch. Strictly increases.
    pub current_batch_index: u32,

    pub state: RunState,

    pub created_at: DateTime<Utc>,

    /// When a batch was last enqueued, if any has been
    pub last_executed_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    pub fn new(job_id: &str, campaign_id: &str, total_recipients: u32) -> BatchJob {
        BatchJob {
            job_id: job_id.to_owned(),
            campaign_id: campaign_id.to_owned(),
            total_recipients,
            sent_count: 0,
            current_batch_index: 0,
            state: RunState::Dispatching,
            created_at: Utc::now(),
            last_executed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_starts_empty() {
        let record = BatchJob::new("run-1", "c-1", 250);
        assert_eq!(record.sent_count, 0);
        assert_eq!(record.current_batch_index, 0);
        assert_eq!(record.state, RunState::Dispatching);
        assert!(record.last_executed_at.is_none());
    }
}
