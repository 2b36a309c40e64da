use std::cmp::{Ord, Ordering, PartialOrd};
use std::time::Instant;

/// One scheduled batch dispatch, ordered by due time. Run id and batch index
/// break ties so simultaneous batches of different runs both survive in the
/// task set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub time: Instant,
    pub run_id: String,
    pub batch_index: usize,
}

impl Ord for Task {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.run_id.cmp(&other.run_id))
            .then_with(|| self.batch_index.cmp(&other.batch_index))
    }
}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
