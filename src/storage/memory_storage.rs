use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use crate::batch_job::{BatchJob, RunState};
use crate::storage::{DispatchStorage, DispatchStorageError};

#[derive(Debug)]
pub enum MemoryStorageError {
    NotFound,
}

impl Error for MemoryStorageError {}

impl DispatchStorageError for MemoryStorageError {}

impl fmt::Display for MemoryStorageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MemoryStorageError::NotFound => write!(f, "Memory Storage Error: Batch job not found"),
        }
    }
}

#[derive(Default)]
pub struct MemoryStorage(HashMap<String, BatchJob>);

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage(HashMap::new())
    }
}

impl DispatchStorage for MemoryStorage {
    type Error = MemoryStorageError;

    fn store(&mut self, batch_job: BatchJob) -> Result<(), MemoryStorageError> {
        self.0.insert(batch_job.job_id.clone(), batch_job);
        Ok(())
    }

    fn update(&mut self, batch_job: BatchJob) -> Result<(), MemoryStorageError> {
        let record: &mut BatchJob = match self.0.get_mut(&batch_job.job_id) {
            None => return Err(MemoryStorageError::NotFound),
            Some(record) => record,
        };
        *record = batch_job;
        Ok(())
    }

    fn retrieve(&self, job_id: &str) -> Result<BatchJob, MemoryStorageError> {
        match self.0.get(job_id) {
            None => Err(MemoryStorageError::NotFound),
            Some(record) => Ok(record.clone()),
        }
    }

    fn remove(&mut self, job_id: &str) -> Result<(), MemoryStorageError> {
        match self.0.remove(job_id) {
            None => Err(MemoryStorageError::NotFound),
            Some(_) => Ok(()),
        }
    }

    fn retrieve_all_active(&self) -> Result<Vec<BatchJob>, MemoryStorageError> {
        Ok(self
            .0
            .values()
            .filter(|record| match record.state {
                RunState::Dispatching | RunState::Halted => true,
                RunState::Completed | RunState::Cancelled => false,
            })
            .cloned()
            .collect())
    }
}
