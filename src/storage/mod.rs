pub mod memory_storage;
pub use self::memory_storage::MemoryStorage;

use crate::batch_job::BatchJob;

pub trait DispatchStorageError: std::error::Error {}

/// A trait for implementing mailblast's run-progress storage. Records are
/// best-effort: the engine recomputes eligibility rather than journaling it,
/// and a restart loses progress tracking for in-flight runs.
pub trait DispatchStorage: Send + Sync {
    type Error: DispatchStorageError;

    /// Store a new `BatchJob` record. Overwrites any record with the same
    /// job id.
    fn store(&mut self, batch_job: BatchJob) -> Result<(), Self::Error>;

    /// Update an existing record
    fn update(&mut self, batch_job: BatchJob) -> Result<(), Self::Error>;

    /// Retrieve a record by job id
    fn retrieve(&self, job_id: &str) -> Result<BatchJob, Self::Error>;

    /// Remove a record. Called when a run completes or is cancelled.
    fn remove(&mut self, job_id: &str) -> Result<(), Self::Error>;

    /// Retrieve every record whose run has not finished
    fn retrieve_all_active(&self) -> Result<Vec<BatchJob>, Self::Error>;
}
