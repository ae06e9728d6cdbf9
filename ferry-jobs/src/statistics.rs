use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type Counter = AtomicU64;

#[derive(Debug, Clone, Default)]
/// Live metrics around replication jobs.
pub struct JobStatistics(Arc<JobStatisticsInner>);

impl Deref for JobStatistics {
    type Target = JobStatisticsInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug, Default)]
pub struct JobStatisticsInner {
    pub(crate) num_jobs_added: Counter,
    pub(crate) num_jobs_completed: Counter,
    pub(crate) num_jobs_aborted: Counter,
    pub(crate) num_transfers_started: Counter,
    pub(crate) num_transfers_succeeded: Counter,
    pub(crate) num_transfers_failed: Counter,
    pub(crate) num_checksum_mismatches: Counter,
    pub(crate) num_copies_removed: Counter,
    pub(crate) num_bytes_transferred: Counter,
}

impl JobStatisticsInner {
    /// The number of jobs queued, merged jobs are not counted twice.
    pub fn num_jobs_added(&self) -> u64 {
        self.num_jobs_added.load(Ordering::Relaxed)
    }

    /// The number of jobs which reached their required copy count and
    /// were cleaned up.
    pub fn num_jobs_completed(&self) -> u64 {
        self.num_jobs_completed.load(Ordering::Relaxed)
    }

    pub fn num_jobs_aborted(&self) -> u64 {
        self.num_jobs_aborted.load(Ordering::Relaxed)
    }

    pub fn num_transfers_started(&self) -> u64 {
        self.num_transfers_started.load(Ordering::Relaxed)
    }

    /// The number of transfers which were verified and counted as a copy.
    pub fn num_transfers_succeeded(&self) -> u64 {
        self.num_transfers_succeeded.load(Ordering::Relaxed)
    }

    pub fn num_transfers_failed(&self) -> u64 {
        self.num_transfers_failed.load(Ordering::Relaxed)
    }

    pub fn num_checksum_mismatches(&self) -> u64 {
        self.num_checksum_mismatches.load(Ordering::Relaxed)
    }

    /// The number of excess copies deleted during cleanup.
    pub fn num_copies_removed(&self) -> u64 {
        self.num_copies_removed.load(Ordering::Relaxed)
    }

    pub fn num_bytes_transferred(&self) -> u64 {
        self.num_bytes_transferred.load(Ordering::Relaxed)
    }
}
