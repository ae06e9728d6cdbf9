//! # Ferry Jobs
//!
//! Replication jobs copy a file between slaves until the required number
//! of copies exist on the job's destination slaves, then remove the copies
//! which are no longer needed.
//!
//! Every online slave gets a worker which pulls transfers destined for it
//! from the [JobManager]. A transfer is driven entirely by the master, the
//! destination slave listens, the source connects and pushes the file and
//! both legs are polled until they finish. Failures are blamed on the leg
//! which caused them so the right copy is discarded.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ferry_jobs::{JobManager, JobManagerConfig};
//! use ferry_node::SlaveManager;
//! use ferry_node::test_utils::MemoryVfs;
//! use ferry_selection::{SelectionConfig, SlaveSelectionManager};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let registry = SlaveManager::new();
//! let selection = SlaveSelectionManager::new(
//!     Arc::new(registry),
//!     Arc::new(MemoryVfs::default()),
//!     &SelectionConfig::default(),
//! )?;
//!
//! let manager = JobManager::new(selection, JobManagerConfig::default());
//! let _workers = manager.start_workers();
//! manager.add_job("/mp3/release/01.mp3", ["slave1", "slave2"], 0, 1).await?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate tracing;

mod config;
mod error;
mod job;
mod manager;
mod range;
mod scheduler;
mod statistics;
mod transfer;

pub use config::{ChecksumPolicy, JobManagerConfig};
pub use error::JobError;
pub use job::{Job, JobIndex, JobPhase, JobRequest, JobSnapshot, TransferSnapshot};
pub use manager::{Assignment, JobManager, Work};
pub use range::JobRanges;
pub use scheduler::SchedulerHandle;
pub use statistics::JobStatistics;
pub use transfer::{
    AbortHandle,
    AbortSignal,
    SlaveTransfer,
    SlaveTransferError,
    TransferChecksums,
    TransferProgress,
};
