//! # Ferry Node
//!
//! The shared vocabulary of the ferry services: slaves and their status,
//! the registry tracking which slaves are online, the file metadata the
//! master keeps and the control interface used to drive transfers on a slave.
//!
//! The placement engine (`ferry-selection`) and the replication engine
//! (`ferry-jobs`) are written purely against the [SlaveRegistry], [Vfs]
//! and [SlaveClient] traits, the concrete [SlaveManager] is provided for
//! masters which don't need anything more complicated.

mod client;
mod error;
mod path;
mod registry;
mod slave;
mod statistics;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
mod vfs;

pub use client::{ConnectInfo, SlaveClient, TransferIndex, TransferStatus};
pub use error::{NodeError, RemoteError, VfsError};
pub use path::VirtualPath;
pub use registry::{SlaveManager, SlaveRegistry};
pub use slave::{
    get_unix_timestamp_ms,
    Direction,
    SlaveName,
    SlaveStatus,
    TransferStats,
};
pub use statistics::ClusterStatistics;
pub use vfs::Vfs;
