//! # Ferry
//! Placement and replication for clusters of file serving slaves.
//!
//! This is a convenience package which includes all of the sub-projects within
//! Ferry, realistically you probably only want some of these projects:
//!
//! ### Features
//! - `ferry_node` - The slave registry, file metadata and slave control interfaces.
//! - `ferry_selection` - Filter chains which pick the best slave for a transfer.
//! - `ferry_jobs` - Replication jobs copying files between slaves.

#[cfg(feature = "ferry-node")]
pub use ferry_node as node;
#[cfg(feature = "ferry-selection")]
pub use ferry_selection as selection;
#[cfg(feature = "ferry-jobs")]
pub use ferry_jobs as jobs;
