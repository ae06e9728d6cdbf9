use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type Counter = AtomicU64;

#[derive(Debug, Clone, Default)]
/// Live metrics around the slaves known to the master.
pub struct ClusterStatistics(Arc<ClusterStatisticsInner>);

impl Deref for ClusterStatistics {
    type Target = ClusterStatisticsInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug, Default)]
pub struct ClusterStatisticsInner {
    /// The number of registered slaves.
    pub(crate) num_known_slaves: Counter,
    /// The number of slaves currently online.
    pub(crate) num_online_slaves: Counter,
    /// The number of times a slave has gone offline.
    pub(crate) num_disconnects: Counter,
}

impl ClusterStatisticsInner {
    /// The number of registered slaves.
    pub fn num_known_slaves(&self) -> u64 {
        self.num_known_slaves.load(Ordering::Relaxed)
    }

    /// The number of slaves currently online.
    pub fn num_online_slaves(&self) -> u64 {
        self.num_online_slaves.load(Ordering::Relaxed)
    }

    /// The number of slaves currently offline.
    pub fn num_offline_slaves(&self) -> u64 {
        self.num_known_slaves()
            .saturating_sub(self.num_online_slaves())
    }

    /// The number of times a slave has gone offline.
    pub fn num_disconnects(&self) -> u64 {
        self.num_disconnects.load(Ordering::Relaxed)
    }
}
