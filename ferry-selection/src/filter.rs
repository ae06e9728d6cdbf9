use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use ferry_node::{Direction, SlaveName, SlaveRegistry, SlaveStatus, Vfs, VirtualPath};

use crate::error::{ConfigError, SelectionError};
use crate::score::ScoreChart;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
/// The transfers a user currently has open on a single slave.
pub struct TransferCounts {
    pub uploads: u32,
    pub downloads: u32,
}

impl TransferCounts {
    #[inline]
    pub fn get(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Upload => self.uploads,
            Direction::Download => self.downloads,
        }
    }
}

#[derive(Debug, Clone, Default)]
/// The user a placement decision is made on behalf of.
pub struct Requester {
    pub name: String,
    /// Open transfers of the user keyed by slave.
    pub open_transfers: BTreeMap<SlaveName, TransferCounts>,
}

impl Requester {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            open_transfers: BTreeMap::new(),
        }
    }

    /// Records an open transfer on the given slave.
    pub fn with_open_transfer(mut self, slave: impl Into<SlaveName>, direction: Direction) -> Self {
        let counts = self.open_transfers.entry(slave.into()).or_default();
        match direction {
            Direction::Upload => counts.uploads += 1,
            Direction::Download => counts.downloads += 1,
        }
        self
    }

    /// The number of open transfers on the slave in the given direction.
    pub fn open_transfers_on(&self, slave: &str, direction: Direction) -> u32 {
        self.open_transfers
            .get(slave)
            .map(|counts| counts.get(direction))
            .unwrap_or_default()
    }
}

/// Everything a filter may inspect while scoring.
pub struct FilterContext<'a> {
    /// The direction of the transfer as seen from the chosen slave.
    pub direction: Direction,
    pub path: Option<&'a VirtualPath>,
    pub requester: Option<&'a Requester>,
    /// The slave a job is copying from, when picking a job destination.
    pub source_slave: Option<&'a str>,
    /// The slaves currently sending a file for any job.
    pub job_sources: Option<&'a BTreeSet<SlaveName>>,
    pub registry: &'a dyn SlaveRegistry,
    pub vfs: &'a dyn Vfs,
    /// The current unix timestamp in milliseconds.
    pub now_ms: u64,
}

/// A single scoring rule of a filter chain.
pub trait Filter: Debug + Send + Sync + 'static {
    /// The name the filter was configured with.
    fn name(&self) -> &'static str;

    /// Adjusts or eliminates the candidates in the chart.
    ///
    /// Slaves which cannot be evaluated must be eliminated instead of
    /// producing an error.
    fn process(
        &self,
        chart: &mut ScoreChart,
        ctx: &FilterContext<'_>,
    ) -> Result<(), SelectionError>;

    /// Checks the filter against the registered slaves when its chain is
    /// built.
    fn validate(&self, _registry: &dyn SlaveRegistry) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// Fetches the status of every candidate, eliminating those which are
/// unreachable.
pub(crate) fn collect_statuses(
    filter: &'static str,
    chart: &mut ScoreChart,
    registry: &dyn SlaveRegistry,
) -> BTreeMap<SlaveName, SlaveStatus> {
    let mut statuses = BTreeMap::new();
    chart.retain(|score| match registry.status(score.name()) {
        Ok(status) => {
            statuses.insert(score.name().to_string(), status);
            true
        },
        Err(e) => {
            debug!(
                filter = filter,
                slave = score.name(),
                error = ?e,
                "Eliminating slave with unavailable status.",
            );
            false
        },
    });
    statuses
}
