//! The built-in filters and the table used to construct them by name.

mod bandwidth;
mod matchdir;
mod max_transfers;
mod max_uploads_per_slave;
mod min_free_space;
mod min_time_online;
mod slave_top;

pub use bandwidth::{BandwidthFilter, ReverseBandwidthFilter};
pub use matchdir::MatchdirFilter;
pub use max_transfers::{MaxTransfersFilter, MaxTransfersPerUserFilter};
pub use max_uploads_per_slave::MaxUploadsPerSlaveFilter;
pub use min_free_space::MinFreeSpaceFilter;
pub use min_time_online::MinTimeOnlineFilter;
pub use slave_top::SlaveTopFilter;

use crate::config::FilterConfig;
use crate::error::ConfigError;
use crate::filter::Filter;

/// Builds a filter from its configuration.
pub type FilterFactory = fn(&FilterConfig) -> Result<Box<dyn Filter>, ConfigError>;

/// A filter which can be constructed from its chain definition.
pub trait FromConfig: Filter + Sized {
    fn from_config(config: &FilterConfig) -> Result<Self, ConfigError>;
}

fn factory<F: FromConfig>(config: &FilterConfig) -> Result<Box<dyn Filter>, ConfigError> {
    Ok(Box::new(F::from_config(config)?))
}

/// Every filter which can be referenced from a chain definition.
///
/// Names are matched case-insensitively, a trailing `filter` suffix is ignored.
pub static FILTERS: &[(&str, FilterFactory)] = &[
    ("bandwidth", factory::<BandwidthFilter>),
    ("reversebandwidth", factory::<ReverseBandwidthFilter>),
    ("maxtransfers", factory::<MaxTransfersFilter>),
    ("maxtransfersperuser", factory::<MaxTransfersPerUserFilter>),
    ("mintimeonline", factory::<MinTimeOnlineFilter>),
    ("slavetop", factory::<SlaveTopFilter>),
    ("maxuploadsperslave", factory::<MaxUploadsPerSlaveFilter>),
    ("matchdir", factory::<MatchdirFilter>),
    ("minfreespace", factory::<MinFreeSpaceFilter>),
];

fn normalise_name(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();
    if let Some(stripped) = lower.strip_suffix("filter") {
        if !stripped.is_empty() {
            return stripped.to_string();
        }
    }
    lower
}

/// Looks up the factory of a filter by its configured name.
pub fn lookup(name: &str) -> Option<FilterFactory> {
    let name = normalise_name(name);
    FILTERS
        .iter()
        .find(|(registered, _)| *registered == name)
        .map(|(_, factory)| *factory)
}

/// Constructs the filter described by the configuration.
pub fn build_filter(config: &FilterConfig) -> Result<Box<dyn Filter>, ConfigError> {
    let factory =
        lookup(&config.filter).ok_or_else(|| ConfigError::UnknownFilter(config.filter.clone()))?;
    factory(config)
}
