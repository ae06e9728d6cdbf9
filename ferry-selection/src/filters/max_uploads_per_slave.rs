use super::FromConfig;
use crate::config::FilterConfig;
use crate::error::{ConfigError, SelectionError};
use crate::filter::{Filter, FilterContext};
use crate::score::ScoreChart;

#[derive(Debug, Clone, Default)]
/// Eliminates slaves sending a file for a job from the destination
/// candidates, a slave is never both ends of job transfers at once.
pub struct MaxUploadsPerSlaveFilter;

impl FromConfig for MaxUploadsPerSlaveFilter {
    fn from_config(_config: &FilterConfig) -> Result<Self, ConfigError> {
        Ok(Self)
    }
}

impl Filter for MaxUploadsPerSlaveFilter {
    fn name(&self) -> &'static str {
        "maxuploadsperslave"
    }

    fn process(
        &self,
        chart: &mut ScoreChart,
        ctx: &FilterContext<'_>,
    ) -> Result<(), SelectionError> {
        if let Some(source) = ctx.source_slave {
            chart.remove(source);
        }
        if let Some(sources) = ctx.job_sources {
            chart.retain(|score| !sources.contains(score.name()));
        }
        Ok(())
    }
}
