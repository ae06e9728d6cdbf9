use ferry_node::Direction;

use super::FromConfig;
use crate::config::FilterConfig;
use crate::error::{ConfigError, SelectionError};
use crate::filter::{collect_statuses, Filter, FilterContext};
use crate::score::ScoreChart;

fn penalise_throughput(
    filter: &'static str,
    chart: &mut ScoreChart,
    ctx: &FilterContext<'_>,
    direction: Direction,
    multiplier: f64,
) {
    let statuses = collect_statuses(filter, chart, ctx.registry);
    for score in chart.scores_mut() {
        let Some(status) = statuses.get(score.name()) else {
            continue;
        };

        let penalty = status.throughput(direction) as f64 * multiplier;
        score.add_score(-(penalty as i64));
    }
}

#[derive(Debug, Clone)]
/// Penalises slaves by their current throughput in the transfer direction.
pub struct BandwidthFilter {
    multiplier: f64,
}

impl BandwidthFilter {
    pub fn new(multiplier: f64) -> Self {
        Self { multiplier }
    }
}

impl FromConfig for BandwidthFilter {
    fn from_config(config: &FilterConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.get_multiplier("multiplier")?))
    }
}

impl Filter for BandwidthFilter {
    fn name(&self) -> &'static str {
        "bandwidth"
    }

    fn process(
        &self,
        chart: &mut ScoreChart,
        ctx: &FilterContext<'_>,
    ) -> Result<(), SelectionError> {
        penalise_throughput(self.name(), chart, ctx, ctx.direction, self.multiplier);
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Penalises slaves by their current throughput in the opposite direction
/// of the transfer.
pub struct ReverseBandwidthFilter {
    multiplier: f64,
}

impl ReverseBandwidthFilter {
    pub fn new(multiplier: f64) -> Self {
        Self { multiplier }
    }
}

impl FromConfig for ReverseBandwidthFilter {
    fn from_config(config: &FilterConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.get_multiplier("multiplier")?))
    }
}

impl Filter for ReverseBandwidthFilter {
    fn name(&self) -> &'static str {
        "reversebandwidth"
    }

    fn process(
        &self,
        chart: &mut ScoreChart,
        ctx: &FilterContext<'_>,
    ) -> Result<(), SelectionError> {
        penalise_throughput(
            self.name(),
            chart,
            ctx,
            ctx.direction.opposite(),
            self.multiplier,
        );
        Ok(())
    }
}
