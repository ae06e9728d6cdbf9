use super::FromConfig;
use crate::config::FilterConfig;
use crate::error::{ConfigError, SelectionError};
use crate::filter::{collect_statuses, Filter, FilterContext};
use crate::score::ScoreChart;

#[derive(Debug, Clone)]
/// Penalises slaves with less than `minfreespace` bytes available by the
/// size of the shortfall, a multiplier of `0` eliminates them instead.
pub struct MinFreeSpaceFilter {
    min_free_space: u64,
    multiplier: f64,
}

impl MinFreeSpaceFilter {
    pub fn new(min_free_space: u64, multiplier: f64) -> Self {
        Self {
            min_free_space,
            multiplier,
        }
    }
}

impl FromConfig for MinFreeSpaceFilter {
    fn from_config(config: &FilterConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.get_u64("minfreespace")?,
            config.get_multiplier("multiplier")?,
        ))
    }
}

impl Filter for MinFreeSpaceFilter {
    fn name(&self) -> &'static str {
        "minfreespace"
    }

    fn process(
        &self,
        chart: &mut ScoreChart,
        ctx: &FilterContext<'_>,
    ) -> Result<(), SelectionError> {
        let statuses = collect_statuses(self.name(), chart, ctx.registry);
        let shortfall = |name: &str| {
            statuses
                .get(name)
                .map(|status| self.min_free_space.saturating_sub(status.disk_space_available))
                .unwrap_or_default()
        };

        if self.multiplier == 0.0 {
            chart.retain(|score| shortfall(score.name()) == 0);
            return Ok(());
        }

        for score in chart.scores_mut() {
            let penalty = shortfall(score.name()) as f64 * self.multiplier;
            score.add_score(-(penalty as i64));
        }
        Ok(())
    }
}
