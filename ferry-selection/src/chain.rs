use ferry_node::{SlaveName, SlaveRegistry};

use crate::config::{FilterConfig, Purpose};
use crate::error::{ConfigError, SelectionError};
use crate::filter::{Filter, FilterContext};
use crate::filters::build_filter;
use crate::score::{ScoreChart, SlaveScore};

#[derive(Debug)]
/// An ordered pipeline of filters used for one placement purpose.
pub struct FilterChain {
    purpose: Purpose,
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    /// Creates a chain from already constructed filters.
    pub fn new(purpose: Purpose, filters: Vec<Box<dyn Filter>>) -> Self {
        Self { purpose, filters }
    }

    /// Constructs every filter of the definition, failing on the first
    /// invalid entry.
    pub fn from_config(purpose: Purpose, configs: &[FilterConfig]) -> Result<Self, ConfigError> {
        let filters = configs
            .iter()
            .map(build_filter)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(purpose, filters))
    }

    /// Checks every filter against the registered slaves.
    pub fn validate(&self, registry: &dyn SlaveRegistry) -> Result<(), ConfigError> {
        self.filters
            .iter()
            .try_for_each(|filter| filter.validate(registry))
    }

    #[inline]
    pub fn purpose(&self) -> Purpose {
        self.purpose
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Runs every filter over the chart in order.
    pub fn run(&self, chart: &mut ScoreChart, ctx: &FilterContext<'_>) -> Result<(), SelectionError> {
        for filter in self.filters.iter() {
            filter.process(chart, ctx)?;
            trace!(
                purpose = %self.purpose,
                filter = filter.name(),
                remaining = chart.len(),
                "Applied filter.",
            );
        }
        Ok(())
    }

    /// Runs the chain and returns the best remaining candidate.
    pub fn select(
        &self,
        mut chart: ScoreChart,
        ctx: &FilterContext<'_>,
    ) -> Result<SlaveName, SelectionError> {
        self.run(&mut chart, ctx)?;
        chart
            .best()
            .map(|score| score.name().to_string())
            .ok_or_else(|| {
                SelectionError::no_available_slave(format!(
                    "every candidate was eliminated by the {} filters",
                    self.purpose,
                ))
            })
    }

    /// Runs the chain for diagnostics, ignoring filters which fail.
    pub fn explain(&self, mut chart: ScoreChart, ctx: &FilterContext<'_>) -> Vec<SlaveScore> {
        for filter in self.filters.iter() {
            if let Err(e) = filter.process(&mut chart, ctx) {
                debug!(filter = filter.name(), error = ?e, "Ignoring filter failure.");
            }
        }
        chart.scores().to_vec()
    }
}
