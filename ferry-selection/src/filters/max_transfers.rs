use super::FromConfig;
use crate::config::FilterConfig;
use crate::error::{ConfigError, SelectionError};
use crate::filter::{collect_statuses, Filter, FilterContext};
use crate::score::ScoreChart;

#[derive(Debug, Clone)]
/// Eliminates slaves running more than `maxtransfers` transfers in the
/// transfer direction.
pub struct MaxTransfersFilter {
    max_transfers: u32,
}

impl MaxTransfersFilter {
    pub fn new(max_transfers: u32) -> Self {
        Self { max_transfers }
    }
}

impl FromConfig for MaxTransfersFilter {
    fn from_config(config: &FilterConfig) -> Result<Self, ConfigError> {
        let max = config.get_u64("maxtransfers")?;
        Ok(Self::new(u32::try_from(max).unwrap_or(u32::MAX)))
    }
}

impl Filter for MaxTransfersFilter {
    fn name(&self) -> &'static str {
        "maxtransfers"
    }

    fn process(
        &self,
        chart: &mut ScoreChart,
        ctx: &FilterContext<'_>,
    ) -> Result<(), SelectionError> {
        let statuses = collect_statuses(self.name(), chart, ctx.registry);
        chart.retain(|score| {
            statuses
                .get(score.name())
                .map(|status| status.active_transfers(ctx.direction) <= self.max_transfers)
                .unwrap_or(false)
        });
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Eliminates slaves on which the requesting user already has
/// `maxtransfers` or more transfers open in the transfer direction.
pub struct MaxTransfersPerUserFilter {
    max_transfers: u32,
}

impl MaxTransfersPerUserFilter {
    pub fn new(max_transfers: u32) -> Self {
        Self { max_transfers }
    }
}

impl FromConfig for MaxTransfersPerUserFilter {
    fn from_config(config: &FilterConfig) -> Result<Self, ConfigError> {
        let max = config.get_u64("maxtransfers")?;
        Ok(Self::new(u32::try_from(max).unwrap_or(u32::MAX)))
    }
}

impl Filter for MaxTransfersPerUserFilter {
    fn name(&self) -> &'static str {
        "maxtransfersperuser"
    }

    fn process(
        &self,
        chart: &mut ScoreChart,
        ctx: &FilterContext<'_>,
    ) -> Result<(), SelectionError> {
        const NO_SLAVES: &str = "all slaves unavailable due to existing open transfers";

        if chart.is_empty() {
            return Err(SelectionError::no_available_slave(NO_SLAVES));
        }

        let Some(requester) = ctx.requester else {
            return Ok(());
        };

        chart.retain(|score| {
            requester.open_transfers_on(score.name(), ctx.direction) < self.max_transfers
        });

        if chart.is_empty() {
            debug!(user = %requester.name, "User has reached the transfer limit on every slave.");
            return Err(SelectionError::no_available_slave(NO_SLAVES));
        }

        Ok(())
    }
}
