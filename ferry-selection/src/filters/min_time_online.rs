use std::time::Duration;

use super::FromConfig;
use crate::config::FilterConfig;
use crate::error::{ConfigError, SelectionError};
use crate::filter::{collect_statuses, Filter, FilterContext};
use crate::score::ScoreChart;

#[derive(Debug, Clone)]
/// Penalises slaves which finished a transfer in the same direction less
/// than `mintime` ago, proportionally to how recent it was.
pub struct MinTimeOnlineFilter {
    min_time: Duration,
    multiplier: f64,
}

impl MinTimeOnlineFilter {
    pub fn new(min_time: Duration, multiplier: f64) -> Self {
        Self {
            min_time,
            multiplier,
        }
    }
}

impl FromConfig for MinTimeOnlineFilter {
    fn from_config(config: &FilterConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.get_duration("mintime")?,
            config.get_multiplier("multiplier")?,
        ))
    }
}

impl Filter for MinTimeOnlineFilter {
    fn name(&self) -> &'static str {
        "mintimeonline"
    }

    fn process(
        &self,
        chart: &mut ScoreChart,
        ctx: &FilterContext<'_>,
    ) -> Result<(), SelectionError> {
        let min_time_ms = self.min_time.as_millis() as u64;
        let statuses = collect_statuses(self.name(), chart, ctx.registry);

        for score in chart.scores_mut() {
            let last = statuses
                .get(score.name())
                .and_then(|status| status.last_transfer(ctx.direction));
            let Some(last) = last else {
                continue;
            };

            let elapsed = ctx.now_ms.saturating_sub(last);
            if elapsed < min_time_ms {
                let penalty = (min_time_ms - elapsed) as f64 * self.multiplier;
                score.add_score(-(penalty as i64));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ferry_node::test_utils::MemoryVfs;
    use ferry_node::{Direction, SlaveStatus, TransferStats};

    use super::*;
    use crate::filter::test_support::{context, online_registry};

    fn last_upload(at: Option<u64>) -> SlaveStatus {
        SlaveStatus::default().with_transfers(
            Direction::Upload,
            TransferStats {
                last_transfer: at,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_recent_transfers_are_penalised() {
        let registry = online_registry(&[
            ("recent", last_upload(Some(999_000))),
            ("old", last_upload(Some(100_000))),
            ("never", last_upload(None)),
        ]);
        let vfs = MemoryVfs::default();
        // `now_ms` is 1_000_000 in the test context.
        let ctx = context(Direction::Upload, &registry, &vfs);

        let mut chart = ScoreChart::new(["recent", "old", "never"]);
        MinTimeOnlineFilter::new(Duration::from_secs(5), 2.0)
            .process(&mut chart, &ctx)
            .expect("Process filter.");

        assert_eq!(chart.get("recent").map(|s| s.score()), Some(-8_000));
        assert_eq!(chart.get("old").map(|s| s.score()), Some(0));
        assert_eq!(chart.get("never").map(|s| s.score()), Some(0));
        assert_eq!(chart.best().map(|s| s.name()), Some("old"));
    }
}
