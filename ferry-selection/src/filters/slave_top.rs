use std::collections::BTreeMap;

use ferry_node::VirtualPath;
use itertools::Itertools;

use super::FromConfig;
use crate::config::FilterConfig;
use crate::error::{ConfigError, SelectionError};
use crate::filter::{Filter, FilterContext};
use crate::score::ScoreChart;

#[derive(Debug, Clone)]
/// Rewards the `topslaves` slaves holding the most files of the release
/// the path belongs to.
///
/// The release is the directory directly below the section of the path,
/// files placed directly in the section are not counted. With an `assign`
/// of `0` every slave outside the top is eliminated instead.
pub struct SlaveTopFilter {
    top_slaves: usize,
    assign: i64,
}

impl SlaveTopFilter {
    pub fn new(top_slaves: usize, assign: i64) -> Self {
        Self { top_slaves, assign }
    }

    fn release_of(path: &VirtualPath, section: &VirtualPath) -> Option<VirtualPath> {
        if !section.is_ancestor_of(path) {
            return None;
        }

        let depth = section.components().count();
        let release = path.components().nth(depth)?;
        Some(section.join(release))
    }
}

impl FromConfig for SlaveTopFilter {
    fn from_config(config: &FilterConfig) -> Result<Self, ConfigError> {
        let top_slaves = config.get_u64("topslaves")?;
        Ok(Self::new(
            usize::try_from(top_slaves).unwrap_or(usize::MAX),
            config.get_i64("assign")?,
        ))
    }
}

impl Filter for SlaveTopFilter {
    fn name(&self) -> &'static str {
        "slavetop"
    }

    fn process(
        &self,
        chart: &mut ScoreChart,
        ctx: &FilterContext<'_>,
    ) -> Result<(), SelectionError> {
        let Some(path) = ctx.path else {
            return Ok(());
        };
        let Some(release) = ctx
            .vfs
            .section_of(path)
            .and_then(|section| Self::release_of(path, &section))
        else {
            return Ok(());
        };

        let files = match ctx.vfs.files_under(&release) {
            Ok(files) => files,
            Err(e) => {
                debug!(release = %release, error = ?e, "Unable to list release files.");
                return Ok(());
            },
        };

        let mut counts = BTreeMap::<&str, usize>::new();
        for holder in files.iter().flat_map(|(_, holders)| holders) {
            *counts.entry(holder.as_str()).or_default() += 1;
        }

        // Stable sort keeps chart order between slaves with equal counts.
        let top = chart
            .scores()
            .iter()
            .map(|score| score.name())
            .filter_map(|name| counts.get(name).map(|count| (name.to_string(), *count)))
            .sorted_by(|a, b| b.1.cmp(&a.1))
            .take(self.top_slaves)
            .map(|(name, _)| name)
            .collect::<Vec<_>>();

        if top.is_empty() {
            return Ok(());
        }

        if self.assign == 0 {
            chart.retain(|score| top.iter().any(|name| name == score.name()));
        } else {
            for name in top.iter() {
                chart.add_score(name, self.assign);
            }
        }

        Ok(())
    }
}
