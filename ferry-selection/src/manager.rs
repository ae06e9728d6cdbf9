use std::collections::BTreeSet;
use std::sync::Arc;

use ferry_node::{
    get_unix_timestamp_ms,
    Direction,
    SlaveName,
    SlaveRegistry,
    Vfs,
    VirtualPath,
};
use parking_lot::RwLock;

use crate::chain::FilterChain;
use crate::config::{Purpose, SelectionConfig};
use crate::error::{ConfigError, SelectionError};
use crate::filter::{FilterContext, Requester};
use crate::score::{ScoreChart, SlaveScore};

#[derive(Debug)]
struct FilterChains {
    upload: FilterChain,
    download: FilterChain,
    job_upload: FilterChain,
    job_download: FilterChain,
}

impl FilterChains {
    fn from_config(config: &SelectionConfig) -> Result<Self, ConfigError> {
        let build = |purpose| FilterChain::from_config(purpose, config.chain(purpose));
        Ok(Self {
            upload: build(Purpose::Upload)?,
            download: build(Purpose::Download)?,
            job_upload: build(Purpose::JobUpload)?,
            job_download: build(Purpose::JobDownload)?,
        })
    }

    fn validate(&self, registry: &dyn SlaveRegistry) -> Result<(), ConfigError> {
        self.upload.validate(registry)?;
        self.download.validate(registry)?;
        self.job_upload.validate(registry)?;
        self.job_download.validate(registry)
    }

    fn get(&self, purpose: Purpose) -> &FilterChain {
        match purpose {
            Purpose::Upload => &self.upload,
            Purpose::Download => &self.download,
            Purpose::JobUpload => &self.job_upload,
            Purpose::JobDownload => &self.job_download,
        }
    }
}

struct Selection<'a> {
    purpose: Purpose,
    direction: Direction,
    path: Option<&'a VirtualPath>,
    requester: Option<&'a Requester>,
    source_slave: Option<&'a str>,
    job_sources: Option<&'a BTreeSet<SlaveName>>,
}

#[derive(Clone)]
/// Picks slaves for transfers by running the configured filter chains.
///
/// Every decision builds a fresh [ScoreChart] from the online candidates,
/// so a manager can be shared freely between tasks.
pub struct SlaveSelectionManager {
    registry: Arc<dyn SlaveRegistry>,
    vfs: Arc<dyn Vfs>,
    chains: Arc<RwLock<Arc<FilterChains>>>,
}

impl SlaveSelectionManager {
    /// Creates a new manager, failing if any chain is malformed.
    pub fn new(
        registry: Arc<dyn SlaveRegistry>,
        vfs: Arc<dyn Vfs>,
        config: &SelectionConfig,
    ) -> Result<Self, ConfigError> {
        let chains = FilterChains::from_config(config)?;
        chains.validate(registry.as_ref())?;
        Ok(Self {
            registry,
            vfs,
            chains: Arc::new(RwLock::new(Arc::new(chains))),
        })
    }

    /// Replaces every chain with the new definition.
    ///
    /// Nothing is replaced if any chain fails to build, decisions already
    /// running finish with the previous chains.
    pub fn reload(&self, config: &SelectionConfig) -> Result<(), ConfigError> {
        let chains = FilterChains::from_config(config)?;
        chains.validate(self.registry.as_ref())?;
        *self.chains.write() = Arc::new(chains);
        info!("Reloaded slave selection filter chains.");
        Ok(())
    }

    #[inline]
    pub fn registry(&self) -> &Arc<dyn SlaveRegistry> {
        &self.registry
    }

    #[inline]
    pub fn vfs(&self) -> &Arc<dyn Vfs> {
        &self.vfs
    }

    fn chains(&self) -> Arc<FilterChains> {
        self.chains.read().clone()
    }

    fn online_candidates<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a SlaveName>,
    ) -> Vec<SlaveName> {
        candidates
            .into_iter()
            .filter(|name| self.registry.is_available(name))
            .cloned()
            .collect()
    }

    fn run(
        &self,
        selection: Selection<'_>,
        candidates: Vec<SlaveName>,
    ) -> Result<SlaveName, SelectionError> {
        let chains = self.chains();
        let ctx = FilterContext {
            direction: selection.direction,
            path: selection.path,
            requester: selection.requester,
            source_slave: selection.source_slave,
            job_sources: selection.job_sources,
            registry: self.registry.as_ref(),
            vfs: self.vfs.as_ref(),
            now_ms: get_unix_timestamp_ms(),
        };

        let result = chains
            .get(selection.purpose)
            .select(ScoreChart::new(candidates), &ctx);

        match result.as_ref() {
            Ok(slave) => debug!(
                purpose = %selection.purpose,
                path = ?selection.path.map(|p| p.as_str()),
                slave = %slave,
                "Selected slave.",
            ),
            Err(e) => debug!(
                purpose = %selection.purpose,
                path = ?selection.path.map(|p| p.as_str()),
                error = %e,
                "Unable to select slave.",
            ),
        }

        result
    }

    /// Picks the best of the given candidates using the chain of `purpose`.
    ///
    /// Offline candidates are never considered, ties are won by the
    /// candidate given first.
    pub fn select_slave(
        &self,
        purpose: Purpose,
        candidates: &[SlaveName],
        direction: Direction,
        path: Option<&VirtualPath>,
        requester: Option<&Requester>,
    ) -> Result<SlaveName, SelectionError> {
        let selection = Selection {
            purpose,
            direction,
            path,
            requester,
            source_slave: None,
            job_sources: None,
        };
        self.run(selection, self.online_candidates(candidates))
    }

    /// Picks the online slave a user should upload `path` to.
    pub fn select_for_upload(
        &self,
        path: &VirtualPath,
        requester: Option<&Requester>,
    ) -> Result<SlaveName, SelectionError> {
        let selection = Selection {
            purpose: Purpose::Upload,
            direction: Direction::Upload,
            path: Some(path),
            requester,
            source_slave: None,
            job_sources: None,
        };
        self.run(selection, self.registry.online_slaves())
    }

    /// Picks the online holder of `path` a user should download from.
    pub fn select_for_download(
        &self,
        path: &VirtualPath,
        requester: Option<&Requester>,
    ) -> Result<SlaveName, SelectionError> {
        let holders = self
            .vfs
            .slaves_holding(path)
            .map_err(|e| SelectionError::no_available_slave(e.to_string()))?;

        let selection = Selection {
            purpose: Purpose::Download,
            direction: Direction::Download,
            path: Some(path),
            requester,
            source_slave: None,
            job_sources: None,
        };
        self.run(selection, self.online_candidates(&holders))
    }

    /// Picks the holder of `path` a job should copy from, skipping the
    /// slaves in `exclude`.
    pub fn select_for_job_download(
        &self,
        path: &VirtualPath,
        exclude: &BTreeSet<SlaveName>,
    ) -> Result<SlaveName, SelectionError> {
        let holders = self
            .vfs
            .slaves_holding(path)
            .map_err(|e| SelectionError::no_available_slave(e.to_string()))?;

        let candidates = self.online_candidates(holders.difference(exclude));
        let selection = Selection {
            purpose: Purpose::JobDownload,
            direction: Direction::Download,
            path: Some(path),
            requester: None,
            source_slave: None,
            job_sources: None,
        };
        self.run(selection, candidates)
    }

    /// Picks the slave a job should copy `path` to from `source`.
    ///
    /// `job_sources` holds the slaves already sending files for running
    /// job transfers.
    pub fn select_for_job_upload(
        &self,
        path: &VirtualPath,
        candidates: &[SlaveName],
        source: &str,
        job_sources: &BTreeSet<SlaveName>,
    ) -> Result<SlaveName, SelectionError> {
        let selection = Selection {
            purpose: Purpose::JobUpload,
            direction: Direction::Upload,
            path: Some(path),
            requester: None,
            source_slave: Some(source),
            job_sources: Some(job_sources),
        };
        self.run(selection, self.online_candidates(candidates))
    }

    /// The scores every online candidate ends up with, for diagnostics.
    ///
    /// Filters which fail are skipped rather than aborting the run.
    pub fn explain(
        &self,
        purpose: Purpose,
        candidates: &[SlaveName],
        direction: Direction,
        path: Option<&VirtualPath>,
    ) -> Vec<SlaveScore> {
        let chains = self.chains();
        let ctx = FilterContext {
            direction,
            path,
            requester: None,
            source_slave: None,
            job_sources: None,
            registry: self.registry.as_ref(),
            vfs: self.vfs.as_ref(),
            now_ms: get_unix_timestamp_ms(),
        };

        let chart = ScoreChart::new(self.online_candidates(candidates));
        chains.get(purpose).explain(chart, &ctx)
    }
}

#[cfg(test)]
mod tests {
    use ferry_node::test_utils::MemoryVfs;
    use ferry_node::SlaveStatus;

    use super::*;
    use crate::config::FilterConfig;
    use crate::filter::test_support::online_registry;

    fn manager(config: &SelectionConfig) -> SlaveSelectionManager {
        let registry = online_registry(&[
            ("a", SlaveStatus::default()),
            ("b", SlaveStatus::default()),
            ("c", SlaveStatus::default()),
        ]);
        SlaveSelectionManager::new(Arc::new(registry), Arc::new(MemoryVfs::default()), config)
            .expect("Create manager.")
    }

    #[test]
    fn test_empty_chain_picks_first_candidate() {
        let manager = manager(&SelectionConfig::default());
        let candidates = vec!["c".to_string(), "a".to_string()];

        for _ in 0..5 {
            let slave = manager
                .select_slave(Purpose::Upload, &candidates, Direction::Upload, None, None)
                .expect("Select slave.");
            assert_eq!(slave, "c");
        }
    }

    #[test]
    fn test_unknown_candidates_are_never_selected() {
        let manager = manager(&SelectionConfig::default());
        let candidates = vec!["ghost".to_string(), "b".to_string()];

        let slave = manager
            .select_slave(Purpose::Download, &candidates, Direction::Download, None, None)
            .expect("Select slave.");
        assert_eq!(slave, "b");

        let err = manager
            .select_slave(Purpose::Download, &["ghost".to_string()], Direction::Download, None, None)
            .expect_err("No candidate should be available.");
        assert!(matches!(err, SelectionError::NoAvailableSlave { .. }));
    }

    #[test]
    fn test_reload_swaps_chains() {
        let manager = manager(&SelectionConfig::default());
        let candidates = vec!["a".to_string(), "b".to_string()];
        let path = VirtualPath::new("/mp3/release");

        let config = SelectionConfig::default().with_chain(
            Purpose::Upload,
            vec![FilterConfig::new("matchdir")
                .with_param("match", "/mp3/*")
                .with_param("assign", "a-remove")],
        );
        manager.reload(&config).expect("Reload chains.");

        let slave = manager
            .select_slave(Purpose::Upload, &candidates, Direction::Upload, Some(&path), None)
            .expect("Select slave.");
        assert_eq!(slave, "b");

        let broken = SelectionConfig::default()
            .with_chain(Purpose::Upload, vec![FilterConfig::new("unknown")]);
        assert!(manager.reload(&broken).is_err());

        // The previous chains stay in place.
        let slave = manager
            .select_slave(Purpose::Upload, &candidates, Direction::Upload, Some(&path), None)
            .expect("Select slave.");
        assert_eq!(slave, "b");
    }

    #[test]
    fn test_strict_chains_are_checked_against_the_registry() {
        let strict = |assign: &str| {
            SelectionConfig::default().with_chain(
                Purpose::JobUpload,
                vec![FilterConfig::new("matchdir")
                    .with_param("match", "/mp3/*")
                    .with_param("assign", assign)
                    .with_param("strict", true)],
            )
        };

        let manager = manager(&strict("a+10,c-remove"));
        let err = manager
            .reload(&strict("a+10,ghost+10"))
            .expect_err("Unknown slave should be rejected.");
        assert!(matches!(err, ConfigError::UnknownSlave { ref slave, .. } if slave == "ghost"));

        let registry = online_registry(&[("a", SlaveStatus::default())]);
        let result = SlaveSelectionManager::new(
            Arc::new(registry),
            Arc::new(MemoryVfs::default()),
            &strict("ghost+10"),
        );
        assert!(matches!(result, Err(ConfigError::UnknownSlave { .. })));
    }
}
