use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::client::SlaveClient;
use crate::error::{NodeError, RemoteError};
use crate::slave::{SlaveName, SlaveStatus};
use crate::statistics::ClusterStatistics;

/// Read access to the slaves known to the master.
pub trait SlaveRegistry: Send + Sync + 'static {
    /// Every registered slave, online or not.
    fn slaves(&self) -> Vec<SlaveName>;

    fn contains(&self, name: &str) -> bool;

    /// Returns if the slave is registered and currently online.
    fn is_available(&self, name: &str) -> bool;

    /// The latest status of an online slave.
    fn status(&self, name: &str) -> Result<SlaveStatus, RemoteError>;

    /// The control client of an online slave.
    fn client(&self, name: &str) -> Result<Arc<dyn SlaveClient>, RemoteError>;

    /// A watcher over the set of online slaves.
    fn watch_online(&self) -> watch::Receiver<BTreeSet<SlaveName>>;

    /// The slaves currently online.
    fn online_slaves(&self) -> Vec<SlaveName> {
        self.slaves()
            .into_iter()
            .filter(|name| self.is_available(name))
            .collect()
    }
}

struct SlaveEntry {
    client: Arc<dyn SlaveClient>,
    status: Option<SlaveStatus>,
}

#[derive(Clone)]
/// The master side registry of slaves.
///
/// Slaves are registered offline and become available once a status
/// has been reported for them. Every change of the online set is
/// published to watchers.
pub struct SlaveManager {
    slaves: Arc<RwLock<BTreeMap<SlaveName, SlaveEntry>>>,
    online_tx: Arc<watch::Sender<BTreeSet<SlaveName>>>,
    statistics: ClusterStatistics,
}

impl Default for SlaveManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SlaveManager {
    pub fn new() -> Self {
        let (online_tx, _) = watch::channel(BTreeSet::new());
        Self {
            slaves: Default::default(),
            online_tx: Arc::new(online_tx),
            statistics: ClusterStatistics::default(),
        }
    }

    #[inline]
    pub fn statistics(&self) -> ClusterStatistics {
        self.statistics.clone()
    }

    /// Registers a new, offline slave.
    pub fn add_slave(
        &self,
        name: impl Into<SlaveName>,
        client: Arc<dyn SlaveClient>,
    ) -> Result<(), NodeError> {
        let name = name.into();
        let mut slaves = self.slaves.write();
        if slaves.contains_key(&name) {
            return Err(NodeError::DuplicateSlave(name));
        }

        info!(slave = %name, "Registered slave.");
        slaves.insert(
            name,
            SlaveEntry {
                client,
                status: None,
            },
        );
        self.statistics
            .num_known_slaves
            .store(slaves.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Removes the slave from the registry entirely.
    pub fn remove_slave(&self, name: &str) -> Result<(), NodeError> {
        let mut slaves = self.slaves.write();
        let entry = slaves
            .remove(name)
            .ok_or_else(|| NodeError::UnknownSlave(name.to_string()))?;

        info!(slave = %name, "Removed slave.");
        self.statistics
            .num_known_slaves
            .store(slaves.len() as u64, Ordering::Relaxed);
        if entry.status.is_some() {
            self.publish_online(&slaves);
        }
        Ok(())
    }

    /// Marks the slave online with its first status report.
    pub fn set_online(&self, name: &str, status: SlaveStatus) -> Result<(), NodeError> {
        let mut slaves = self.slaves.write();
        let entry = slaves
            .get_mut(name)
            .ok_or_else(|| NodeError::UnknownSlave(name.to_string()))?;

        let was_online = entry.status.replace(status).is_some();
        if !was_online {
            info!(slave = %name, "Slave is now online.");
            self.publish_online(&slaves);
        }
        Ok(())
    }

    /// Marks the slave offline.
    pub fn set_offline(&self, name: &str) -> Result<(), NodeError> {
        let mut slaves = self.slaves.write();
        let entry = slaves
            .get_mut(name)
            .ok_or_else(|| NodeError::UnknownSlave(name.to_string()))?;

        if entry.status.take().is_some() {
            info!(slave = %name, "Slave has gone offline.");
            self.statistics
                .num_disconnects
                .fetch_add(1, Ordering::Relaxed);
            self.publish_online(&slaves);
        }
        Ok(())
    }

    /// Replaces the status of an online slave.
    pub fn update_status(&self, name: &str, status: SlaveStatus) -> Result<(), NodeError> {
        let mut slaves = self.slaves.write();
        let entry = slaves
            .get_mut(name)
            .ok_or_else(|| NodeError::UnknownSlave(name.to_string()))?;

        if entry.status.is_none() {
            debug!(slave = %name, "Ignoring status update for offline slave.");
            return Ok(());
        }

        entry.status = Some(status);
        Ok(())
    }

    fn publish_online(&self, slaves: &BTreeMap<SlaveName, SlaveEntry>) {
        let online = slaves
            .iter()
            .filter(|(_, entry)| entry.status.is_some())
            .map(|(name, _)| name.clone())
            .collect::<BTreeSet<_>>();

        self.statistics
            .num_online_slaves
            .store(online.len() as u64, Ordering::Relaxed);
        self.online_tx.send_replace(online);
    }
}

impl SlaveRegistry for SlaveManager {
    fn slaves(&self) -> Vec<SlaveName> {
        self.slaves.read().keys().cloned().collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.slaves.read().contains_key(name)
    }

    fn is_available(&self, name: &str) -> bool {
        self.slaves
            .read()
            .get(name)
            .map(|entry| entry.status.is_some())
            .unwrap_or(false)
    }

    fn status(&self, name: &str) -> Result<SlaveStatus, RemoteError> {
        self.slaves
            .read()
            .get(name)
            .and_then(|entry| entry.status)
            .ok_or_else(|| RemoteError::Unavailable(name.to_string()))
    }

    fn client(&self, name: &str) -> Result<Arc<dyn SlaveClient>, RemoteError> {
        self.slaves
            .read()
            .get(name)
            .filter(|entry| entry.status.is_some())
            .map(|entry| entry.client.clone())
            .ok_or_else(|| RemoteError::Unavailable(name.to_string()))
    }

    fn watch_online(&self) -> watch::Receiver<BTreeSet<SlaveName>> {
        self.online_tx.subscribe()
    }
}
