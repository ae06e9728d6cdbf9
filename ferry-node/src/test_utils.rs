//! In-memory slaves and file metadata for exercising the ferry services
//! without any network or disk.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::client::{ConnectInfo, SlaveClient, TransferIndex, TransferStatus};
use crate::error::{RemoteError, VfsError};
use crate::path::VirtualPath;
use crate::slave::SlaveName;
use crate::vfs::Vfs;

#[derive(Clone)]
/// Pairs listening slots with connecting slots between [MemorySlave]s.
pub struct MemoryNetwork {
    listeners: Arc<Mutex<HashMap<SocketAddr, (Weak<MemorySlaveInner>, TransferIndex)>>>,
    next_port: Arc<AtomicU16>,
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self {
            listeners: Default::default(),
            next_port: Arc::new(AtomicU16::new(40_000)),
        }
    }
}

impl MemoryNetwork {
    fn bind(&self, slave: &Arc<MemorySlaveInner>, transfer: TransferIndex) -> SocketAddr {
        let port = self.next_port.fetch_add(1, Ordering::Relaxed);
        let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), port);
        self.listeners
            .lock()
            .insert(addr, (Arc::downgrade(slave), transfer));
        addr
    }

    fn accept(&self, addr: &SocketAddr) -> Option<(MemorySlave, TransferIndex)> {
        let (slave, transfer) = self.listeners.lock().remove(addr)?;
        let inner = slave.upgrade()?;
        Some((MemorySlave { inner }, transfer))
    }
}

#[derive(Debug, Clone, Default)]
/// Faults injected into a [MemorySlave].
pub struct SlaveFaults {
    /// Flip every byte the slave receives.
    pub corrupt_received: bool,
    /// Report `0` for every checksum.
    pub no_checksums: bool,
    /// Transfers on this slave never report being finished.
    pub never_finish: bool,
    /// Refuse secure transfer slots.
    pub no_secure: bool,
    /// Fail every status poll with the given error.
    pub fail_status: Option<RemoteError>,
}

#[derive(Debug, Default)]
struct MemoryTransfer {
    peer: Option<(MemorySlave, TransferIndex)>,
    path: Option<VirtualPath>,
    receiving: bool,
    finished: bool,
    checksum: u64,
    transferred: u64,
    error: Option<RemoteError>,
    aborted: Option<String>,
    listen_addr: Option<SocketAddr>,
}

struct MemorySlaveInner {
    name: SlaveName,
    network: MemoryNetwork,
    online: AtomicBool,
    files: Mutex<BTreeMap<VirtualPath, Vec<u8>>>,
    transfers: Mutex<HashMap<TransferIndex, MemoryTransfer>>,
    next_transfer: AtomicU64,
    num_aborts: AtomicU64,
    faults: RwLock<SlaveFaults>,
}

#[derive(Clone)]
/// A slave which stores its files in memory.
pub struct MemorySlave {
    inner: Arc<MemorySlaveInner>,
}

impl std::fmt::Debug for MemorySlave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySlave")
            .field("name", &self.inner.name)
            .finish()
    }
}

impl MemorySlave {
    pub fn new(name: impl Into<SlaveName>, network: &MemoryNetwork) -> Self {
        Self {
            inner: Arc::new(MemorySlaveInner {
                name: name.into(),
                network: network.clone(),
                online: AtomicBool::new(true),
                files: Default::default(),
                transfers: Default::default(),
                next_transfer: AtomicU64::new(1),
                num_aborts: AtomicU64::new(0),
                faults: Default::default(),
            }),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Stores a file on the slave.
    pub fn put_file(&self, path: impl Into<VirtualPath>, data: impl Into<Vec<u8>>) {
        self.inner.files.lock().insert(path.into(), data.into());
    }

    pub fn with_file(self, path: impl Into<VirtualPath>, data: impl Into<Vec<u8>>) -> Self {
        self.put_file(path, data);
        self
    }

    pub fn has_file(&self, path: &VirtualPath) -> bool {
        self.inner.files.lock().contains_key(path)
    }

    pub fn file(&self, path: &VirtualPath) -> Option<Vec<u8>> {
        self.inner.files.lock().get(path).cloned()
    }

    /// Simulates the slave losing or regaining its connection.
    pub fn set_online(&self, online: bool) {
        self.inner.online.store(online, Ordering::Relaxed);
    }

    pub fn set_faults(&self, faults: SlaveFaults) {
        *self.inner.faults.write() = faults;
    }

    /// The number of transfer slots which are neither finished nor failed.
    pub fn active_transfers(&self) -> usize {
        self.inner
            .transfers
            .lock()
            .values()
            .filter(|t| !t.finished && t.error.is_none() && t.aborted.is_none())
            .count()
    }

    /// The number of transfer slots aborted so far.
    pub fn num_aborts(&self) -> u64 {
        self.inner.num_aborts.load(Ordering::Relaxed)
    }

    fn faults(&self) -> SlaveFaults {
        self.inner.faults.read().clone()
    }

    fn ensure_online(&self) -> Result<(), RemoteError> {
        if self.inner.online.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(RemoteError::Unavailable(self.inner.name.clone()))
        }
    }

    fn checksum_of(&self, data: &[u8]) -> u64 {
        if self.faults().no_checksums {
            0
        } else {
            crc32fast::hash(data) as u64
        }
    }

    fn new_transfer(&self, transfer: MemoryTransfer) -> TransferIndex {
        let idx = TransferIndex(self.inner.next_transfer.fetch_add(1, Ordering::Relaxed));
        self.inner.transfers.lock().insert(idx, transfer);
        idx
    }

    /// Writes the data sent by the peer into the receiving slot.
    fn deliver(&self, transfer: TransferIndex, data: &[u8]) -> Result<(), RemoteError> {
        self.ensure_online()?;
        let faults = self.faults();

        let mut data = data.to_vec();
        if faults.corrupt_received {
            data.iter_mut().for_each(|b| *b ^= 0xFF);
            if data.is_empty() {
                data.push(0xFF);
            }
        }
        let checksum = self.checksum_of(&data);

        let mut transfers = self.inner.transfers.lock();
        let slot = transfers
            .get_mut(&transfer)
            .ok_or_else(|| RemoteError::Io("connection reset".to_string()))?;

        if let Some(reason) = slot.aborted.as_ref() {
            return Err(RemoteError::Aborted(reason.clone()));
        }

        let path = match (slot.receiving, slot.path.clone()) {
            (true, Some(path)) => path,
            _ => {
                return Err(RemoteError::TransferFailed(
                    "peer is not receiving".to_string(),
                ))
            },
        };

        slot.transferred = data.len() as u64;
        slot.checksum = checksum;
        slot.finished = !faults.never_finish;
        self.inner.files.lock().insert(path, data);
        Ok(())
    }
}

#[async_trait]
impl SlaveClient for MemorySlave {
    async fn listen(&self, secure: bool) -> Result<ConnectInfo, RemoteError> {
        self.ensure_online()?;
        if secure && self.faults().no_secure {
            return Err(RemoteError::SecureUnavailable);
        }

        let idx = self.new_transfer(MemoryTransfer::default());
        let addr = self.inner.network.bind(&self.inner, idx);
        if let Some(slot) = self.inner.transfers.lock().get_mut(&idx) {
            slot.listen_addr = Some(addr);
        }

        Ok(ConnectInfo {
            addr,
            transfer: idx,
        })
    }

    async fn connect(
        &self,
        addr: SocketAddr,
        secure: bool,
    ) -> Result<ConnectInfo, RemoteError> {
        self.ensure_online()?;
        if secure && self.faults().no_secure {
            return Err(RemoteError::SecureUnavailable);
        }

        let (peer, peer_idx) = self
            .inner
            .network
            .accept(&addr)
            .ok_or_else(|| RemoteError::Io(format!("connection refused: {addr}")))?;

        let idx = self.new_transfer(MemoryTransfer {
            peer: Some((peer.clone(), peer_idx)),
            ..Default::default()
        });

        if let Some(slot) = peer.inner.transfers.lock().get_mut(&peer_idx) {
            slot.peer = Some((self.clone(), idx));
        }

        Ok(ConnectInfo { addr, transfer: idx })
    }

    async fn receive(
        &self,
        transfer: TransferIndex,
        path: &VirtualPath,
    ) -> Result<(), RemoteError> {
        self.ensure_online()?;
        if self.has_file(path) {
            return Err(RemoteError::FileExists(path.clone()));
        }

        let mut transfers = self.inner.transfers.lock();
        let slot = transfers
            .get_mut(&transfer)
            .ok_or_else(|| RemoteError::Io("unknown transfer".to_string()))?;
        slot.path = Some(path.clone());
        slot.receiving = true;
        Ok(())
    }

    async fn send(
        &self,
        transfer: TransferIndex,
        path: &VirtualPath,
    ) -> Result<(), RemoteError> {
        self.ensure_online()?;
        let data = self
            .file(path)
            .ok_or_else(|| RemoteError::FileNotFound(path.clone()))?;

        let peer = {
            let mut transfers = self.inner.transfers.lock();
            let slot = transfers
                .get_mut(&transfer)
                .ok_or_else(|| RemoteError::Io("unknown transfer".to_string()))?;
            slot.path = Some(path.clone());
            slot.peer.clone()
        };

        let (peer, peer_idx) = peer.ok_or_else(|| {
            RemoteError::TransferFailed("transfer is not connected".to_string())
        })?;

        let delivered = peer.deliver(peer_idx, &data);
        let checksum = self.checksum_of(&data);
        let never_finish = self.faults().never_finish;

        let mut transfers = self.inner.transfers.lock();
        if let Some(slot) = transfers.get_mut(&transfer) {
            match delivered {
                Ok(()) => {
                    slot.transferred = data.len() as u64;
                    slot.checksum = checksum;
                    slot.finished = !never_finish;
                },
                Err(e) => {
                    slot.error = Some(RemoteError::TransferFailed(e.to_string()));
                },
            }
        }

        Ok(())
    }

    async fn transfer_status(
        &self,
        transfer: TransferIndex,
    ) -> Result<TransferStatus, RemoteError> {
        self.ensure_online()?;
        if let Some(error) = self.faults().fail_status {
            return Err(error);
        }

        let transfers = self.inner.transfers.lock();
        let slot = transfers
            .get(&transfer)
            .ok_or_else(|| RemoteError::Io("unknown transfer".to_string()))?;

        if let Some(reason) = slot.aborted.as_ref() {
            return Err(RemoteError::Aborted(reason.clone()));
        }
        if let Some(error) = slot.error.as_ref() {
            return Err(error.clone());
        }

        Ok(TransferStatus {
            finished: slot.finished,
            checksum: slot.checksum,
            transferred: slot.transferred,
            speed: slot.transferred,
        })
    }

    async fn abort(&self, transfer: TransferIndex, reason: &str) {
        let mut transfers = self.inner.transfers.lock();
        let Some(slot) = transfers.get_mut(&transfer) else {
            return;
        };

        self.inner.num_aborts.fetch_add(1, Ordering::Relaxed);
        slot.aborted = Some(reason.to_string());

        if let Some(addr) = slot.listen_addr.take() {
            self.inner.network.listeners.lock().remove(&addr);
        }

        if slot.receiving && !slot.finished {
            if let Some(path) = slot.path.as_ref() {
                self.inner.files.lock().remove(path);
            }
        }
    }

    async fn delete(&self, path: &VirtualPath) -> Result<(), RemoteError> {
        self.ensure_online()?;
        self.inner
            .files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| RemoteError::FileNotFound(path.clone()))
    }

    async fn checksum(&self, path: &VirtualPath) -> Result<u64, RemoteError> {
        self.ensure_online()?;
        let data = self
            .file(path)
            .ok_or_else(|| RemoteError::FileNotFound(path.clone()))?;
        Ok(self.checksum_of(&data))
    }
}

#[derive(Debug, Clone, Default)]
struct FileEntry {
    holders: BTreeSet<SlaveName>,
    checksum: Option<u64>,
    size: u64,
}

#[derive(Debug, Default)]
struct MemoryVfsInner {
    files: BTreeMap<VirtualPath, FileEntry>,
    sections: BTreeSet<VirtualPath>,
}

#[derive(Debug, Clone, Default)]
/// An in-memory file metadata store.
///
/// When no sections are registered every top level directory is
/// treated as a section.
pub struct MemoryVfs {
    inner: Arc<RwLock<MemoryVfsInner>>,
}

impl MemoryVfs {
    pub fn add_file<I, S>(&self, path: impl Into<VirtualPath>, size: u64, holders: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<SlaveName>,
    {
        let entry = FileEntry {
            holders: holders.into_iter().map(|s| s.into()).collect(),
            checksum: None,
            size,
        };
        self.inner.write().files.insert(path.into(), entry);
    }

    pub fn add_section(&self, path: impl Into<VirtualPath>) {
        self.inner.write().sections.insert(path.into());
    }

    pub fn remove_file(&self, path: &VirtualPath) {
        self.inner.write().files.remove(path);
    }

    /// The holders of the file, empty if the file does not exist.
    pub fn holders(&self, path: &VirtualPath) -> BTreeSet<SlaveName> {
        self.inner
            .read()
            .files
            .get(path)
            .map(|entry| entry.holders.clone())
            .unwrap_or_default()
    }
}

impl Vfs for MemoryVfs {
    fn slaves_holding(&self, file: &VirtualPath) -> Result<BTreeSet<SlaveName>, VfsError> {
        self.inner
            .read()
            .files
            .get(file)
            .map(|entry| entry.holders.clone())
            .ok_or_else(|| VfsError::FileNotFound(file.clone()))
    }

    fn add_holder(&self, file: &VirtualPath, slave: &str) -> Result<(), VfsError> {
        let mut inner = self.inner.write();
        let entry = inner
            .files
            .get_mut(file)
            .ok_or_else(|| VfsError::FileNotFound(file.clone()))?;
        entry.holders.insert(slave.to_string());
        Ok(())
    }

    fn remove_holder(&self, file: &VirtualPath, slave: &str) -> Result<(), VfsError> {
        let mut inner = self.inner.write();
        let entry = inner
            .files
            .get_mut(file)
            .ok_or_else(|| VfsError::FileNotFound(file.clone()))?;
        entry.holders.remove(slave);
        Ok(())
    }

    fn checksum(&self, file: &VirtualPath) -> Result<Option<u64>, VfsError> {
        self.inner
            .read()
            .files
            .get(file)
            .map(|entry| entry.checksum)
            .ok_or_else(|| VfsError::FileNotFound(file.clone()))
    }

    fn set_checksum(&self, file: &VirtualPath, checksum: u64) -> Result<(), VfsError> {
        let mut inner = self.inner.write();
        let entry = inner
            .files
            .get_mut(file)
            .ok_or_else(|| VfsError::FileNotFound(file.clone()))?;
        entry.checksum = Some(checksum);
        Ok(())
    }

    fn size(&self, file: &VirtualPath) -> Result<u64, VfsError> {
        self.inner
            .read()
            .files
            .get(file)
            .map(|entry| entry.size)
            .ok_or_else(|| VfsError::FileNotFound(file.clone()))
    }

    fn section_of(&self, path: &VirtualPath) -> Option<VirtualPath> {
        let inner = self.inner.read();
        if inner.sections.is_empty() {
            return path.components().next().map(VirtualPath::new);
        }

        inner
            .sections
            .iter()
            .filter(|section| *section == path || section.is_ancestor_of(path))
            .max_by_key(|section| section.as_str().len())
            .cloned()
    }

    fn files_under(
        &self,
        dir: &VirtualPath,
    ) -> Result<Vec<(VirtualPath, BTreeSet<SlaveName>)>, VfsError> {
        Ok(self
            .inner
            .read()
            .files
            .iter()
            .filter(|(path, _)| dir.is_ancestor_of(path))
            .map(|(path, entry)| (path.clone(), entry.holders.clone()))
            .collect())
    }
}
