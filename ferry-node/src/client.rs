use std::net::SocketAddr;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::path::VirtualPath;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Identifies a transfer slot on a single slave.
pub struct TransferIndex(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// The connection details of a transfer slot.
pub struct ConnectInfo {
    /// The address peers should connect to, or the address connected to.
    pub addr: SocketAddr,
    /// The slot on the slave handling the connection.
    pub transfer: TransferIndex,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
/// A point-in-time view of a transfer slot.
pub struct TransferStatus {
    pub finished: bool,
    /// The CRC32 of the transferred data, `0` when unknown.
    pub checksum: u64,
    /// The number of bytes moved so far.
    pub transferred: u64,
    /// The current speed in bytes per second.
    pub speed: u64,
}

#[async_trait]
/// The control operations the master issues against a slave.
///
/// A failed transfer is reported by `transfer_status` returning an error.
pub trait SlaveClient: Send + Sync + 'static {
    /// Opens a listening transfer slot.
    async fn listen(&self, secure: bool) -> Result<ConnectInfo, RemoteError>;

    /// Connects a new transfer slot to a listening peer.
    async fn connect(
        &self,
        addr: SocketAddr,
        secure: bool,
    ) -> Result<ConnectInfo, RemoteError>;

    /// Starts writing the incoming data of the slot to `path`.
    async fn receive(
        &self,
        transfer: TransferIndex,
        path: &VirtualPath,
    ) -> Result<(), RemoteError>;

    /// Starts sending the file at `path` through the slot.
    async fn send(
        &self,
        transfer: TransferIndex,
        path: &VirtualPath,
    ) -> Result<(), RemoteError>;

    async fn transfer_status(
        &self,
        transfer: TransferIndex,
    ) -> Result<TransferStatus, RemoteError>;

    /// Aborts the slot, discarding any partially received data.
    async fn abort(&self, transfer: TransferIndex, reason: &str);

    async fn delete(&self, path: &VirtualPath) -> Result<(), RemoteError>;

    /// Computes the checksum of a file on the slave, `0` when unknown.
    async fn checksum(&self, path: &VirtualPath) -> Result<u64, RemoteError>;
}
