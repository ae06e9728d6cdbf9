use thiserror::Error;

use crate::path::VirtualPath;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Unknown slave: {0}")]
    /// The slave is not registered with the manager.
    UnknownSlave(String),

    #[error("A slave named {0} is already registered")]
    /// A slave with the same name is already registered.
    DuplicateSlave(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// An error returned by a remote slave or by the connection to it.
pub enum RemoteError {
    #[error("Slave is unavailable: {0}")]
    /// The slave is offline or the connection to it was lost.
    Unavailable(String),

    #[error("File not found on slave: {0}")]
    FileNotFound(VirtualPath),

    #[error("File already exists on slave: {0}")]
    FileExists(VirtualPath),

    #[error("Slave does not support secure transfers")]
    SecureUnavailable,

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Transfer aborted: {0}")]
    Aborted(String),

    #[error("IO error on slave: {0}")]
    Io(String),
}

impl RemoteError {
    #[inline]
    /// Returns if the error is caused by losing the slave rather than
    /// the operation itself failing.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VfsError {
    #[error("File not found: {0}")]
    FileNotFound(VirtualPath),
}
