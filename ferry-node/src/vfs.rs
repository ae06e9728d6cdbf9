use std::collections::BTreeSet;

use crate::error::VfsError;
use crate::path::VirtualPath;
use crate::slave::SlaveName;

/// The master's view of which slaves hold which files.
///
/// Implementations must be safe to call concurrently from the selection
/// engine and the job workers.
pub trait Vfs: Send + Sync + 'static {
    /// The set of slaves holding a copy of the file.
    fn slaves_holding(&self, file: &VirtualPath) -> Result<BTreeSet<SlaveName>, VfsError>;

    fn add_holder(&self, file: &VirtualPath, slave: &str) -> Result<(), VfsError>;

    fn remove_holder(&self, file: &VirtualPath, slave: &str) -> Result<(), VfsError>;

    /// The recorded checksum of the file, if one is known.
    fn checksum(&self, file: &VirtualPath) -> Result<Option<u64>, VfsError>;

    fn set_checksum(&self, file: &VirtualPath, checksum: u64) -> Result<(), VfsError>;

    fn size(&self, file: &VirtualPath) -> Result<u64, VfsError>;

    /// The section directory the path belongs to, if any.
    fn section_of(&self, path: &VirtualPath) -> Option<VirtualPath>;

    /// Every file below `dir` together with its holders.
    fn files_under(
        &self,
        dir: &VirtualPath,
    ) -> Result<Vec<(VirtualPath, BTreeSet<SlaveName>)>, VfsError>;
}
