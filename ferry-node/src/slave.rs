use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// The unique name of a slave within the cluster.
pub type SlaveName = String;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
/// The direction of a transfer as seen from the slave.
pub enum Direction {
    /// The slave receives data.
    Upload,
    /// The slave sends data.
    Download,
}

impl Direction {
    /// The direction of the other side of the transfer.
    pub fn opposite(self) -> Self {
        match self {
            Direction::Upload => Direction::Download,
            Direction::Download => Direction::Upload,
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Upload => write!(f, "upload"),
            Direction::Download => write!(f, "download"),
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
/// Transfer activity of a slave in one direction.
pub struct TransferStats {
    /// The number of transfers currently running.
    pub active_transfers: u32,
    /// Current throughput in bytes per second.
    pub throughput: u64,
    /// The unix timestamp in milliseconds of the most recent transfer.
    pub last_transfer: Option<u64>,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
/// A snapshot of a slave's disk and transfer status.
pub struct SlaveStatus {
    pub disk_space_available: u64,
    pub disk_space_capacity: u64,
    pub uploads: TransferStats,
    pub downloads: TransferStats,
}

impl SlaveStatus {
    #[inline]
    /// The transfer stats for the given direction.
    pub fn transfers(&self, direction: Direction) -> &TransferStats {
        match direction {
            Direction::Upload => &self.uploads,
            Direction::Download => &self.downloads,
        }
    }

    #[inline]
    pub fn throughput(&self, direction: Direction) -> u64 {
        self.transfers(direction).throughput
    }

    #[inline]
    pub fn active_transfers(&self, direction: Direction) -> u32 {
        self.transfers(direction).active_transfers
    }

    #[inline]
    pub fn last_transfer(&self, direction: Direction) -> Option<u64> {
        self.transfers(direction).last_transfer
    }

    /// Sets the free disk space of the status.
    pub fn with_disk_space(mut self, available: u64, capacity: u64) -> Self {
        self.disk_space_available = available;
        self.disk_space_capacity = capacity;
        self
    }

    /// Sets the transfer stats for the given direction.
    pub fn with_transfers(mut self, direction: Direction, stats: TransferStats) -> Self {
        match direction {
            Direction::Upload => self.uploads = stats,
            Direction::Download => self.downloads = stats,
        }
        self
    }
}

/// Get the current UNIX timestamp in milliseconds.
pub fn get_unix_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_opposite() {
        assert_eq!(Direction::Upload.opposite(), Direction::Download);
        assert_eq!(Direction::Download.opposite(), Direction::Upload);
    }

    #[test]
    fn test_status_direction_lookup() {
        let status = SlaveStatus::default()
            .with_transfers(
                Direction::Upload,
                TransferStats {
                    active_transfers: 3,
                    throughput: 100,
                    last_transfer: Some(5),
                },
            )
            .with_transfers(
                Direction::Download,
                TransferStats {
                    active_transfers: 1,
                    throughput: 7,
                    last_transfer: None,
                },
            );

        assert_eq!(status.active_transfers(Direction::Upload), 3);
        assert_eq!(status.throughput(Direction::Upload), 100);
        assert_eq!(status.last_transfer(Direction::Upload), Some(5));
        assert_eq!(status.active_transfers(Direction::Download), 1);
        assert_eq!(status.last_transfer(Direction::Download), None);
    }
}
