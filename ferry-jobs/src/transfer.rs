use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ferry_node::{
    RemoteError,
    SlaveClient,
    SlaveName,
    TransferIndex,
    TransferStatus,
    VirtualPath,
};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};

#[derive(Debug, Error)]
/// A failed transfer, classified by the slave responsible.
pub enum SlaveTransferError {
    #[error("Source slave failed: {0}")]
    /// The source slave failed, it may not hold a valid copy of the file.
    Source(RemoteError),

    #[error("Destination slave failed: {0}")]
    /// The destination slave failed, any partial copy must be discarded.
    Destination(RemoteError),

    #[error("Transfer aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// The checksums both slaves reported for a finished transfer.
pub struct TransferChecksums {
    pub source: u64,
    pub destination: u64,
    pub transferred: u64,
}

#[derive(Debug, Default)]
/// Live progress of a running transfer.
pub struct TransferProgress {
    transferred: AtomicU64,
    speed: AtomicU64,
}

impl TransferProgress {
    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }

    /// The transfer speed in bytes per second.
    pub fn speed(&self) -> u64 {
        self.speed.load(Ordering::Relaxed)
    }

    fn update(&self, status: &TransferStatus) {
        self.transferred
            .fetch_max(status.transferred, Ordering::Relaxed);
        self.speed.store(status.speed, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone)]
/// Requests a running transfer to stop.
pub struct AbortHandle {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl AbortHandle {
    /// Creates a new handle and the signal it controls.
    pub fn new() -> (Self, AbortSignal) {
        let (tx, rx) = watch::channel(None);
        (Self { tx: Arc::new(tx) }, AbortSignal { rx })
    }

    /// Signals the transfer to abort, the first reason given wins.
    pub fn abort(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
    }

    pub fn is_aborted(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

#[derive(Debug, Clone)]
/// Observes an [AbortHandle].
pub struct AbortSignal {
    rx: watch::Receiver<Option<String>>,
}

impl AbortSignal {
    /// The abort reason, if an abort has been requested.
    pub fn reason(&self) -> Option<String> {
        self.rx.borrow().clone()
    }

    /// Waits until an abort is requested.
    ///
    /// Never completes if the handle is dropped without aborting.
    pub async fn aborted(&mut self) -> String {
        loop {
            if let Some(reason) = self.rx.borrow_and_update().clone() {
                return reason;
            }

            if self.rx.changed().await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
    }
}

async fn wait_for_abort(signal: &mut Option<AbortSignal>) -> String {
    match signal {
        Some(signal) => signal.aborted().await,
        None => futures::future::pending().await,
    }
}

/// Copies a single file from one slave to another.
///
/// The destination listens, the source connects to it, then the destination
/// is told to receive and the source to send. Both legs are then polled
/// until they finish, fail or the timeout elapses. When one leg fails the
/// other is aborted.
pub struct SlaveTransfer {
    path: VirtualPath,
    source: SlaveName,
    source_client: Arc<dyn SlaveClient>,
    destination: SlaveName,
    destination_client: Arc<dyn SlaveClient>,
    secure: bool,
    poll_interval: Duration,
    timeout: Duration,
    progress: Arc<TransferProgress>,
    abort: Option<AbortSignal>,
}

impl SlaveTransfer {
    pub fn new(
        path: VirtualPath,
        source: (SlaveName, Arc<dyn SlaveClient>),
        destination: (SlaveName, Arc<dyn SlaveClient>),
    ) -> Self {
        Self {
            path,
            source: source.0,
            source_client: source.1,
            destination: destination.0,
            destination_client: destination.1,
            secure: false,
            poll_interval: Duration::from_millis(100),
            timeout: Duration::from_secs(6 * 60 * 60),
            progress: Default::default(),
            abort: None,
        }
    }

    /// Use encrypted connections between the slaves.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets the time waited between polling the status of both legs.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the maximum time both legs have to finish.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_progress(mut self, progress: Arc<TransferProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_abort_signal(mut self, signal: AbortSignal) -> Self {
        self.abort = Some(signal);
        self
    }

    #[inline]
    pub fn progress(&self) -> &Arc<TransferProgress> {
        &self.progress
    }

    #[instrument(
        name = "slave-transfer",
        skip_all,
        fields(
            path = %self.path,
            source = %self.source,
            destination = %self.destination,
        )
    )]
    /// Runs the transfer to completion.
    pub async fn transfer(self) -> Result<TransferChecksums, SlaveTransferError> {
        if let Some(reason) = self.abort.as_ref().and_then(|s| s.reason()) {
            return Err(SlaveTransferError::Aborted(reason));
        }

        let dest = self
            .destination_client
            .listen(self.secure)
            .await
            .map_err(SlaveTransferError::Destination)?;

        let src = match self.source_client.connect(dest.addr, self.secure).await {
            Ok(src) => src,
            Err(e) => {
                self.destination_client
                    .abort(dest.transfer, "source slave failed to connect")
                    .await;
                return Err(SlaveTransferError::Source(e));
            },
        };

        if let Err(e) = self
            .destination_client
            .receive(dest.transfer, &self.path)
            .await
        {
            self.source_client
                .abort(src.transfer, "destination slave failed to receive")
                .await;
            return Err(SlaveTransferError::Destination(e));
        }

        if let Err(e) = self.source_client.send(src.transfer, &self.path).await {
            self.destination_client
                .abort(dest.transfer, "source slave failed to send")
                .await;
            return Err(SlaveTransferError::Source(e));
        }

        debug!(addr = %dest.addr, "Transfer started.");
        self.poll_until_finished(src.transfer, dest.transfer).await
    }

    async fn abort_legs(&self, src: TransferIndex, dest: TransferIndex, reason: &str) {
        futures::join!(
            self.source_client.abort(src, reason),
            self.destination_client.abort(dest, reason),
        );
    }

    async fn poll_until_finished(
        mut self,
        src: TransferIndex,
        dest: TransferIndex,
    ) -> Result<TransferChecksums, SlaveTransferError> {
        let deadline = Instant::now() + self.timeout;
        let mut abort = self.abort.take();
        let mut interval = interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut source_status: Option<TransferStatus> = None;
        let mut dest_status: Option<TransferStatus> = None;

        loop {
            tokio::select! {
                _ = interval.tick() => {},
                reason = wait_for_abort(&mut abort) => {
                    info!(reason = %reason, "Aborting transfer.");
                    self.abort_legs(src, dest, &reason).await;
                    return Err(SlaveTransferError::Aborted(reason));
                },
            }

            if source_status.is_none() {
                match self.source_client.transfer_status(src).await {
                    Ok(status) => {
                        self.progress.update(&status);
                        if status.finished {
                            source_status = Some(status);
                        }
                    },
                    Err(e) => {
                        self.destination_client
                            .abort(dest, "source slave had an error")
                            .await;
                        return Err(SlaveTransferError::Source(e));
                    },
                }
            }

            if dest_status.is_none() {
                match self.destination_client.transfer_status(dest).await {
                    Ok(status) => {
                        self.progress.update(&status);
                        if status.finished {
                            dest_status = Some(status);
                        }
                    },
                    Err(e) => {
                        self.source_client
                            .abort(src, "destination slave had an error")
                            .await;
                        return Err(SlaveTransferError::Destination(e));
                    },
                }
            }

            if let (Some(source), Some(destination)) = (source_status, dest_status) {
                return Ok(TransferChecksums {
                    source: source.checksum,
                    destination: destination.checksum,
                    transferred: source.transferred,
                });
            }

            if Instant::now() >= deadline {
                let reason = format!(
                    "transfer did not finish within {}",
                    humantime::format_duration(self.timeout),
                );
                self.abort_legs(src, dest, &reason).await;

                let error = RemoteError::TransferFailed(reason);
                return Err(if source_status.is_none() {
                    SlaveTransferError::Source(error)
                } else {
                    SlaveTransferError::Destination(error)
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use ferry_node::test_utils::{MemoryNetwork, MemorySlave, SlaveFaults};

    use super::*;

    fn pair() -> (MemorySlave, MemorySlave) {
        let network = MemoryNetwork::default();
        let source = MemorySlave::new("source", &network).with_file("/a/file", b"data".to_vec());
        let dest = MemorySlave::new("dest", &network);
        (source, dest)
    }

    fn transfer(source: &MemorySlave, dest: &MemorySlave) -> SlaveTransfer {
        SlaveTransfer::new(
            VirtualPath::new("/a/file"),
            (source.name().to_string(), Arc::new(source.clone())),
            (dest.name().to_string(), Arc::new(dest.clone())),
        )
        .with_poll_interval(Duration::from_millis(10))
        .with_timeout(Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_successful_transfer() -> anyhow::Result<()> {
        let _ = tracing_subscriber::fmt::try_init();

        let (source, dest) = pair();
        let progress = Arc::new(TransferProgress::default());
        let checksums = transfer(&source, &dest)
            .with_progress(progress.clone())
            .transfer()
            .await?;

        assert_eq!(checksums.source, checksums.destination);
        assert_ne!(checksums.source, 0);
        assert_eq!(checksums.transferred, 4);
        assert_eq!(progress.transferred(), 4);
        assert_eq!(dest.file(&VirtualPath::new("/a/file")), Some(b"data".to_vec()));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_source_file_blames_source() {
        let network = MemoryNetwork::default();
        let source = MemorySlave::new("source", &network);
        let dest = MemorySlave::new("dest", &network);

        let err = transfer(&source, &dest)
            .transfer()
            .await
            .expect_err("Transfer should fail.");
        assert!(matches!(
            err,
            SlaveTransferError::Source(RemoteError::FileNotFound(_))
        ));
        assert_eq!(dest.num_aborts(), 1);
        assert!(!dest.has_file(&VirtualPath::new("/a/file")));
    }

    #[tokio::test]
    async fn test_existing_file_blames_destination() {
        let (source, dest) = pair();
        dest.put_file("/a/file", b"other".to_vec());

        let err = transfer(&source, &dest)
            .transfer()
            .await
            .expect_err("Transfer should fail.");
        assert!(matches!(
            err,
            SlaveTransferError::Destination(RemoteError::FileExists(_))
        ));
        assert_eq!(source.num_aborts(), 1);
    }

    #[tokio::test]
    async fn test_offline_slaves_are_classified() {
        let (source, dest) = pair();
        dest.set_online(false);
        let err = transfer(&source, &dest)
            .transfer()
            .await
            .expect_err("Transfer should fail.");
        assert!(matches!(
            err,
            SlaveTransferError::Destination(RemoteError::Unavailable(_))
        ));

        let (source, dest) = pair();
        source.set_online(false);
        let err = transfer(&source, &dest)
            .transfer()
            .await
            .expect_err("Transfer should fail.");
        assert!(matches!(
            err,
            SlaveTransferError::Source(RemoteError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_status_errors_abort_the_other_leg() {
        let (source, dest) = pair();
        dest.set_faults(SlaveFaults {
            fail_status: Some(RemoteError::Io("disk full".to_string())),
            ..Default::default()
        });

        let err = transfer(&source, &dest)
            .transfer()
            .await
            .expect_err("Transfer should fail.");
        assert!(matches!(
            err,
            SlaveTransferError::Destination(RemoteError::Io(_))
        ));
        assert_eq!(source.num_aborts(), 1);
    }

    #[tokio::test]
    async fn test_unfinished_transfer_times_out() {
        let (source, dest) = pair();
        dest.set_faults(SlaveFaults {
            never_finish: true,
            ..Default::default()
        });

        let started = std::time::Instant::now();
        let err = transfer(&source, &dest)
            .with_timeout(Duration::from_millis(100))
            .transfer()
            .await
            .expect_err("Transfer should time out.");
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert!(matches!(
            err,
            SlaveTransferError::Destination(RemoteError::TransferFailed(_))
        ));
        // The partial copy is discarded by the abort.
        assert!(!dest.has_file(&VirtualPath::new("/a/file")));
    }

    #[tokio::test]
    async fn test_abort_signal_stops_transfer() {
        let (source, dest) = pair();
        dest.set_faults(SlaveFaults {
            never_finish: true,
            ..Default::default()
        });

        let (handle, signal) = AbortHandle::new();
        let task = tokio::spawn(
            transfer(&source, &dest)
                .with_timeout(Duration::from_secs(30))
                .with_abort_signal(signal)
                .transfer(),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort("removed by operator");
        handle.abort("second reason is ignored");

        let err = task
            .await
            .expect("Join task.")
            .expect_err("Transfer should be aborted.");
        assert!(matches!(err, SlaveTransferError::Aborted(reason) if reason == "removed by operator"));
        assert!(handle.is_aborted());
        assert!(!dest.has_file(&VirtualPath::new("/a/file")));
    }

    #[tokio::test]
    async fn test_already_aborted_transfer_never_starts() {
        let (source, dest) = pair();
        let (handle, signal) = AbortHandle::new();
        handle.abort("cancelled");

        let err = transfer(&source, &dest)
            .with_abort_signal(signal)
            .transfer()
            .await
            .expect_err("Transfer should be aborted.");
        assert!(matches!(err, SlaveTransferError::Aborted(_)));
        assert_eq!(dest.num_aborts(), 0);
        assert!(!dest.has_file(&VirtualPath::new("/a/file")));
    }
}
