use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use ferry_node::{RemoteError, SlaveClient, SlaveName, SlaveRegistry, Vfs, VirtualPath};
use ferry_selection::SlaveSelectionManager;
use itertools::Itertools;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::config::JobManagerConfig;
use crate::error::JobError;
use crate::job::{Job, JobIndex, JobPhase, JobRequest, JobSnapshot};
use crate::range::JobRanges;
use crate::scheduler::{start_scheduler, SchedulerHandle};
use crate::statistics::JobStatistics;
use crate::transfer::{AbortSignal, SlaveTransfer, SlaveTransferError, TransferProgress};

#[derive(Default)]
struct JobQueue {
    jobs: BTreeMap<JobIndex, Arc<Job>>,
    /// The newest job of each file, new requests are merged into it.
    by_path: HashMap<VirtualPath, JobIndex>,
    /// The (file, destination) pairs with a running transfer.
    claims: BTreeSet<(VirtualPath, SlaveName)>,
    /// Files whose excess copies are currently being removed.
    cleaning: BTreeSet<VirtualPath>,
}

impl JobQueue {
    fn remove(&mut self, job: &Job) {
        self.jobs.remove(&job.index());
        if self.by_path.get(job.path()) == Some(&job.index()) {
            self.by_path.remove(job.path());
        }
    }

    /// Every slave currently sending a file for a job.
    fn job_sources(&self) -> BTreeSet<SlaveName> {
        self.jobs
            .values()
            .flat_map(|job| job.active_sources())
            .collect()
    }

    /// The queued jobs in the order they are worked on.
    fn ordered(&self) -> Vec<Arc<Job>> {
        self.jobs
            .values()
            .cloned()
            .sorted_by_key(|job| (Reverse(job.priority()), job.created_at(), job.index()))
            .collect()
    }
}

#[derive(Debug)]
/// A transfer claimed by a worker.
pub struct Assignment {
    job: Arc<Job>,
    source: SlaveName,
    destination: SlaveName,
    progress: Arc<TransferProgress>,
    signal: AbortSignal,
}

impl Assignment {
    #[inline]
    pub fn job(&self) -> &Arc<Job> {
        &self.job
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn destination(&self) -> &str {
        &self.destination
    }
}

#[derive(Debug)]
/// The work handed to a slave's worker.
pub enum Work {
    /// Copy the job's file from the source to the destination.
    Transfer(Assignment),
    /// The job has its copies, remove the excess ones.
    Cleanup(Arc<Job>),
}

#[derive(Debug)]
enum TransferOutcome {
    Succeeded { transferred: u64 },
    ChecksumMismatch { source: u64, destination: u64 },
    /// The source does not actually hold the file.
    SourceMissing,
    SourceFailed(RemoteError),
    DestinationFailed(RemoteError),
    /// One of the slaves went away, nobody is to blame.
    Unavailable(RemoteError),
    Aborted(String),
}

struct JobManagerInner {
    registry: Arc<dyn SlaveRegistry>,
    vfs: Arc<dyn Vfs>,
    selection: SlaveSelectionManager,
    config: JobManagerConfig,
    queue: Mutex<JobQueue>,
    next_index: AtomicU64,
    stopped: AtomicBool,
    work_tx: watch::Sender<u64>,
    statistics: JobStatistics,
}

#[derive(Clone)]
/// Queues replication jobs and hands their transfers out to the
/// workers of each destination slave.
///
/// Claiming work, recording transfer results and enqueueing are
/// serialised by the queue lock, so a (file, destination) pair is never
/// worked on twice at the same time.
pub struct JobManager {
    inner: Arc<JobManagerInner>,
}

impl JobManager {
    pub fn new(selection: SlaveSelectionManager, config: JobManagerConfig) -> Self {
        let (work_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(JobManagerInner {
                registry: selection.registry().clone(),
                vfs: selection.vfs().clone(),
                selection,
                config,
                queue: Default::default(),
                next_index: AtomicU64::new(1),
                stopped: AtomicBool::new(false),
                work_tx,
                statistics: JobStatistics::default(),
            }),
        }
    }

    #[inline]
    pub fn statistics(&self) -> JobStatistics {
        self.inner.statistics.clone()
    }

    #[inline]
    pub fn registry(&self) -> &Arc<dyn SlaveRegistry> {
        &self.inner.registry
    }

    #[inline]
    pub fn config(&self) -> &JobManagerConfig {
        &self.inner.config
    }

    /// A watcher which changes every time new work may be available.
    pub fn subscribe_work(&self) -> watch::Receiver<u64> {
        self.inner.work_tx.subscribe()
    }

    pub(crate) fn notify_work(&self) {
        self.inner.work_tx.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Starts a worker for every online slave.
    pub fn start_workers(&self) -> SchedulerHandle {
        start_scheduler(self.clone())
    }

    /// Queues a copy of `path` onto `required_copies` of `destinations`.
    pub async fn add_job<I, S>(
        &self,
        path: impl Into<VirtualPath>,
        destinations: I,
        priority: i32,
        required_copies: u32,
    ) -> Result<Arc<Job>, JobError>
    where
        I: IntoIterator<Item = S>,
        S: Into<SlaveName>,
    {
        let request = JobRequest::new(path, destinations, required_copies).with_priority(priority);
        self.submit(request).await
    }

    /// Queues the job, or merges it into the queued job for the same file.
    ///
    /// Destinations already holding the file count as copies straight
    /// away, a job which needs no transfers is cleaned up before
    /// returning and never queued.
    pub async fn submit(&self, request: JobRequest) -> Result<Arc<Job>, JobError> {
        if let Some(unknown) = request
            .destinations
            .iter()
            .find(|name| !self.inner.registry.contains(name))
        {
            return Err(JobError::UnknownSlave(unknown.clone()));
        }

        let job = match self.enqueue(request)? {
            Enqueued::Queued(job) => {
                self.notify_work();
                return Ok(job);
            },
            Enqueued::Satisfied(job) => job,
        };

        self.run_cleanup(job.clone()).await;
        Ok(job)
    }

    fn enqueue(&self, request: JobRequest) -> Result<Enqueued, JobError> {
        let holders = self
            .inner
            .vfs
            .slaves_holding(&request.path)
            .map_err(|_| JobError::FileNotFound(request.path.clone()))?;

        let mut queue = self.inner.queue.lock();
        let locked = queue.cleaning.contains(&request.path);

        let existing = queue
            .by_path
            .get(&request.path)
            .and_then(|index| queue.jobs.get(index))
            .filter(|job| !job.is_aborted() && job.phase() != JobPhase::Cleanup)
            .cloned();

        if let Some(job) = existing {
            let added = request
                .destinations
                .difference(job.destinations().as_ref())
                .cloned()
                .collect::<BTreeSet<_>>();
            job.merge(&request);

            if !locked {
                let effective = job.effective_destinations(self.inner.registry.as_ref());
                for slave in added.intersection(&holders) {
                    if effective.contains(slave) {
                        job.credit(slave);
                    }
                }
            }

            info!(
                job_index = job.index(),
                path = %job.path(),
                "Merged job into existing job for the same file.",
            );
            return Ok(Enqueued::Queued(job));
        }

        let index = self.inner.next_index.fetch_add(1, Ordering::Relaxed);
        let job = Arc::new(Job::new(index, request, self.inner.config.only_count_online)?);
        self.inner
            .statistics
            .num_jobs_added
            .fetch_add(1, Ordering::Relaxed);

        if locked {
            // The holders change while the file is cleaned up.
            job.mark_recount();
        } else if job.credit_holders(&holders, self.inner.registry.as_ref()) && job.start_cleanup() {
            info!(
                job_index = index,
                path = %job.path(),
                "Job is already satisfied, cleaning up.",
            );
            queue.cleaning.insert(job.path().clone());
            return Ok(Enqueued::Satisfied(job));
        }

        info!(
            job_index = index,
            path = %job.path(),
            destinations = ?job.destinations(),
            required = job.original_transfer_num(),
            "Queued job.",
        );
        queue.by_path.insert(job.path().clone(), index);
        queue.jobs.insert(index, job.clone());
        Ok(Enqueued::Queued(job))
    }

    /// Every queued job in scheduling order.
    pub fn list_jobs(&self) -> Vec<JobSnapshot> {
        let jobs = self.inner.queue.lock().ordered();
        jobs.iter()
            .map(|job| job.snapshot())
            .collect()
    }

    pub fn get_job(&self, index: JobIndex) -> Option<Arc<Job>> {
        self.inner.queue.lock().jobs.get(&index).cloned()
    }

    pub fn num_jobs(&self) -> usize {
        self.inner.queue.lock().jobs.len()
    }

    /// Aborts a single job, see [JobManager::remove_jobs].
    pub fn remove_job(&self, index: JobIndex) -> bool {
        !self.remove_jobs(&JobRanges::single(index)).is_empty()
    }

    /// Aborts every job within the ranges.
    ///
    /// Running transfers of the jobs are signalled to stop, jobs which are
    /// cleaning up can't be removed. Returns the aborted job indices.
    pub fn remove_jobs(&self, ranges: &JobRanges) -> Vec<JobIndex> {
        self.abort_where(|job| ranges.contains(job.index()), "removed by operator")
    }

    /// Aborts every job without a running transfer.
    pub fn remove_idle_jobs(&self) -> Vec<JobIndex> {
        self.abort_where(|job| !job.is_transferring(), "removed by operator")
    }

    fn abort_where(&self, predicate: impl Fn(&Job) -> bool, reason: &str) -> Vec<JobIndex> {
        let mut queue = self.inner.queue.lock();
        let mut removed = Vec::new();
        for job in queue.ordered() {
            if !predicate(&job) || queue.cleaning.contains(job.path()) {
                continue;
            }

            if self.abort_job(&mut queue, &job, reason) {
                removed.push(job.index());
            }
        }
        removed
    }

    fn abort_job(&self, queue: &mut JobQueue, job: &Job, reason: &str) -> bool {
        if !job.abort(reason) {
            return false;
        }

        info!(job_index = job.index(), path = %job.path(), reason = reason, "Aborted job.");
        self.inner
            .statistics
            .num_jobs_aborted
            .fetch_add(1, Ordering::Relaxed);

        if job.in_flight() == 0 {
            queue.remove(job);
        }
        true
    }

    /// Resumes handing out work.
    pub fn start_jobs(&self) {
        self.inner.stopped.store(false, Ordering::Relaxed);
        info!("Job transfers resumed.");
        self.notify_work();
    }

    /// Stops handing out new work, running transfers are left to finish.
    pub fn stop_jobs(&self) {
        self.inner.stopped.store(true, Ordering::Relaxed);
        info!("Job transfers stopped.");
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Relaxed)
    }

    /// Finds the next piece of work for `slave`.
    ///
    /// Jobs are considered by descending priority, then by age. A returned
    /// transfer is claimed until it completes so no other caller receives
    /// the same file and destination.
    pub fn assign_work(&self, slave: &str) -> Option<Work> {
        if self.is_stopped() {
            return None;
        }

        let registry = self.inner.registry.as_ref();
        let mut queue = self.inner.queue.lock();
        let job_sources = queue.job_sources();

        for job in queue.ordered() {
            let path = job.path();

            if job.is_aborted() {
                if job.in_flight() == 0 {
                    queue.remove(&job);
                }
                continue;
            }

            if queue.cleaning.contains(path) {
                continue;
            }

            let holders = match self.inner.vfs.slaves_holding(path) {
                Ok(holders) => holders,
                Err(e) => {
                    warn!(job_index = job.index(), error = %e, "Job file no longer exists.");
                    self.abort_job(&mut queue, &job, "file was deleted");
                    continue;
                },
            };

            if job.take_recount() {
                job.credit_holders(&holders, registry);
            }

            if job.in_flight() == 0
                && (job.transfer_num() == 0 || job.is_archived(&holders, registry))
            {
                if job.start_cleanup() {
                    queue.cleaning.insert(path.clone());
                    return Some(Work::Cleanup(job));
                }
                continue;
            }

            let destinations = job.destinations();
            if let Some(unknown) = destinations.iter().find(|name| !registry.contains(name)) {
                warn!(
                    job_index = job.index(),
                    slave = %unknown,
                    "Job destination slave no longer exists.",
                );
                self.abort_job(&mut queue, &job, "destination slave was deleted");
                continue;
            }

            if !destinations.contains(slave)
                || holders.contains(slave)
                || !job.wants_transfer()
                || queue.claims.contains(&(path.clone(), slave.to_string()))
                || job.is_destination_deferred(slave)
            {
                continue;
            }

            let mut exclude = job.deferred_sources();
            exclude.insert(slave.to_string());
            let source = match self.inner.selection.select_for_job_download(path, &exclude) {
                Ok(source) => source,
                Err(e) => {
                    debug!(job_index = job.index(), error = %e, "No source for job.");
                    continue;
                },
            };

            let candidates = [slave.to_string()];
            if let Err(e) = self
                .inner
                .selection
                .select_for_job_upload(path, &candidates, &source, &job_sources)
            {
                debug!(
                    job_index = job.index(),
                    slave = %slave,
                    error = %e,
                    "Slave rejected as job destination.",
                );
                continue;
            }

            queue.claims.insert((path.clone(), slave.to_string()));
            let (progress, signal) = job.begin_transfer(&source, slave);
            self.inner
                .statistics
                .num_transfers_started
                .fetch_add(1, Ordering::Relaxed);

            debug!(
                job_index = job.index(),
                path = %path,
                source = %source,
                destination = %slave,
                "Assigned job transfer.",
            );
            return Some(Work::Transfer(Assignment {
                job,
                source,
                destination: slave.to_string(),
                progress,
                signal,
            }));
        }

        None
    }

    /// Runs the work to completion.
    pub async fn process(&self, work: Work) {
        match work {
            Work::Transfer(assignment) => self.run_transfer(assignment).await,
            Work::Cleanup(job) => self.run_cleanup(job).await,
        }
    }

    #[instrument(
        name = "job-transfer",
        skip_all,
        fields(
            job_index = assignment.job.index(),
            source = %assignment.source,
            destination = %assignment.destination,
        )
    )]
    async fn run_transfer(&self, assignment: Assignment) {
        let Assignment {
            job,
            source,
            destination,
            progress,
            signal,
        } = assignment;

        let outcome = self
            .drive_transfer(job.path(), &source, &destination, progress, signal)
            .await;
        self.complete_transfer(&job, &source, &destination, outcome)
            .await;
    }

    async fn drive_transfer(
        &self,
        path: &VirtualPath,
        source: &str,
        destination: &str,
        progress: Arc<TransferProgress>,
        signal: AbortSignal,
    ) -> TransferOutcome {
        let registry = self.inner.registry.as_ref();
        let config = &self.inner.config;

        let source_client = match registry.client(source) {
            Ok(client) => client,
            Err(e) => return TransferOutcome::Unavailable(e),
        };
        let destination_client = match registry.client(destination) {
            Ok(client) => client,
            Err(e) => return TransferOutcome::Unavailable(e),
        };

        let result = SlaveTransfer::new(
            path.clone(),
            (source.to_string(), source_client),
            (destination.to_string(), destination_client.clone()),
        )
        .with_secure(config.secure_transfers)
        .with_poll_interval(config.poll_interval)
        .with_timeout(config.transfer_timeout)
        .with_progress(progress)
        .with_abort_signal(signal)
        .transfer()
        .await;

        match result {
            Ok(checksums) => {
                if !config
                    .checksum_policy
                    .accepts(checksums.source, checksums.destination)
                {
                    delete_copy(destination_client.as_ref(), path, destination).await;
                    return TransferOutcome::ChecksumMismatch {
                        source: checksums.source,
                        destination: checksums.destination,
                    };
                }

                if checksums.source != 0 {
                    if let Err(e) = self.inner.vfs.set_checksum(path, checksums.source) {
                        debug!(error = %e, "Unable to record file checksum.");
                    }
                }
                TransferOutcome::Succeeded {
                    transferred: checksums.transferred,
                }
            },
            Err(SlaveTransferError::Aborted(reason)) => {
                delete_copy(destination_client.as_ref(), path, destination).await;
                TransferOutcome::Aborted(reason)
            },
            Err(SlaveTransferError::Source(RemoteError::FileNotFound(_))) => {
                TransferOutcome::SourceMissing
            },
            Err(SlaveTransferError::Source(e)) if e.is_unavailable() => {
                TransferOutcome::Unavailable(e)
            },
            Err(SlaveTransferError::Source(e)) => {
                // Whatever reached the destination can't be verified.
                delete_copy(destination_client.as_ref(), path, destination).await;
                TransferOutcome::SourceFailed(e)
            },
            Err(SlaveTransferError::Destination(RemoteError::FileExists(_))) => {
                self.reconcile_existing(path, destination_client.as_ref())
                    .await
            },
            Err(SlaveTransferError::Destination(e)) => {
                if e.is_unavailable() {
                    return TransferOutcome::Unavailable(e);
                }
                delete_copy(destination_client.as_ref(), path, destination).await;
                TransferOutcome::DestinationFailed(e)
            },
        }
    }

    /// Decides if a copy the destination already had counts.
    async fn reconcile_existing(
        &self,
        path: &VirtualPath,
        destination: &dyn SlaveClient,
    ) -> TransferOutcome {
        let existing = match destination.checksum(path).await {
            Ok(checksum) => checksum,
            Err(e) if e.is_unavailable() => return TransferOutcome::Unavailable(e),
            Err(e) => return TransferOutcome::DestinationFailed(e),
        };
        let known = self.inner.vfs.checksum(path).ok().flatten();

        if self
            .inner
            .config
            .checksum_policy
            .accepts_existing(known, existing)
        {
            debug!(path = %path, checksum = existing, "Destination already holds the file.");
            if known.is_none() && existing != 0 {
                if let Err(e) = self.inner.vfs.set_checksum(path, existing) {
                    debug!(error = %e, "Unable to record file checksum.");
                }
            }
            return TransferOutcome::Succeeded { transferred: 0 };
        }

        if let Err(e) = destination.delete(path).await {
            debug!(path = %path, error = %e, "Unable to delete mismatched copy.");
        }
        TransferOutcome::ChecksumMismatch {
            source: known.unwrap_or_default(),
            destination: existing,
        }
    }

    async fn complete_transfer(
        &self,
        job: &Arc<Job>,
        source: &str,
        destination: &str,
        outcome: TransferOutcome,
    ) {
        let statistics = &self.inner.statistics;
        let path = job.path();
        let retry_delay = self.inner.config.retry_delay;

        if !matches!(outcome, TransferOutcome::Succeeded { .. }) {
            statistics
                .num_transfers_failed
                .fetch_add(1, Ordering::Relaxed);
        }

        // Holder changes land while the transfer still holds its slot, a
        // worker never sees a finished copy that is missing from the VFS.
        let added = match &outcome {
            TransferOutcome::Succeeded { transferred } => {
                statistics
                    .num_transfers_succeeded
                    .fetch_add(1, Ordering::Relaxed);
                statistics
                    .num_bytes_transferred
                    .fetch_add(*transferred, Ordering::Relaxed);
                Some(self.inner.vfs.add_holder(path, destination))
            },
            TransferOutcome::SourceMissing => {
                warn!(
                    path = %path,
                    source = %source,
                    "Source slave does not hold the file, removing it as a holder.",
                );
                if let Err(e) = self.inner.vfs.remove_holder(path, source) {
                    debug!(error = %e, "Unable to remove holder.");
                }
                None
            },
            _ => None,
        };

        {
            let mut queue = self.inner.queue.lock();
            match outcome {
                TransferOutcome::Succeeded { .. } => match added {
                    Some(Err(e)) => {
                        warn!(job_index = job.index(), error = %e, "Job file was deleted during transfer.");
                        self.abort_job(&mut queue, job, "file was deleted");
                    },
                    _ => {
                        if job.credit(destination) {
                            info!(job_index = job.index(), path = %path, "Job has all required copies.");
                        }
                    },
                },
                TransferOutcome::ChecksumMismatch {
                    source: expected,
                    destination: actual,
                } => {
                    statistics
                        .num_checksum_mismatches
                        .fetch_add(1, Ordering::Relaxed);
                    warn!(
                        path = %path,
                        destination = %destination,
                        expected = expected,
                        actual = actual,
                        "Checksum mismatch, destination copy was deleted.",
                    );
                    job.defer_destination(destination, retry_delay);
                },
                TransferOutcome::SourceMissing => {},
                TransferOutcome::SourceFailed(e) => {
                    error!(path = %path, source = %source, error = %e, "Source slave failed transfer.");
                    job.defer_source(source, retry_delay);
                },
                TransferOutcome::DestinationFailed(e) => {
                    error!(
                        path = %path,
                        destination = %destination,
                        error = %e,
                        "Destination slave failed transfer.",
                    );
                    job.defer_destination(destination, retry_delay);
                },
                TransferOutcome::Unavailable(e) => {
                    debug!(path = %path, error = %e, "Slave became unavailable during transfer.");
                },
                TransferOutcome::Aborted(reason) => {
                    info!(path = %path, reason = %reason, "Job transfer aborted.");
                },
            }

            job.end_transfer(destination);
            queue
                .claims
                .remove(&(path.clone(), destination.to_string()));
        }

        self.settle(job).await;
        self.notify_work();
    }

    /// Removes an aborted job once idle, or cleans up a job with all of
    /// its copies.
    async fn settle(&self, job: &Arc<Job>) {
        {
            let mut queue = self.inner.queue.lock();
            if job.in_flight() != 0 {
                return;
            }

            if job.is_aborted() {
                queue.remove(job);
                return;
            }

            if job.transfer_num() != 0
                || queue.cleaning.contains(job.path())
                || !job.start_cleanup()
            {
                return;
            }
            queue.cleaning.insert(job.path().clone());
        }

        self.run_cleanup(job.clone()).await;
    }

    #[instrument(
        name = "job-cleanup",
        skip_all,
        fields(job_index = job.index(), path = %job.path())
    )]
    /// Removes the copies the job no longer needs.
    ///
    /// Copies outside the destination set always go, then copies on
    /// offline slaves followed by online slaves while there are more than
    /// the job was created for.
    async fn run_cleanup(&self, job: Arc<Job>) {
        let path = job.path();

        match self.inner.vfs.slaves_holding(path) {
            Ok(holders) => {
                let destinations = job.destinations();
                let required = job.original_transfer_num() as usize;

                let (kept, excess): (BTreeSet<_>, BTreeSet<_>) = holders
                    .into_iter()
                    .partition(|slave| destinations.contains(slave));
                for slave in excess.iter() {
                    self.remove_copy(path, slave).await;
                }

                let (online, offline): (Vec<_>, Vec<_>) = kept
                    .iter()
                    .partition(|slave| self.inner.registry.is_available(slave));

                let mut remaining = kept.len();
                for slave in offline.into_iter().chain(online.into_iter().rev()) {
                    if remaining <= required {
                        break;
                    }
                    self.remove_copy(path, slave).await;
                    remaining -= 1;
                }
            },
            Err(e) => {
                warn!(error = %e, "Job file vanished before cleanup, nothing to remove.");
            },
        }

        job.finish();
        {
            let mut queue = self.inner.queue.lock();
            queue.cleaning.remove(path);
            queue.remove(&job);
        }
        self.inner
            .statistics
            .num_jobs_completed
            .fetch_add(1, Ordering::Relaxed);
        info!(time_spent = ?job.time_spent(), "Job completed.");

        self.notify_work();
    }

    async fn remove_copy(&self, path: &VirtualPath, slave: &str) {
        if let Err(e) = self.inner.vfs.remove_holder(path, slave) {
            warn!(slave = %slave, error = %e, "Copy already gone, skipping.");
            return;
        }
        self.inner
            .statistics
            .num_copies_removed
            .fetch_add(1, Ordering::Relaxed);

        match self.inner.registry.client(slave) {
            Ok(client) => delete_copy(client.as_ref(), path, slave).await,
            Err(_) => {
                debug!(slave = %slave, "Slave is offline, its copy is no longer tracked.");
            },
        }
        debug!(slave = %slave, "Removed excess copy.");
    }

    /// The slave names of every worker which should be running.
    pub(crate) fn online_slaves(&self) -> BTreeSet<SlaveName> {
        self.inner.registry.online_slaves().into_iter().collect()
    }

    pub(crate) fn idle_interval(&self) -> std::time::Duration {
        self.inner.config.idle_interval
    }
}

enum Enqueued {
    Queued(Arc<Job>),
    Satisfied(Arc<Job>),
}

async fn delete_copy(client: &dyn SlaveClient, path: &VirtualPath, slave: &str) {
    match client.delete(path).await {
        Ok(()) | Err(RemoteError::FileNotFound(_)) => {},
        Err(e) => warn!(slave = %slave, path = %path, error = %e, "Unable to delete copy."),
    }
}
