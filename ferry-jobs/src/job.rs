use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use ferry_node::{get_unix_timestamp_ms, SlaveName, SlaveRegistry, VirtualPath};
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;

use crate::error::JobError;
use crate::transfer::{AbortHandle, AbortSignal, TransferProgress};

/// The creation order of a job, starting at `1`.
pub type JobIndex = u64;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JobPhase {
    /// Waiting for a worker to pick up one of its destinations.
    Queued,
    /// At least one transfer is running.
    Transferring,
    /// The required copies exist and excess copies are being removed.
    Cleanup,
    Done,
    Aborted,
}

#[derive(Debug, Clone)]
/// A request to replicate a file onto a set of slaves.
pub struct JobRequest {
    pub path: VirtualPath,
    pub destinations: BTreeSet<SlaveName>,
    pub priority: i32,
    pub required_copies: u32,
    /// Overrides the manager's default for counting offline
    /// destination slaves.
    pub only_count_online: Option<bool>,
}

impl JobRequest {
    pub fn new<I, S>(path: impl Into<VirtualPath>, destinations: I, required_copies: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SlaveName>,
    {
        Self {
            path: path.into(),
            destinations: destinations.into_iter().map(|s| s.into()).collect(),
            priority: 0,
            required_copies,
            only_count_online: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_only_count_online(mut self, only_count_online: bool) -> Self {
        self.only_count_online = Some(only_count_online);
        self
    }
}

struct ActiveTransfer {
    source: SlaveName,
    progress: Arc<TransferProgress>,
    abort: AbortHandle,
    started: Instant,
}

#[derive(Default)]
struct JobState {
    transfer_num: u32,
    time_spent: Duration,
    cleaning: bool,
    done: bool,
    aborted: bool,
    /// Running transfers keyed by their destination.
    active: BTreeMap<SlaveName, ActiveTransfer>,
    deferred_destinations: HashMap<SlaveName, Instant>,
    deferred_sources: HashMap<SlaveName, Instant>,
    /// The held copies have not been counted yet.
    pending_recount: bool,
}

/// A file which must be copied to a number of its destination slaves.
///
/// The remaining copy count and running transfers sit behind their own
/// lock so progress reporting never waits on the job queue.
pub struct Job {
    index: JobIndex,
    path: VirtualPath,
    priority: RwLock<i32>,
    created_at: u64,
    original_transfer_num: u32,
    only_count_online: bool,
    destinations: RwLock<Arc<BTreeSet<SlaveName>>>,
    state: Mutex<JobState>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("index", &self.index)
            .field("path", &self.path)
            .field("transfer_num", &self.transfer_num())
            .finish()
    }
}

impl Job {
    pub(crate) fn new(
        index: JobIndex,
        request: JobRequest,
        only_count_online: bool,
    ) -> Result<Self, JobError> {
        if request.destinations.is_empty() {
            return Err(JobError::NoDestinations);
        }

        let required = request.required_copies;
        if required == 0 || required as usize > request.destinations.len() {
            return Err(JobError::InvalidRequiredCopies {
                required,
                destinations: request.destinations.len(),
            });
        }

        Ok(Self {
            index,
            path: request.path,
            priority: RwLock::new(request.priority),
            created_at: get_unix_timestamp_ms(),
            original_transfer_num: required,
            only_count_online: request.only_count_online.unwrap_or(only_count_online),
            destinations: RwLock::new(Arc::new(request.destinations)),
            state: Mutex::new(JobState {
                transfer_num: required,
                ..Default::default()
            }),
        })
    }

    #[inline]
    pub fn index(&self) -> JobIndex {
        self.index
    }

    #[inline]
    pub fn path(&self) -> &VirtualPath {
        &self.path
    }

    #[inline]
    pub fn priority(&self) -> i32 {
        *self.priority.read()
    }

    #[inline]
    /// The unix timestamp in milliseconds the job was created at.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    #[inline]
    /// The number of copies the job was created with.
    pub fn original_transfer_num(&self) -> u32 {
        self.original_transfer_num
    }

    #[inline]
    pub fn only_count_online(&self) -> bool {
        self.only_count_online
    }

    /// The destination slaves of the job.
    pub fn destinations(&self) -> Arc<BTreeSet<SlaveName>> {
        self.destinations.read().clone()
    }

    /// The number of copies still missing.
    pub fn transfer_num(&self) -> u32 {
        self.state.lock().transfer_num
    }

    /// The accumulated time spent transferring.
    pub fn time_spent(&self) -> Duration {
        self.state.lock().time_spent
    }

    pub fn phase(&self) -> JobPhase {
        let state = self.state.lock();
        if state.aborted {
            JobPhase::Aborted
        } else if state.done {
            JobPhase::Done
        } else if state.cleaning {
            JobPhase::Cleanup
        } else if !state.active.is_empty() {
            JobPhase::Transferring
        } else {
            JobPhase::Queued
        }
    }

    pub fn is_transferring(&self) -> bool {
        !self.state.lock().active.is_empty()
    }

    pub fn is_aborted(&self) -> bool {
        self.state.lock().aborted
    }

    /// Merges the destinations of a second request for the same file.
    pub(crate) fn merge(&self, request: &JobRequest) {
        {
            let mut destinations = self.destinations.write();
            if !request.destinations.is_subset(destinations.as_ref()) {
                let mut merged = destinations.as_ref().clone();
                merged.extend(request.destinations.iter().cloned());
                *destinations = Arc::new(merged);
            }
        }

        let mut priority = self.priority.write();
        *priority = (*priority).max(request.priority);
    }

    /// The destinations which may currently receive the file.
    ///
    /// Offline destinations are left out when the job only counts
    /// online slaves.
    pub(crate) fn effective_destinations(&self, registry: &dyn SlaveRegistry) -> BTreeSet<SlaveName> {
        let destinations = self.destinations();
        if !self.only_count_online {
            return destinations.as_ref().clone();
        }

        destinations
            .iter()
            .filter(|name| registry.is_available(name))
            .cloned()
            .collect()
    }

    /// Returns if the destinations holding the file already make up the
    /// copies the job was created for.
    pub(crate) fn is_archived(
        &self,
        holders: &BTreeSet<SlaveName>,
        registry: &dyn SlaveRegistry,
    ) -> bool {
        let held = self
            .effective_destinations(registry)
            .intersection(holders)
            .count();
        held >= self.original_transfer_num as usize
    }

    /// Counts a verified copy on `slave`.
    ///
    /// Returns `true` when this was the last copy the job needed.
    pub(crate) fn credit(&self, slave: &str) -> bool {
        let mut state = self.state.lock();
        if state.transfer_num == 0 {
            return false;
        }

        state.transfer_num -= 1;
        debug!(
            job_index = self.index,
            slave = %slave,
            remaining = state.transfer_num,
            "Credited job copy.",
        );
        state.transfer_num == 0
    }

    /// Credits every destination already holding the file.
    ///
    /// Returns `true` if no copies are missing afterwards.
    pub(crate) fn credit_holders(
        &self,
        holders: &BTreeSet<SlaveName>,
        registry: &dyn SlaveRegistry,
    ) -> bool {
        let destinations = self.effective_destinations(registry);
        for slave in destinations.intersection(holders) {
            self.credit(slave);
        }
        self.transfer_num() == 0
    }

    /// Delays counting held copies until the next scheduling pass.
    pub(crate) fn mark_recount(&self) {
        self.state.lock().pending_recount = true;
    }

    pub(crate) fn take_recount(&self) -> bool {
        std::mem::take(&mut self.state.lock().pending_recount)
    }

    /// The slaves sending the file for running transfers.
    pub(crate) fn active_sources(&self) -> Vec<SlaveName> {
        self.state
            .lock()
            .active
            .values()
            .map(|transfer| transfer.source.clone())
            .collect()
    }

    /// The number of transfers running for this job.
    pub(crate) fn in_flight(&self) -> usize {
        self.state.lock().active.len()
    }

    /// Returns if another transfer may start without exceeding the
    /// remaining copy count.
    pub(crate) fn wants_transfer(&self) -> bool {
        let state = self.state.lock();
        !state.aborted
            && !state.cleaning
            && !state.done
            && state.active.len() < state.transfer_num as usize
    }

    pub(crate) fn begin_transfer(
        &self,
        source: &str,
        destination: &str,
    ) -> (Arc<TransferProgress>, AbortSignal) {
        let (abort, signal) = AbortHandle::new();
        let progress = Arc::new(TransferProgress::default());

        let mut state = self.state.lock();
        if state.aborted {
            abort.abort("job was aborted");
        }
        state.active.insert(
            destination.to_string(),
            ActiveTransfer {
                source: source.to_string(),
                progress: progress.clone(),
                abort,
                started: Instant::now(),
            },
        );

        (progress, signal)
    }

    pub(crate) fn end_transfer(&self, destination: &str) {
        let mut state = self.state.lock();
        if let Some(transfer) = state.active.remove(destination) {
            state.time_spent += transfer.started.elapsed();
        }
    }

    /// Skips `slave` as a destination until the delay has passed.
    pub(crate) fn defer_destination(&self, slave: &str, delay: Duration) {
        self.state
            .lock()
            .deferred_destinations
            .insert(slave.to_string(), Instant::now() + delay);
    }

    /// Skips `slave` as a source until the delay has passed.
    pub(crate) fn defer_source(&self, slave: &str, delay: Duration) {
        self.state
            .lock()
            .deferred_sources
            .insert(slave.to_string(), Instant::now() + delay);
    }

    pub(crate) fn is_destination_deferred(&self, slave: &str) -> bool {
        let mut state = self.state.lock();
        is_deferred(&mut state.deferred_destinations, slave)
    }

    /// The sources currently skipped by the job.
    pub(crate) fn deferred_sources(&self) -> BTreeSet<SlaveName> {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.deferred_sources.retain(|_, until| *until > now);
        state.deferred_sources.keys().cloned().collect()
    }

    /// Stops the job and signals every running transfer to abort.
    ///
    /// Returns `false` if the job was already finished or aborted.
    pub(crate) fn abort(&self, reason: &str) -> bool {
        let mut state = self.state.lock();
        if state.aborted || state.done {
            return false;
        }

        state.aborted = true;
        state.transfer_num = 0;
        for transfer in state.active.values() {
            transfer.abort.abort(reason);
        }
        true
    }

    /// Marks the job as cleaning up, returns `false` if it already is
    /// or can no longer be cleaned.
    ///
    /// A job cleaning up never needs another copy, even when it got there
    /// because its destinations already held enough of them.
    pub(crate) fn start_cleanup(&self) -> bool {
        let mut state = self.state.lock();
        if state.cleaning || state.done || state.aborted {
            return false;
        }
        state.transfer_num = 0;
        state.cleaning = true;
        true
    }

    pub(crate) fn finish(&self) {
        let mut state = self.state.lock();
        state.transfer_num = 0;
        state.cleaning = false;
        state.done = true;
    }

    /// A point in time view of the job for listings.
    pub fn snapshot(&self) -> JobSnapshot {
        let destinations = self.destinations();
        let priority = self.priority();
        let phase = self.phase();

        let state = self.state.lock();
        let transfers = state
            .active
            .iter()
            .map(|(destination, transfer)| TransferSnapshot {
                source: transfer.source.clone(),
                destination: destination.clone(),
                transferred: transfer.progress.transferred(),
                speed: transfer.progress.speed(),
                elapsed: transfer.started.elapsed(),
            })
            .collect();

        JobSnapshot {
            index: self.index,
            path: self.path.clone(),
            priority,
            created_at: self.created_at,
            phase,
            transfer_num: state.transfer_num,
            original_transfer_num: self.original_transfer_num,
            destinations: destinations.as_ref().clone(),
            time_spent: state.time_spent,
            transfers,
        }
    }
}

fn is_deferred(deferred: &mut HashMap<SlaveName, Instant>, slave: &str) -> bool {
    match deferred.get(slave) {
        Some(until) if *until > Instant::now() => true,
        Some(_) => {
            deferred.remove(slave);
            false
        },
        None => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A running transfer as seen by operators.
pub struct TransferSnapshot {
    pub source: SlaveName,
    pub destination: SlaveName,
    pub transferred: u64,
    /// Bytes per second.
    pub speed: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub index: JobIndex,
    pub path: VirtualPath,
    pub priority: i32,
    pub created_at: u64,
    pub phase: JobPhase,
    pub transfer_num: u32,
    pub original_transfer_num: u32,
    pub destinations: BTreeSet<SlaveName>,
    pub time_spent: Duration,
    pub transfers: Vec<TransferSnapshot>,
}
