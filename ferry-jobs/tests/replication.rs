use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ferry_jobs::{
    ChecksumPolicy,
    JobManager,
    JobManagerConfig,
    JobPhase,
    JobRanges,
    JobRequest,
    Work,
};
use ferry_node::test_utils::{MemoryNetwork, MemorySlave, MemoryVfs, SlaveFaults};
use ferry_node::{
    RemoteError,
    SlaveManager,
    SlaveName,
    SlaveStatus,
    Vfs,
    VfsError,
    VirtualPath,
};
use parking_lot::Mutex;
use ferry_selection::{SelectionConfig, SlaveSelectionManager};

const FILE: &str = "/mp3/release/01.mp3";
const DATA: &[u8] = b"some very important audio";

struct Cluster {
    network: MemoryNetwork,
    registry: SlaveManager,
    vfs: MemoryVfs,
}

impl Cluster {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt::try_init();
        Self {
            network: MemoryNetwork::default(),
            registry: SlaveManager::new(),
            vfs: MemoryVfs::default(),
        }
    }

    fn slave(&self, name: &str) -> MemorySlave {
        let slave = MemorySlave::new(name, &self.network);
        self.registry
            .add_slave(name, Arc::new(slave.clone()))
            .expect("Register slave.");
        self.registry
            .set_online(name, SlaveStatus::default())
            .expect("Set slave online.");
        slave
    }

    /// A slave holding the test file, both physically and in the VFS.
    fn holder(&self, name: &str) -> MemorySlave {
        let slave = self.slave(name);
        slave.put_file(FILE, DATA);
        let mut holders = self.vfs.holders(&path());
        holders.insert(name.to_string());
        self.vfs.add_file(FILE, DATA.len() as u64, holders);
        slave
    }

    fn manager(&self, config: JobManagerConfig) -> JobManager {
        self.manager_with(&SelectionConfig::default(), config)
    }

    fn manager_with(&self, selection: &SelectionConfig, config: JobManagerConfig) -> JobManager {
        let selection = SlaveSelectionManager::new(
            Arc::new(self.registry.clone()),
            Arc::new(self.vfs.clone()),
            selection,
        )
        .expect("Create selection manager.");
        JobManager::new(selection, config)
    }
}

fn path() -> VirtualPath {
    VirtualPath::new(FILE)
}

fn names(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn test_config() -> JobManagerConfig {
    JobManagerConfig::default()
        .with_poll_interval(Duration::from_millis(5))
        .with_retry_delay(Duration::from_secs(60))
        .with_idle_interval(Duration::from_millis(50))
}

/// Assigns and runs the next transfer for `slave`.
async fn transfer_to(manager: &JobManager, slave: &str) {
    match manager.assign_work(slave) {
        Some(work @ Work::Transfer(_)) => manager.process(work).await,
        other => panic!("Expected a transfer for {slave}, got {other:?}"),
    }
}

#[tokio::test]
async fn test_required_copies_then_cleanup() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let source = cluster.holder("source");
    let d1 = cluster.slave("d1");
    let d2 = cluster.slave("d2");
    let d3 = cluster.slave("d3");
    let manager = cluster.manager(test_config());

    let job = manager.add_job(FILE, ["d1", "d2", "d3"], 0, 2).await?;
    assert_eq!(job.transfer_num(), 2);

    transfer_to(&manager, "d1").await;
    assert_eq!(job.transfer_num(), 1);
    assert_eq!(job.phase(), JobPhase::Queued);
    assert_eq!(manager.num_jobs(), 1);

    transfer_to(&manager, "d2").await;
    assert_eq!(job.transfer_num(), 0);
    assert_eq!(job.phase(), JobPhase::Done);
    assert_eq!(manager.num_jobs(), 0, "Done jobs leave the queue.");

    assert_eq!(cluster.vfs.holders(&path()), names(&["d1", "d2"]));
    assert!(!source.has_file(&path()), "The copy outside the destinations is removed.");
    assert_eq!(d1.file(&path()).as_deref(), Some(DATA));
    assert_eq!(d2.file(&path()).as_deref(), Some(DATA));
    assert!(!d3.has_file(&path()));
    assert!(manager.assign_work("d3").is_none());

    let stats = manager.statistics();
    assert_eq!(stats.num_transfers_started(), 2);
    assert_eq!(stats.num_transfers_succeeded(), 2);
    assert_eq!(stats.num_jobs_completed(), 1);
    assert_eq!(stats.num_copies_removed(), 1);
    assert_eq!(stats.num_bytes_transferred(), 2 * DATA.len() as u64);
    assert_eq!(
        cluster.vfs.checksum(&path())?,
        Some(crc32fast::hash(DATA) as u64),
        "The verified checksum is recorded.",
    );
    Ok(())
}

#[tokio::test]
async fn test_cleanup_removes_offline_copies_first() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let _source = cluster.holder("source");
    let offline = cluster.holder("offline");
    let online = cluster.holder("online");
    let _dest = cluster.slave("dest");
    cluster.registry.set_offline("offline")?;
    let manager = cluster.manager(test_config());

    // Every destination but one holds the file already.
    let job = manager
        .add_job(FILE, ["offline", "online", "dest"], 0, 1)
        .await?;
    assert_eq!(job.phase(), JobPhase::Done, "Satisfied jobs are cleaned up immediately.");
    assert_eq!(manager.num_jobs(), 0);

    assert_eq!(cluster.vfs.holders(&path()), names(&["online"]));
    assert!(online.has_file(&path()));
    // The offline slave can't be reached, only its record is removed.
    assert!(offline.has_file(&path()));
    Ok(())
}

#[tokio::test]
async fn test_checksum_mismatch_deletes_destination_copy() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let _source = cluster.holder("source");
    let dest = cluster.slave("dest");
    let other = cluster.slave("other");
    dest.set_faults(SlaveFaults {
        corrupt_received: true,
        ..Default::default()
    });
    let manager = cluster.manager(test_config());

    let job = manager.add_job(FILE, ["dest", "other"], 0, 1).await?;
    transfer_to(&manager, "dest").await;

    assert!(!dest.has_file(&path()));
    assert!(!cluster.vfs.holders(&path()).contains("dest"));
    assert_eq!(job.transfer_num(), 1);
    assert_eq!(manager.statistics().num_checksum_mismatches(), 1);

    // The destination is skipped for a while, other destinations are not.
    assert!(manager.assign_work("dest").is_none());
    transfer_to(&manager, "other").await;
    assert!(other.has_file(&path()));
    assert_eq!(job.phase(), JobPhase::Done);
    Ok(())
}

#[tokio::test]
async fn test_unknown_checksums_are_accepted_when_lenient() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let _source = cluster.holder("source");
    let dest = cluster.slave("dest");
    dest.set_faults(SlaveFaults {
        no_checksums: true,
        ..Default::default()
    });
    let manager = cluster.manager(test_config());

    let job = manager.add_job(FILE, ["dest"], 0, 1).await?;
    transfer_to(&manager, "dest").await;

    assert_eq!(job.phase(), JobPhase::Done);
    assert!(dest.has_file(&path()));
    assert_eq!(cluster.vfs.holders(&path()), names(&["dest"]));
    Ok(())
}

#[tokio::test]
async fn test_unknown_checksums_are_rejected_when_strict() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let _source = cluster.holder("source");
    let dest = cluster.slave("dest");
    dest.set_faults(SlaveFaults {
        no_checksums: true,
        ..Default::default()
    });
    let manager = cluster.manager(test_config().with_checksum_policy(ChecksumPolicy::Strict));

    let job = manager.add_job(FILE, ["dest"], 0, 1).await?;
    transfer_to(&manager, "dest").await;

    assert_eq!(job.transfer_num(), 1);
    assert!(!dest.has_file(&path()));
    assert!(!cluster.vfs.holders(&path()).contains("dest"));
    assert_eq!(manager.statistics().num_transfers_failed(), 1);
    Ok(())
}

#[tokio::test]
async fn test_source_without_copy_is_dropped_as_holder() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let liar = cluster.slave("liar");
    let _dest = cluster.slave("dest");
    cluster.vfs.add_file(FILE, DATA.len() as u64, ["liar"]);
    assert!(!liar.has_file(&path()));
    let manager = cluster.manager(test_config());

    let job = manager.add_job(FILE, ["dest"], 0, 1).await?;
    transfer_to(&manager, "dest").await;

    assert!(cluster.vfs.holders(&path()).is_empty());
    assert_eq!(job.transfer_num(), 1);
    assert_eq!(job.phase(), JobPhase::Queued);
    assert!(manager.assign_work("dest").is_none(), "No source is left.");

    // A real holder turns up later.
    let _source = cluster.holder("source");
    transfer_to(&manager, "dest").await;
    assert_eq!(job.phase(), JobPhase::Done);
    Ok(())
}

#[tokio::test]
async fn test_existing_destination_copy_is_reconciled() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let _source = cluster.holder("source");
    let dest = cluster.slave("dest").with_file(FILE, DATA);
    let manager = cluster.manager(test_config());

    let job = manager.add_job(FILE, ["dest"], 0, 1).await?;
    transfer_to(&manager, "dest").await;

    assert_eq!(job.phase(), JobPhase::Done);
    assert!(dest.has_file(&path()));
    assert_eq!(cluster.vfs.holders(&path()), names(&["dest"]));
    assert_eq!(
        cluster.vfs.checksum(&path())?,
        Some(crc32fast::hash(DATA) as u64),
        "The existing checksum becomes the known checksum.",
    );
    Ok(())
}

#[tokio::test]
async fn test_existing_destination_copy_with_wrong_checksum() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let _source = cluster.holder("source");
    cluster.vfs.set_checksum(&path(), crc32fast::hash(DATA) as u64)?;
    let dest = cluster.slave("dest").with_file(FILE, "something else");
    let manager = cluster.manager(test_config());

    let job = manager.add_job(FILE, ["dest"], 0, 1).await?;
    transfer_to(&manager, "dest").await;

    assert_eq!(job.transfer_num(), 1);
    assert!(!dest.has_file(&path()), "The conflicting copy is removed.");
    assert_eq!(manager.statistics().num_checksum_mismatches(), 1);
    Ok(())
}

#[tokio::test]
async fn test_enqueue_merges_jobs_for_the_same_file() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let _source = cluster.holder("source");
    let _a = cluster.slave("a");
    let _b = cluster.slave("b");
    let manager = cluster.manager(test_config());

    let first = manager.add_job(FILE, ["a"], 0, 1).await?;
    let second = manager.add_job(FILE, ["b"], 5, 1).await?;
    assert_eq!(first.index(), second.index());
    assert_eq!(manager.num_jobs(), 1);
    assert_eq!(first.destinations().as_ref(), &names(&["a", "b"]));
    assert_eq!(first.priority(), 5);
    assert_eq!(manager.statistics().num_jobs_added(), 1);

    let jobs = manager.list_jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].path, path());
    assert_eq!(jobs[0].transfer_num, 1);
    Ok(())
}

#[tokio::test]
async fn test_removing_a_job_aborts_its_transfer() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let _source = cluster.holder("source");
    let dest = cluster.slave("dest");
    dest.set_faults(SlaveFaults {
        never_finish: true,
        ..Default::default()
    });
    let manager = cluster.manager(test_config());

    let job = manager.add_job(FILE, ["dest"], 0, 1).await?;
    let work = manager.assign_work("dest").expect("Transfer should be assigned.");
    let task = tokio::spawn({
        let manager = manager.clone();
        async move { manager.process(work).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let snapshot = manager.list_jobs().remove(0);
    assert_eq!(snapshot.phase, JobPhase::Transferring);
    assert_eq!(snapshot.transfers.len(), 1);
    assert_eq!(snapshot.transfers[0].source, "source");
    assert_eq!(snapshot.transfers[0].destination, "dest");

    assert!(manager.remove_job(job.index()));
    tokio::time::timeout(Duration::from_secs(5), task).await??;

    assert_eq!(job.phase(), JobPhase::Aborted);
    assert_eq!(manager.num_jobs(), 0);
    assert!(!dest.has_file(&path()), "Partial data is discarded.");
    assert!(!cluster.vfs.holders(&path()).contains("dest"));
    assert_eq!(manager.statistics().num_jobs_aborted(), 1);
    Ok(())
}

#[tokio::test]
async fn test_stuck_transfers_time_out() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let _source = cluster.holder("source");
    let dest = cluster.slave("dest");
    dest.set_faults(SlaveFaults {
        never_finish: true,
        ..Default::default()
    });
    let manager = cluster.manager(test_config().with_transfer_timeout(Duration::from_millis(100)));

    let job = manager.add_job(FILE, ["dest"], 0, 1).await?;
    tokio::time::timeout(Duration::from_secs(5), transfer_to(&manager, "dest")).await?;

    assert_eq!(job.transfer_num(), 1);
    assert_eq!(job.phase(), JobPhase::Queued);
    assert!(!dest.has_file(&path()));
    assert_eq!(manager.statistics().num_transfers_failed(), 1);
    assert!(manager.assign_work("dest").is_none(), "The destination is deferred.");
    Ok(())
}

#[tokio::test]
async fn test_deleted_destination_aborts_job() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let _source = cluster.holder("source");
    let _a = cluster.slave("a");
    let _b = cluster.slave("b");
    let manager = cluster.manager(test_config());

    let job = manager.add_job(FILE, ["a", "b"], 0, 1).await?;
    cluster.registry.remove_slave("b")?;

    assert!(manager.assign_work("a").is_none());
    assert_eq!(job.phase(), JobPhase::Aborted);
    assert_eq!(manager.num_jobs(), 0);
    Ok(())
}

#[tokio::test]
async fn test_deleted_file_aborts_job() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let _source = cluster.holder("source");
    let _a = cluster.slave("a");
    let manager = cluster.manager(test_config());

    let job = manager.add_job(FILE, ["a"], 0, 1).await?;
    cluster.vfs.remove_file(&path());

    assert!(manager.assign_work("a").is_none());
    assert_eq!(job.phase(), JobPhase::Aborted);
    assert_eq!(manager.num_jobs(), 0);
    Ok(())
}

#[tokio::test]
async fn test_file_under_cleanup_is_locked() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let _source = cluster.holder("source");
    let d1 = cluster.slave("d1");
    let d2 = cluster.slave("d2");
    let manager = cluster.manager(test_config());

    let first = manager.add_job(FILE, ["d1"], 0, 1).await?;

    // The file reaches d1 outside of the job.
    d1.put_file(FILE, DATA);
    cluster.vfs.add_holder(&path(), "d1")?;
    let cleanup = match manager.assign_work("d2") {
        Some(work @ Work::Cleanup(_)) => work,
        other => panic!("Expected cleanup, got {other:?}"),
    };
    assert_eq!(first.phase(), JobPhase::Cleanup);

    // A job created during cleanup waits for it to finish.
    let second = manager.add_job(FILE, ["d2"], 0, 1).await?;
    assert_ne!(first.index(), second.index());
    assert!(!manager.remove_job(first.index()), "Cleanup can't be interrupted.");
    assert!(manager.assign_work("d2").is_none());

    manager.process(cleanup).await;
    assert_eq!(first.phase(), JobPhase::Done);
    assert_eq!(cluster.vfs.holders(&path()), names(&["d1"]));

    transfer_to(&manager, "d2").await;
    assert!(d2.has_file(&path()));
    assert_eq!(second.phase(), JobPhase::Done);
    assert_eq!(cluster.vfs.holders(&path()), names(&["d2"]));
    Ok(())
}

#[tokio::test]
async fn test_only_count_online_destinations() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let _source = cluster.holder("source");
    let online = cluster.slave("online");
    let offline = cluster.holder("offline");
    cluster.registry.set_offline("offline")?;
    let manager = cluster.manager(test_config());

    // The offline copy does not count, so the job still needs a transfer.
    let request = JobRequest::new(FILE, ["online", "offline"], 1).with_only_count_online(true);
    let job = manager.submit(request).await?;
    assert!(job.only_count_online());
    assert_eq!(job.transfer_num(), 1);
    assert_eq!(job.phase(), JobPhase::Queued);

    transfer_to(&manager, "online").await;
    assert_eq!(job.phase(), JobPhase::Done);
    assert!(online.has_file(&path()));
    assert_eq!(cluster.vfs.holders(&path()), names(&["online"]));
    assert!(offline.has_file(&path()), "Offline slaves can't be reached.");
    Ok(())
}

#[tokio::test]
async fn test_stop_and_remove_ranges() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let source = cluster.slave("source");
    let _dest = cluster.slave("dest");
    for i in 1..=5 {
        let file = format!("/mp3/release/{i:02}.mp3");
        source.put_file(file.as_str(), DATA);
        cluster.vfs.add_file(file.as_str(), DATA.len() as u64, ["source"]);
    }
    let manager = cluster.manager(test_config());
    for i in 1..=5 {
        manager
            .add_job(format!("/mp3/release/{i:02}.mp3"), ["dest"], 0, 1)
            .await?;
    }

    manager.stop_jobs();
    assert!(manager.assign_work("dest").is_none());

    let removed = manager.remove_jobs(&"1-2 4".parse::<JobRanges>()?);
    assert_eq!(removed, vec![1, 2, 4]);
    let remaining = manager
        .list_jobs()
        .into_iter()
        .map(|job| job.index)
        .collect::<Vec<_>>();
    assert_eq!(remaining, vec![3, 5]);

    manager.start_jobs();
    let work = manager.assign_work("dest").expect("Work should be assigned.");
    match &work {
        Work::Transfer(assignment) => assert_eq!(assignment.job().index(), 3),
        other => panic!("Expected a transfer, got {other:?}"),
    }

    assert_eq!(manager.remove_idle_jobs(), vec![5]);
    manager.process(work).await;
    assert_eq!(manager.num_jobs(), 0);
    Ok(())
}

#[tokio::test]
async fn test_workers_replicate_end_to_end() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let _source = cluster.holder("source");
    let slaves = ["d1", "d2", "d3"].map(|name| cluster.slave(name));
    let manager = cluster.manager(test_config());
    let _workers = manager.start_workers();

    manager.add_job(FILE, ["d1", "d2", "d3"], 0, 3).await?;
    tokio::time::timeout(Duration::from_secs(5), async {
        while manager.num_jobs() != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;

    for slave in slaves.iter() {
        assert_eq!(slave.file(&path()).as_deref(), Some(DATA));
    }
    assert_eq!(cluster.vfs.holders(&path()), names(&["d1", "d2", "d3"]));
    assert_eq!(manager.statistics().num_transfers_succeeded(), 3);
    Ok(())
}

#[tokio::test]
async fn test_failed_source_is_skipped_on_retry() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let bad = cluster.holder("bad");
    let _good = cluster.holder("good");
    let dest = cluster.slave("dest");
    bad.set_faults(SlaveFaults {
        fail_status: Some(RemoteError::Io("disk read error".to_string())),
        ..Default::default()
    });
    let manager = cluster.manager(test_config());

    let job = manager.add_job(FILE, ["dest"], 0, 1).await?;
    transfer_to(&manager, "dest").await;

    assert!(!dest.has_file(&path()), "The unverified copy is deleted.");
    assert_eq!(job.transfer_num(), 1);
    assert_eq!(job.phase(), JobPhase::Queued);
    assert!(
        cluster.vfs.holders(&path()).contains("bad"),
        "A failing source is not dropped as a holder.",
    );
    assert_eq!(manager.statistics().num_transfers_failed(), 1);

    // The retry copies from the other holder.
    transfer_to(&manager, "dest").await;
    assert_eq!(dest.file(&path()).as_deref(), Some(DATA));
    assert_eq!(job.phase(), JobPhase::Done);
    assert_eq!(manager.statistics().num_transfers_succeeded(), 1);
    Ok(())
}

#[tokio::test]
async fn test_failed_destination_is_skipped_while_others_continue() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let _source = cluster.holder("source");
    let broken = cluster.slave("broken");
    let other = cluster.slave("other");
    broken.set_faults(SlaveFaults {
        fail_status: Some(RemoteError::Io("disk full".to_string())),
        ..Default::default()
    });
    let manager = cluster.manager(test_config());

    let job = manager.add_job(FILE, ["broken", "other"], 0, 1).await?;
    transfer_to(&manager, "broken").await;

    assert!(!broken.has_file(&path()), "The partial copy is deleted.");
    assert!(!cluster.vfs.holders(&path()).contains("broken"));
    assert_eq!(job.transfer_num(), 1);
    assert_eq!(job.phase(), JobPhase::Queued);
    assert_eq!(manager.num_jobs(), 1);
    assert!(manager.assign_work("broken").is_none(), "The destination is deferred.");

    transfer_to(&manager, "other").await;
    assert_eq!(other.file(&path()).as_deref(), Some(DATA));
    assert_eq!(job.phase(), JobPhase::Done);
    assert_eq!(cluster.vfs.holders(&path()), names(&["other"]));
    Ok(())
}

#[tokio::test]
async fn test_unavailable_slave_requeues_job_unchanged() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let _source = cluster.holder("source");
    let dest = cluster.slave("dest");
    dest.set_faults(SlaveFaults {
        fail_status: Some(RemoteError::Unavailable("dest".to_string())),
        ..Default::default()
    });
    let manager = cluster.manager(test_config());

    let job = manager.add_job(FILE, ["dest"], 0, 1).await?;
    transfer_to(&manager, "dest").await;

    assert_eq!(job.transfer_num(), 1);
    assert_eq!(job.phase(), JobPhase::Queued);
    assert_eq!(manager.statistics().num_transfers_failed(), 1);
    assert_eq!(cluster.vfs.holders(&path()), names(&["source"]));

    // Neither slave is deferred, the next attempt goes straight through.
    dest.set_faults(SlaveFaults::default());
    transfer_to(&manager, "dest").await;
    assert_eq!(dest.file(&path()).as_deref(), Some(DATA));
    assert_eq!(job.phase(), JobPhase::Done);
    assert_eq!(cluster.vfs.holders(&path()), names(&["dest"]));
    Ok(())
}

/// A VFS which asks for work on another slave whenever a copy is recorded.
struct WorkStealingVfs {
    inner: MemoryVfs,
    slave: SlaveName,
    manager: Mutex<Option<JobManager>>,
    num_stolen: AtomicUsize,
}

impl Vfs for WorkStealingVfs {
    fn slaves_holding(&self, file: &VirtualPath) -> Result<BTreeSet<SlaveName>, VfsError> {
        self.inner.slaves_holding(file)
    }

    fn add_holder(&self, file: &VirtualPath, slave: &str) -> Result<(), VfsError> {
        let manager = self.manager.lock().clone();
        if let Some(manager) = manager {
            if let Some(Work::Transfer(_)) = manager.assign_work(&self.slave) {
                self.num_stolen.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.inner.add_holder(file, slave)
    }

    fn remove_holder(&self, file: &VirtualPath, slave: &str) -> Result<(), VfsError> {
        self.inner.remove_holder(file, slave)
    }

    fn checksum(&self, file: &VirtualPath) -> Result<Option<u64>, VfsError> {
        self.inner.checksum(file)
    }

    fn set_checksum(&self, file: &VirtualPath, checksum: u64) -> Result<(), VfsError> {
        self.inner.set_checksum(file, checksum)
    }

    fn size(&self, file: &VirtualPath) -> Result<u64, VfsError> {
        self.inner.size(file)
    }

    fn section_of(&self, path: &VirtualPath) -> Option<VirtualPath> {
        self.inner.section_of(path)
    }

    fn files_under(
        &self,
        dir: &VirtualPath,
    ) -> Result<Vec<(VirtualPath, BTreeSet<SlaveName>)>, VfsError> {
        self.inner.files_under(dir)
    }
}

#[tokio::test]
async fn test_no_extra_copy_while_last_copy_is_recorded() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let _source = cluster.holder("source");
    let a = cluster.slave("a");
    let b = cluster.slave("b");

    let vfs = Arc::new(WorkStealingVfs {
        inner: cluster.vfs.clone(),
        slave: "b".to_string(),
        manager: Mutex::new(None),
        num_stolen: AtomicUsize::new(0),
    });
    let selection = SlaveSelectionManager::new(
        Arc::new(cluster.registry.clone()),
        vfs.clone(),
        &SelectionConfig::default(),
    )?;
    let manager = JobManager::new(selection, test_config());
    *vfs.manager.lock() = Some(manager.clone());

    let job = manager.add_job(FILE, ["a", "b"], 0, 1).await?;
    transfer_to(&manager, "a").await;
    vfs.manager.lock().take();

    assert_eq!(vfs.num_stolen.load(Ordering::Relaxed), 0);
    assert_eq!(job.phase(), JobPhase::Done);
    assert_eq!(cluster.vfs.holders(&path()), names(&["a"]));
    assert!(a.has_file(&path()));
    assert!(!b.has_file(&path()));
    assert_eq!(manager.statistics().num_transfers_started(), 1);
    Ok(())
}

#[tokio::test]
async fn test_busy_job_source_is_not_a_destination() -> anyhow::Result<()> {
    const OTHER: &str = "/mp3/release/02.mp3";

    let cluster = Cluster::new();
    let sender = cluster.holder("sender");
    let receiver = cluster.slave("receiver");
    receiver.set_faults(SlaveFaults {
        never_finish: true,
        ..Default::default()
    });
    let other_holder = cluster.slave("other-holder");
    other_holder.put_file(OTHER, DATA);
    cluster.vfs.add_file(OTHER, DATA.len() as u64, ["other-holder"]);

    let selection = SelectionConfig::from_toml_str(
        r#"
        [[job-upload]]
        filter = "maxuploadsperslave"
        "#,
    )?;
    let manager = cluster.manager_with(&selection, test_config());

    let sending = manager.add_job(FILE, ["receiver"], 0, 1).await?;
    let work = manager
        .assign_work("receiver")
        .expect("Transfer should be assigned.");
    let task = tokio::spawn({
        let manager = manager.clone();
        async move { manager.process(work).await }
    });

    let receiving = manager.add_job(OTHER, ["sender"], 0, 1).await?;
    assert!(
        manager.assign_work("sender").is_none(),
        "A slave sending a job file can't receive one.",
    );

    assert!(manager.remove_job(sending.index()));
    tokio::time::timeout(Duration::from_secs(5), task).await??;

    transfer_to(&manager, "sender").await;
    assert_eq!(sender.file(&VirtualPath::new(OTHER)).as_deref(), Some(DATA));
    assert_eq!(receiving.phase(), JobPhase::Done);
    Ok(())
}
