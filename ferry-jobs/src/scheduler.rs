use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ferry_node::SlaveName;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

use crate::manager::JobManager;

/// A handle to the job scheduler.
///
/// Dropping the handle stops the scheduler and every worker, running
/// transfers are finished first.
pub struct SchedulerHandle {
    manager: JobManager,
    kill_switch: Arc<AtomicBool>,
}

impl SchedulerHandle {
    /// Kills the scheduler service and its workers.
    pub fn kill(&self) {
        self.kill_switch.store(true, Ordering::Relaxed);
        self.manager.notify_work();
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Starts the job scheduler service.
///
/// The scheduler keeps exactly one worker per online slave. Workers pull
/// transfers where their slave is the destination and sleep until new
/// work is signalled when there is none.
pub(crate) fn start_scheduler(manager: JobManager) -> SchedulerHandle {
    let kill_switch = Arc::new(AtomicBool::new(false));

    tokio::spawn(scheduler_service(manager.clone(), kill_switch.clone()));

    SchedulerHandle {
        manager,
        kill_switch,
    }
}

async fn scheduler_service(manager: JobManager, kill_switch: Arc<AtomicBool>) {
    info!("Job scheduler is running.");

    let mut online = WatchStream::new(manager.registry().watch_online());
    let mut work_rx = manager.subscribe_work();
    let mut workers = BTreeMap::new();

    let mut interval = interval(manager.idle_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        if kill_switch.load(Ordering::Relaxed) {
            break;
        }

        tokio::select! {
            slaves = online.next() => {
                match slaves {
                    Some(slaves) => update_workers(&manager, &mut workers, &slaves),
                    None => break,
                }
            },
            _ = work_rx.changed() => {},
            _ = interval.tick() => {},
        }
    }

    for (_, worker) in workers {
        worker.store(true, Ordering::Relaxed);
    }
    manager.notify_work();
    info!("Job scheduler has shut down.");
}

/// Starts workers for slaves which came online and kills the workers of
/// slaves which went away.
fn update_workers(
    manager: &JobManager,
    workers: &mut BTreeMap<SlaveName, Arc<AtomicBool>>,
    online: &BTreeSet<SlaveName>,
) {
    workers.retain(|slave, kill_switch| {
        let keep = online.contains(slave);
        if !keep {
            kill_switch.store(true, Ordering::Relaxed);
        }
        keep
    });

    for slave in online {
        if workers.contains_key(slave) {
            continue;
        }

        let kill_switch = Arc::new(AtomicBool::new(false));
        tokio::spawn(slave_worker(
            manager.clone(),
            slave.clone(),
            kill_switch.clone(),
        ));
        workers.insert(slave.clone(), kill_switch);
    }

    // Wake stopped workers so they notice their kill switch.
    manager.notify_work();
}

#[instrument(name = "job-worker", skip_all, fields(slave = %slave))]
async fn slave_worker(manager: JobManager, slave: SlaveName, kill_switch: Arc<AtomicBool>) {
    info!("Job worker started.");

    let mut work_rx = manager.subscribe_work();
    while !kill_switch.load(Ordering::Relaxed) {
        drop(work_rx.borrow_and_update());

        if let Some(work) = manager.assign_work(&slave) {
            manager.process(work).await;
            continue;
        }

        let _ = timeout(manager.idle_interval(), work_rx.changed()).await;
    }

    info!("Job worker stopped.");
}
