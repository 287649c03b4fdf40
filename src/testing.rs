//! In-memory collaborator doubles for exercising the listener.
//!
//! These implement the external seams (`JobStore`, `ChainSubscriber`,
//! `RunEngine`) with injectable failures so lifecycle and dispatch
//! behavior can be driven without a chain or a database.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::engine::{RunEngine, RunHandle};
use crate::store::JobStore;
use crate::subscriber::{ChainSubscriber, NotificationSender};
use crate::types::{Address, EventLog, Job, JobId, Notification, Watcher, WatcherKind};

/// Job store backed by a vec, preserving insertion order.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<Vec<Job>>,
    orphan_watchers: Mutex<Vec<Watcher>>,
    fail_listing: AtomicBool,
    fail_queries: AtomicBool,
}

impl MemoryJobStore {
    pub fn insert_job(&self, job: Job) {
        self.jobs.lock().unwrap().push(job);
    }

    /// Persist a watcher whose owning job is absent from the store,
    /// simulating a job deleted after registration.
    pub fn insert_orphan_watcher(&self, watcher: Watcher) {
        self.orphan_watchers.lock().unwrap().push(watcher);
    }

    /// Make `jobs()` fail, as an unreachable store would.
    pub fn fail_job_listing(&self) {
        self.fail_listing.store(true, Ordering::SeqCst);
    }

    /// Make `watchers_at()` fail, as a transient query error would.
    pub fn fail_watcher_queries(&self) {
        self.fail_queries.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn jobs(&self) -> Result<Vec<Job>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            bail!("job store unreachable");
        }
        Ok(self.jobs.lock().unwrap().clone())
    }

    async fn find_job(&self, id: &JobId) -> Result<Job> {
        let jobs = self.jobs.lock().unwrap();
        match jobs.iter().find(|job| &job.id == id) {
            Some(job) => Ok(job.clone()),
            None => bail!("job {id} not found"),
        }
    }

    async fn watchers_at(&self, address: Address, kind: WatcherKind) -> Result<Vec<Watcher>> {
        if self.fail_queries.load(Ordering::SeqCst) {
            bail!("watcher query failed");
        }
        let jobs = self.jobs.lock().unwrap();
        let orphans = self.orphan_watchers.lock().unwrap();
        Ok(jobs
            .iter()
            .flat_map(|job| job.watchers.iter())
            .chain(orphans.iter())
            .filter(|watcher| watcher.address == address && watcher.kind == kind)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct SubscriberState {
    subscriptions: Vec<(Address, NotificationSender)>,
    rejected: HashSet<Address>,
}

/// Subscriber that records registrations and delivers notifications only
/// on demand, after `subscribe` has confirmed them.
#[derive(Default)]
pub struct ManualSubscriber {
    state: Mutex<SubscriberState>,
}

impl ManualSubscriber {
    /// Reject future subscriptions for `address`.
    pub fn reject_address(&self, address: Address) {
        self.state.lock().unwrap().rejected.insert(address);
    }

    /// Addresses with a confirmed subscription, in registration order.
    pub fn subscribed_addresses(&self) -> Vec<Address> {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .map(|(address, _)| *address)
            .collect()
    }

    /// Forward a notification to every confirmed subscription for
    /// `address`. Returns how many queues accepted it.
    pub async fn deliver(&self, address: Address, notification: Notification) -> usize {
        let queues: Vec<NotificationSender> = {
            let state = self.state.lock().unwrap();
            state
                .subscriptions
                .iter()
                .filter(|(subscribed, _)| *subscribed == address)
                .map(|(_, queue)| queue.clone())
                .collect()
        };

        let mut delivered = 0;
        for queue in queues {
            if queue.send(notification.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

#[async_trait]
impl ChainSubscriber for ManualSubscriber {
    async fn subscribe(&self, queue: NotificationSender, address: Address) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.rejected.contains(&address) {
            bail!("subscription rejected for {address:#x}");
        }
        state.subscriptions.push((address, queue));
        Ok(())
    }
}

/// Run engine that records every trigger without executing anything.
#[derive(Default)]
pub struct RecordingEngine {
    runs: Mutex<Vec<(JobId, EventLog)>>,
    next_run: AtomicU64,
    notify: tokio::sync::Notify,
}

impl RecordingEngine {
    /// Triggered runs in arrival order.
    pub fn runs(&self) -> Vec<(JobId, EventLog)> {
        self.runs.lock().unwrap().clone()
    }

    /// Wait until at least `count` runs have been triggered.
    pub async fn wait_for_runs(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.runs.lock().unwrap().len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl RunEngine for RecordingEngine {
    async fn trigger_run(&self, job: Job, log: EventLog) -> RunHandle {
        let run = self.next_run.fetch_add(1, Ordering::SeqCst) + 1;
        self.runs.lock().unwrap().push((job.id, log));
        self.notify.notify_waiters();
        RunHandle {
            run_id: format!("run-{run}"),
        }
    }
}
