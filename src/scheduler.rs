//! Periodic sync passes and their in-memory run counters

use crate::database::SharedDb;
use crate::dear::DearClient;
use crate::error::Result;
use crate::sync::{sync_catalog, sync_customers, sync_locations};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// The independent sync jobs run in every pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Locations,
    Catalog,
    Customers,
}

impl SyncKind {
    pub const ALL: [SyncKind; 3] = [SyncKind::Locations, SyncKind::Catalog, SyncKind::Customers];
}

/// Counters for one sync kind since process start
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub running: bool,
    pub last_started: Option<DateTime<Utc>>,
    pub last_finished: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Records handled by the last successful run
    pub last_count: Option<usize>,
}

/// Outcome of one pass; `true` per kind that succeeded
pub type PassReport = BTreeMap<SyncKind, bool>;

/// Runs sync passes against one ERP client and database
pub struct Scheduler {
    dear: Arc<DearClient>,
    db: SharedDb,
    stats: Mutex<BTreeMap<SyncKind, JobStats>>,
    pass_lock: Arc<tokio::sync::Mutex<()>>,
}

impl Scheduler {
    pub fn new(dear: Arc<DearClient>, db: SharedDb) -> Self {
        let stats = SyncKind::ALL
            .into_iter()
            .map(|kind| (kind, JobStats::default()))
            .collect();
        Self {
            dear,
            db,
            stats: Mutex::new(stats),
            pass_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Copy of the current counters
    pub fn snapshot(&self) -> BTreeMap<SyncKind, JobStats> {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a pass is in progress
    pub fn is_running(&self) -> bool {
        self.pass_lock.try_lock().is_err()
    }

    /// Run the three syncs concurrently. A failing sync is recorded and does
    /// not stop the others. Passes never overlap.
    pub async fn run_pass(&self) -> PassReport {
        let _guard = self.pass_lock.lock().await;
        self.run_jobs().await
    }

    /// Start a pass in the background unless one is already running.
    ///
    /// The pass lock is claimed before returning, so of two racing callers
    /// only one gets `true`.
    pub fn spawn_pass(self: &Arc<Self>) -> bool {
        let Ok(guard) = Arc::clone(&self.pass_lock).try_lock_owned() else {
            return false;
        };
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            scheduler.run_jobs().await;
        });
        true
    }

    async fn run_jobs(&self) -> PassReport {
        log::info!("Starting sync pass");

        let (locations, catalog, customers) = tokio::join!(
            self.run_job(SyncKind::Locations, sync_locations(&self.dear, &self.db)),
            self.run_job(SyncKind::Catalog, sync_catalog(&self.dear, &self.db)),
            self.run_job(SyncKind::Customers, sync_customers(&self.dear, &self.db)),
        );

        let report: PassReport = [
            (SyncKind::Locations, locations),
            (SyncKind::Catalog, catalog),
            (SyncKind::Customers, customers),
        ]
        .into_iter()
        .collect();

        let failed = report.values().filter(|ok| !**ok).count();
        if failed == 0 {
            log::info!("Sync pass completed successfully");
        } else {
            log::error!("Sync pass finished with {} failed job(s)", failed);
        }
        report
    }

    async fn run_job(&self, kind: SyncKind, job: impl Future<Output = Result<usize>>) -> bool {
        self.update(kind, |stats| {
            stats.attempts += 1;
            stats.running = true;
            stats.last_started = Some(Utc::now());
        });

        let result = job.await;

        self.update(kind, |stats| {
            stats.running = false;
            stats.last_finished = Some(Utc::now());
            match &result {
                Ok(count) => {
                    stats.successes += 1;
                    stats.last_count = Some(*count);
                    stats.last_error = None;
                }
                Err(e) => {
                    stats.failures += 1;
                    stats.last_error = Some(e.to_string());
                }
            }
        });

        if let Err(e) = &result {
            log::error!("{:?} sync failed: {}", kind, e);
        }
        result.is_ok()
    }

    fn update(&self, kind: SyncKind, f: impl FnOnce(&mut JobStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        f(stats.entry(kind).or_default());
    }

    /// Run a pass immediately, then every `every`, forever.
    pub async fn run_daemon(self: Arc<Self>, every: Duration) {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // The first tick completes immediately
            ticker.tick().await;
            self.run_pass().await;
        }
    }
}
