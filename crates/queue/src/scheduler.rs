//! Per-report lifecycle timers.
//!
//! Each active report owns one interval task that emits expansion ticks, and
//! each pending report may own a one-shot auto-verify deadline. Timers only
//! emit [`LifecycleTick`]s into a channel; [`run_lifecycle_worker`] turns them
//! into engine calls. Timers hold no report state, so after a restart they are
//! rebuilt from the persisted reports by `ReportService::resume_schedules`.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flare_core::{LifecycleScheduler, ReportService};
use tokio::sync::{Mutex, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

/// Maximum number of ticks handled concurrently.
const MAX_TICK_WORKERS: usize = 8;

/// Timer event for one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleTick {
    Expand { report_id: String },
    AutoVerify { report_id: String },
}

impl LifecycleTick {
    #[must_use]
    pub fn report_id(&self) -> &str {
        match self {
            Self::Expand { report_id } | Self::AutoVerify { report_id } => report_id,
        }
    }
}

#[derive(Default)]
struct ReportTimers {
    expansion: Option<JoinHandle<()>>,
    auto_verify: Option<JoinHandle<()>>,
}

impl ReportTimers {
    fn abort(self) -> bool {
        let mut aborted = false;
        for handle in [self.expansion, self.auto_verify].into_iter().flatten() {
            handle.abort();
            aborted = true;
        }
        aborted
    }
}

/// Tokio-backed [`LifecycleScheduler`].
pub struct TickScheduler {
    sender: mpsc::Sender<LifecycleTick>,
    timers: Mutex<HashMap<String, ReportTimers>>,
}

impl TickScheduler {
    /// Create a scheduler and the receiving end of its tick channel.
    #[must_use]
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<LifecycleTick>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let scheduler = Arc::new(Self {
            sender,
            timers: Mutex::new(HashMap::new()),
        });
        (scheduler, receiver)
    }

    /// Number of reports with at least one live timer.
    pub async fn scheduled_reports(&self) -> usize {
        self.timers
            .lock()
            .await
            .values()
            .filter(|t| {
                t.expansion.as_ref().is_some_and(|h| !h.is_finished())
                    || t.auto_verify.as_ref().is_some_and(|h| !h.is_finished())
            })
            .count()
    }
}

#[async_trait]
impl LifecycleScheduler for TickScheduler {
    async fn schedule_expansion(&self, report_id: &str, every: Duration) {
        let sender = self.sender.clone();
        let id = report_id.to_string();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let tick = LifecycleTick::Expand {
                    report_id: id.clone(),
                };
                if sender.send(tick).await.is_err() {
                    break;
                }
            }
        });

        let mut timers = self.timers.lock().await;
        let entry = timers.entry(report_id.to_string()).or_default();
        if let Some(previous) = entry.expansion.replace(handle) {
            previous.abort();
        }
        debug!(report_id, every_secs = every.as_secs(), "Expansion ticks scheduled");
    }

    async fn schedule_auto_verify(&self, report_id: &str, after: Duration) {
        let sender = self.sender.clone();
        let id = report_id.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = sender.send(LifecycleTick::AutoVerify { report_id: id }).await;
        });

        let mut timers = self.timers.lock().await;
        let entry = timers.entry(report_id.to_string()).or_default();
        if let Some(previous) = entry.auto_verify.replace(handle) {
            previous.abort();
        }
        debug!(report_id, after_secs = after.as_secs(), "Auto-verify scheduled");
    }

    async fn cancel(&self, report_id: &str) -> bool {
        let removed = self.timers.lock().await.remove(report_id);
        let cancelled = removed.is_some_and(ReportTimers::abort);
        if cancelled {
            debug!(report_id, "Lifecycle timers cancelled");
        }
        cancelled
    }
}

/// Drive the engine from the tick channel until every sender is gone.
pub async fn run_lifecycle_worker(mut receiver: mpsc::Receiver<LifecycleTick>, service: ReportService) {
    info!("Lifecycle worker starting with {} workers", MAX_TICK_WORKERS);
    let semaphore = Arc::new(Semaphore::new(MAX_TICK_WORKERS));

    while let Some(tick) = receiver.recv().await {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let service = service.clone();

        tokio::spawn(async move {
            let _permit = permit;
            process_tick(&service, tick).await;
        });
    }

    info!("Lifecycle worker stopped");
}

async fn process_tick(service: &ReportService, tick: LifecycleTick) {
    match &tick {
        LifecycleTick::Expand { report_id } => match service.handle_expansion_tick(report_id).await {
            Ok(Some(radius_km)) => debug!(report_id = %report_id, radius_km, "Expansion tick handled"),
            Ok(None) => {}
            Err(e) => error!(report_id = %report_id, error = %e, "Expansion tick failed"),
        },
        LifecycleTick::AutoVerify { report_id } => match service.handle_auto_verify(report_id).await {
            Ok(true) => info!(report_id = %report_id, "Report auto-verified"),
            Ok(false) => {}
            Err(e) => error!(report_id = %report_id, error = %e, "Auto-verify failed"),
        },
    }
}
