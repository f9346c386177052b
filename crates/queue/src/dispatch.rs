//! Bounded notification dispatcher.
//!
//! The engine hands notices over through [`DispatchHandle`], which never
//! blocks: a full queue drops the notice and counts it. Workers deliver
//! through a [`NotificationGateway`] with exponential backoff, and notices
//! that exhaust their retries are logged as dead letters. Delivery outcomes
//! never touch report state.

#![allow(missing_docs)]

use std::sync::Arc;

use flare_common::{GatewayConfig, Metrics, get_metrics};
use flare_core::{AlertNotice, NotificationDispatch, NotificationGatewayRef, NotifyChannel};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::retry::{DeadLetterEntry, RetryConfig};

/// One queued delivery.
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub channel: NotifyChannel,
    pub notice: AlertNotice,
}

/// Non-blocking sender side, handed to the engine.
#[derive(Clone)]
pub struct DispatchHandle {
    sender: mpsc::Sender<DispatchJob>,
}

impl NotificationDispatch for DispatchHandle {
    fn dispatch(&self, channel: NotifyChannel, notice: AlertNotice) {
        let report_id = notice.report_id.clone();
        match self.sender.try_send(DispatchJob { channel, notice }) {
            Ok(()) => Metrics::incr(&get_metrics().notifications_enqueued),
            Err(mpsc::error::TrySendError::Full(_)) => {
                Metrics::incr(&get_metrics().notifications_dropped);
                warn!(report_id = %report_id, channel = %channel, "Dispatch queue full, notice dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Metrics::incr(&get_metrics().notifications_dropped);
                warn!(report_id = %report_id, channel = %channel, "Dispatcher stopped, notice dropped");
            }
        }
    }
}

/// Notification dispatcher.
pub struct Dispatcher {
    sender: mpsc::Sender<DispatchJob>,
    receiver: mpsc::Receiver<DispatchJob>,
    workers: usize,
    retry: RetryConfig,
}

impl Dispatcher {
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        Self {
            sender,
            receiver,
            workers: config.workers.max(1),
            retry: RetryConfig::from(config),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sender for enqueueing notices.
    #[must_use]
    pub fn handle(&self) -> DispatchHandle {
        DispatchHandle {
            sender: self.sender.clone(),
        }
    }

    /// Start delivering. The returned task finishes once every handle is
    /// dropped and in-flight deliveries completed.
    pub fn start(self, gateway: NotificationGatewayRef) -> JoinHandle<()> {
        let Self {
            sender,
            receiver,
            workers,
            retry,
        } = self;
        drop(sender);

        tokio::spawn(async move {
            info!("Notification dispatcher starting with {} workers", workers);
            run_dispatcher(receiver, gateway, workers, Arc::new(retry)).await;
            info!("Notification dispatcher stopped");
        })
    }
}

async fn run_dispatcher(
    mut receiver: mpsc::Receiver<DispatchJob>,
    gateway: NotificationGatewayRef,
    workers: usize,
    retry: Arc<RetryConfig>,
) {
    let semaphore = Arc::new(Semaphore::new(workers));

    while let Some(job) = receiver.recv().await {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let gateway = gateway.clone();
        let retry = retry.clone();

        tokio::spawn(async move {
            let _permit = permit;
            deliver_with_retry(job, &gateway, &retry).await;
        });
    }

    // Drain in-flight deliveries.
    let _ = semaphore.acquire_many(u32::try_from(workers).unwrap_or(u32::MAX)).await;
}

/// Deliver one notice, retrying with backoff. Returns whether it was
/// delivered.
pub async fn deliver_with_retry(
    job: DispatchJob,
    gateway: &NotificationGatewayRef,
    retry: &RetryConfig,
) -> bool {
    let mut attempt = 0;
    loop {
        match gateway.notify(job.channel, &job.notice).await {
            Ok(result) if result.delivered => {
                get_metrics().record_delivery(true);
                debug!(
                    report_id = %job.notice.report_id,
                    channel = %job.channel,
                    kind = ?job.notice.kind,
                    "Notice delivered"
                );
                return true;
            }
            Ok(result) => {
                debug!(
                    report_id = %job.notice.report_id,
                    channel = %job.channel,
                    detail = result.detail.as_deref().unwrap_or_default(),
                    "Notice skipped"
                );
                return false;
            }
            Err(e) if retry.should_retry(attempt) => {
                let delay = retry.delay_for_attempt(attempt);
                debug!(
                    report_id = %job.notice.report_id,
                    channel = %job.channel,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Delivery failed, retrying"
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                get_metrics().record_delivery(false);
                let entry = DeadLetterEntry::new(job, attempt + 1, e.to_string());
                error!(
                    report_id = %entry.job.notice.report_id,
                    channel = %entry.job.channel,
                    attempts = entry.attempts,
                    failed_at = %entry.failed_at,
                    error = %entry.last_error,
                    "Notice moved to dead letters"
                );
                return false;
            }
        }
    }
}
