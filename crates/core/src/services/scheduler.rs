//! Lifecycle scheduling seam.
//!
//! The engine asks for timers; an implementation in the queue crate fires
//! them. Timers are keyed by report id and carry no state of their own, so
//! after a restart they are rebuilt from the persisted reports.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait LifecycleScheduler: Send + Sync {
    /// Start (or restart) recurring expansion ticks for a report.
    async fn schedule_expansion(&self, report_id: &str, every: Duration);

    /// Fire a single auto-verify deadline for a pending report.
    async fn schedule_auto_verify(&self, report_id: &str, after: Duration);

    /// Drop every timer of a report. Returns whether any timer existed.
    async fn cancel(&self, report_id: &str) -> bool;
}

/// Shared scheduler handle.
pub type LifecycleSchedulerRef = Arc<dyn LifecycleScheduler>;

/// Scheduler that never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpScheduler;

#[async_trait]
impl LifecycleScheduler for NoOpScheduler {
    async fn schedule_expansion(&self, _report_id: &str, _every: Duration) {}

    async fn schedule_auto_verify(&self, _report_id: &str, _after: Duration) {}

    async fn cancel(&self, _report_id: &str) -> bool {
        false
    }
}
