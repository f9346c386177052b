//! Report lifecycle engine.
//!
//! Every write to a report goes through [`ReportService`]. Mutations of one
//! report are serialized by a per-report async mutex, then committed with a
//! version check so writers in other processes cannot interleave. Side
//! effects (timers, notifications) run only after the commit succeeded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use flare_common::id::timeline_event_id;
use flare_common::{
    AlertPolicyConfig, AppError, AppResult, IdGenerator, Metrics, PartnerChannel, get_metrics,
};
use flare_db::entities::community_tip;
use flare_db::entities::missing_report::{
    self, CaseNote, CaseNotes, LastSeenLocation, PartnerFlags, ReportPriority, ReportStatus,
    ResolutionType, SubjectSnapshot, Timeline, TimelineEvent, TimelineSeverity,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use validator::Validate;

use crate::services::clock::ClockRef;
use crate::services::notification::{
    AlertNotice, NoOpDispatch, NoticeKind, NotificationDispatchRef, NotifyChannel,
};
use crate::services::projection::{self, CommunityAlert, GeoPoint, ProjectionPolicy};
use crate::services::reach::ReachEstimator;
use crate::services::registry::ChildRegistryRef;
use crate::services::scheduler::{LifecycleSchedulerRef, NoOpScheduler};
use crate::services::store::{ReportFilter, ReportStoreRef, TipWrite};

/// Actor recorded for scheduled expansion ticks and escalation.
pub const SCHEDULER_ACTOR: &str = "Scheduler";

/// Actor recorded when a pending report is verified by its deadline.
pub const AUTO_VERIFY_ACTOR: &str = "Auto-verify";

/// Actor recorded for expansions requested without an operator.
pub const SYSTEM_ACTOR: &str = "System";

/// Attempts before a version conflict is surfaced to the caller.
const MAX_COMMIT_ATTEMPTS: u32 = 3;

const MAX_NOTE_LENGTH: usize = 4000;

/// Input for filing a new report.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReportInput {
    #[validate(length(min = 1, max = 64))]
    pub child_id: String,
    #[validate(length(min = 1, max = 64))]
    pub guardian_id: String,
    #[validate(nested)]
    pub last_seen_location: LocationInput,
    /// Defaults to the submission time.
    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub outfit: String,
    #[validate(length(max = 4000))]
    #[serde(default)]
    pub context: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub who_nearby: Option<String>,
    #[serde(default)]
    pub with_known_person: bool,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub known_person_details: Option<String>,
    #[serde(default)]
    pub anonymous_report: bool,
    /// Defaults to medium.
    #[serde(default)]
    pub priority: Option<ReportPriority>,
}

/// Last-seen location as entered by the guardian. Coordinates are
/// optional but come as a pair.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LocationInput {
    #[validate(length(max = 512))]
    pub address: String,
    #[validate(range(min = -90.0, max = 90.0))]
    #[serde(default)]
    pub lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    #[serde(default)]
    pub lng: Option<f64>,
}

/// Full admin view of a report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetail {
    pub report: missing_report::Model,
    pub tips: Vec<community_tip::Model>,
    /// What the public currently sees, if anything.
    pub community_alert: Option<CommunityAlert>,
    /// Active long enough to warrant escalation and not yet critical.
    pub escalation_due: bool,
}

/// Filter for the public alert feed.
#[derive(Debug, Clone, Default)]
pub struct AlertQuery {
    pub viewer: Option<GeoPoint>,
    /// Keep only alerts whose broadcast radius covers the viewer.
    pub within_broadcast: bool,
    pub limit: Option<usize>,
}

/// Result of re-arming timers after a restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeSummary {
    pub active: usize,
    pub pending: usize,
}

/// Per-report async mutexes. An entry lives only while some task holds or
/// waits for it.
#[derive(Clone, Default)]
struct ReportLocks {
    inner: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ReportLocks {
    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn acquire(&self, report_id: &str) -> ReportGuard {
        let lock = {
            let mut table = self.table();
            Arc::clone(table.entry(report_id.to_string()).or_default())
        };
        let guard = Arc::clone(&lock).lock_owned().await;
        ReportGuard {
            guard: Some(guard),
            lock,
            report_id: report_id.to_string(),
            locks: self.clone(),
        }
    }

    /// Drop the entry for `report_id` unless another task still uses it.
    fn release(&self, report_id: &str, lock: &Arc<Mutex<()>>) {
        let mut table = self.table();
        // One reference in the table, one in the releasing guard.
        if table
            .get(report_id)
            .is_some_and(|entry| Arc::ptr_eq(entry, lock) && Arc::strong_count(lock) == 2)
        {
            table.remove(report_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table().len()
    }
}

/// Guard proving the caller holds a report's mutation lock.
pub(crate) struct ReportGuard {
    guard: Option<OwnedMutexGuard<()>>,
    lock: Arc<Mutex<()>>,
    report_id: String,
    locks: ReportLocks,
}

impl Drop for ReportGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(&self.report_id, &self.lock);
    }
}

struct PendingNotice {
    channel: NotifyChannel,
    kind: NoticeKind,
    message: String,
}

/// Working copy of a report inside one serialized mutation.
pub(crate) struct ReportDraft {
    pub(crate) report: missing_report::Model,
    pub(crate) now: DateTime<Utc>,
    notices: Vec<PendingNotice>,
    changed: bool,
}

impl ReportDraft {
    const fn new(report: missing_report::Model, now: DateTime<Utc>) -> Self {
        Self {
            report,
            now,
            notices: Vec::new(),
            changed: false,
        }
    }

    /// Append a timeline event with the next sequence number.
    pub(crate) fn record(
        &mut self,
        title: &str,
        detail: String,
        severity: TimelineSeverity,
        actor: &str,
    ) {
        self.report.timeline_seq += 1;
        let seq = self.report.timeline_seq;
        self.report.timeline.0.push(TimelineEvent {
            id: timeline_event_id(&self.report.id, seq),
            seq,
            timestamp: self.now,
            title: title.to_string(),
            detail,
            severity,
            actor: actor.to_string(),
        });
        self.changed = true;
    }

    /// Move to `to` along the state graph, with its one timeline event.
    fn transition(
        &mut self,
        to: ReportStatus,
        title: &str,
        detail: String,
        severity: TimelineSeverity,
        actor: &str,
    ) -> AppResult<()> {
        let from = self.report.status;
        if !from.can_transition_to(to) {
            return Err(invalid_transition(&self.report.id, from, to));
        }

        self.report.status = to;
        if to.is_terminal() && self.report.closed_at.is_none() {
            self.report.closed_at = Some(self.now);
        }
        self.record(title, detail, severity, actor);
        Ok(())
    }

    pub(crate) const fn mark_changed(&mut self) {
        self.changed = true;
    }

    pub(crate) fn notify(&mut self, channel: NotifyChannel, kind: NoticeKind, message: String) {
        self.notices.push(PendingNotice {
            channel,
            kind,
            message,
        });
    }

    /// Notify every partner currently flagged on the report.
    fn notify_partners(&mut self, kind: NoticeKind, message: &str) {
        for channel in self.report.partner_notified.notified_channels() {
            self.notify(NotifyChannel::Partner(channel), kind, message.to_string());
        }
    }

    pub(crate) fn ensure_not_terminal(&self) -> AppResult<()> {
        if self.report.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "Report {} is {}",
                self.report.id, self.report.status
            )));
        }
        Ok(())
    }

    fn ensure_status(&self, expected: ReportStatus, to: ReportStatus) -> AppResult<()> {
        if self.report.status == expected {
            Ok(())
        } else {
            Err(invalid_transition(&self.report.id, self.report.status, to))
        }
    }
}

fn invalid_transition(report_id: &str, from: ReportStatus, to: ReportStatus) -> AppError {
    AppError::InvalidTransition(format!("Report {report_id} cannot move from {from} to {to}"))
}

fn non_empty(value: &str, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// The lifecycle engine.
#[derive(Clone)]
pub struct ReportService {
    store: ReportStoreRef,
    registry: ChildRegistryRef,
    scheduler: LifecycleSchedulerRef,
    dispatch: NotificationDispatchRef,
    clock: ClockRef,
    policy: Arc<AlertPolicyConfig>,
    projection: ProjectionPolicy,
    estimator: ReachEstimator,
    locks: ReportLocks,
    id_gen: IdGenerator,
}

impl ReportService {
    /// Create an engine with no timers and no notification delivery.
    #[must_use]
    pub fn new(
        store: ReportStoreRef,
        registry: ChildRegistryRef,
        clock: ClockRef,
        policy: AlertPolicyConfig,
    ) -> Self {
        Self {
            store,
            registry,
            scheduler: Arc::new(NoOpScheduler),
            dispatch: Arc::new(NoOpDispatch),
            clock,
            projection: ProjectionPolicy::from(&policy),
            estimator: ReachEstimator::new(policy.population_density_per_km2),
            policy: Arc::new(policy),
            locks: ReportLocks::default(),
            id_gen: IdGenerator::new(),
        }
    }

    #[must_use]
    pub fn with_scheduler(mut self, scheduler: LifecycleSchedulerRef) -> Self {
        self.scheduler = scheduler;
        self
    }

    #[must_use]
    pub fn with_dispatch(mut self, dispatch: NotificationDispatchRef) -> Self {
        self.dispatch = dispatch;
        self
    }

    #[must_use]
    pub fn policy(&self) -> &AlertPolicyConfig {
        &self.policy
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn store(&self) -> &ReportStoreRef {
        &self.store
    }

    pub(crate) fn id_gen(&self) -> &IdGenerator {
        &self.id_gen
    }

    // ==================== Mutations ====================

    /// File a new report. It starts `pending`.
    pub async fn submit_report(
        &self,
        input: SubmitReportInput,
        actor: &str,
    ) -> AppResult<missing_report::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let address = non_empty(&input.last_seen_location.address, "lastSeenLocation.address")?;
        if input.last_seen_location.lat.is_some() != input.last_seen_location.lng.is_some() {
            return Err(AppError::Validation(
                "lastSeenLocation.lat and lastSeenLocation.lng must be given together".to_string(),
            ));
        }

        if !self.registry.guardian_exists(&input.guardian_id).await? {
            return Err(AppError::NotFound(format!(
                "Guardian {} not found",
                input.guardian_id
            )));
        }
        let child = self
            .registry
            .child_summary(&input.child_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Child {} not found", input.child_id)))?;
        if child.guardian_id != input.guardian_id {
            return Err(AppError::Validation(format!(
                "Child {} is not registered to guardian {}",
                input.child_id, input.guardian_id
            )));
        }

        let now = self.clock.now();
        let priority = input.priority.unwrap_or_default();
        let radius = self.initial_radius(priority);
        let partners = PartnerFlags::default();

        let report = missing_report::Model {
            id: self.id_gen.generate(),
            child_id: input.child_id,
            guardian_id: input.guardian_id,
            status: ReportStatus::Pending,
            priority,
            started_at: now,
            closed_at: None,
            last_seen_location: LastSeenLocation {
                address,
                lat: input.last_seen_location.lat,
                lng: input.last_seen_location.lng,
            },
            last_seen_at: input.last_seen_at.unwrap_or(now),
            outfit: input.outfit.trim().to_string(),
            context: input.context.trim().to_string(),
            who_nearby: input.who_nearby,
            with_known_person: input.with_known_person,
            known_person_details: input.known_person_details,
            anonymous_report: input.anonymous_report,
            subject: SubjectSnapshot {
                first_name: child.first_name,
                age: child.age,
                blurred_photo_url: child.blurred_photo_url,
            },
            current_radius_km: radius,
            expansion_rate_km_per_hour: self.policy.expansion_rate_km_per_hour,
            activated_at: None,
            last_expansion_at: None,
            notified_count: self.estimator.estimate(radius, &partners),
            tips_received: 0,
            partner_notified: partners,
            timeline: Timeline::default(),
            case_notes: CaseNotes::default(),
            assigned_admin_id: None,
            resolution_type: None,
            timeline_seq: 0,
            version: 0,
            updated_at: now,
        };

        let mut draft = ReportDraft::new(report, now);
        draft.record(
            "Report Submitted",
            format!("Report filed; initial broadcast radius {radius:.0} km."),
            TimelineSeverity::Warning,
            actor,
        );
        draft.notify(
            NotifyChannel::PublicFeed,
            NoticeKind::ReportSubmitted,
            format!("New missing child report near {radius:.0} km radius"),
        );
        let ReportDraft {
            report, notices, ..
        } = draft;

        let report = self.store.insert_report(report).await?;
        Metrics::incr(&get_metrics().reports_submitted);
        info!(
            report_id = %report.id,
            priority = ?report.priority,
            radius_km = report.current_radius_km,
            "Report submitted"
        );

        if let Some(delay) = self.policy.auto_verify_delay() {
            self.scheduler.schedule_auto_verify(&report.id, delay).await;
        }
        self.publish(&report, notices, now);

        Ok(report)
    }

    /// Promote a pending report to active and start broadcasting.
    pub async fn verify_report(
        &self,
        report_id: &str,
        actor: &str,
    ) -> AppResult<missing_report::Model> {
        let channels = self.policy.default_partner_channels.clone();
        let estimator = self.estimator;

        self.apply(report_id, move |d| {
            let radius = d.report.current_radius_km;
            d.transition(
                ReportStatus::Active,
                "Alert Verified",
                format!("Verified by {actor}; broadcasting within {radius:.0} km."),
                TimelineSeverity::Success,
                actor,
            )?;
            d.report.activated_at = Some(d.now);
            d.report.last_expansion_at = Some(d.now);
            for channel in &channels {
                d.report.partner_notified.set(*channel, true);
            }
            refresh_reach(d, estimator);

            let message = format!("Missing child alert active within {radius:.0} km");
            d.notify_partners(NoticeKind::PartnerAlert, &message);
            d.notify(NotifyChannel::PublicFeed, NoticeKind::AlertActivated, message);
            Ok(None)
        })
        .await
    }

    /// Reject a pending report as false.
    pub async fn reject_report(
        &self,
        report_id: &str,
        actor: &str,
        reason: &str,
    ) -> AppResult<missing_report::Model> {
        let reason = non_empty(reason, "reason")?;

        self.apply(report_id, move |d| {
            d.ensure_status(ReportStatus::Pending, ReportStatus::Closed)?;
            d.transition(
                ReportStatus::Closed,
                "Report Rejected",
                format!("Rejected by {actor}: {reason}"),
                TimelineSeverity::Info,
                actor,
            )?;
            d.report.resolution_type = Some(ResolutionType::FalseReport);
            d.notify(
                NotifyChannel::PublicFeed,
                NoticeKind::AlertClosed,
                "Report closed".to_string(),
            );
            Ok(None)
        })
        .await
    }

    /// Grow the radius continuously up to `now`. Returns the new radius.
    ///
    /// Calling again with the same `now` changes nothing.
    pub async fn expand_radius(&self, report_id: &str, now: DateTime<Utc>) -> AppResult<f64> {
        let policy = Arc::clone(&self.policy);
        let estimator = self.estimator;

        let report = self
            .apply_at(report_id, now, move |d| {
                grow_radius(d, &policy, estimator, SYSTEM_ACTOR)?;
                Ok(None)
            })
            .await?;

        Ok(report.current_radius_km)
    }

    /// Manually widen the radius by a fixed step. Always records one event.
    pub async fn expand_radius_by(
        &self,
        report_id: &str,
        step_km: f64,
        actor: &str,
    ) -> AppResult<f64> {
        if !step_km.is_finite() || step_km <= 0.0 {
            return Err(AppError::Validation(
                "stepKm must be a positive number".to_string(),
            ));
        }
        let max_radius = self.policy.max_radius_km;
        let estimator = self.estimator;

        let report = self
            .apply(report_id, move |d| {
                d.ensure_status(ReportStatus::Active, ReportStatus::Active)?;
                let old = d.report.current_radius_km;
                let new = (old + step_km).min(max_radius).max(old);

                if new > old {
                    d.report.current_radius_km = new;
                    refresh_reach(d, estimator);
                    d.record(
                        "Radius Expanded",
                        format!("{actor} expanded the search radius to {new:.1} km."),
                        TimelineSeverity::Info,
                        actor,
                    );
                    d.notify(
                        NotifyChannel::PublicFeed,
                        NoticeKind::RadiusExpanded,
                        format!("Search radius expanded to {new:.1} km"),
                    );
                } else {
                    d.record(
                        "Radius Expansion Requested",
                        format!("Radius already at the {max_radius:.0} km maximum."),
                        TimelineSeverity::Info,
                        actor,
                    );
                }
                Ok(None)
            })
            .await?;

        Ok(report.current_radius_km)
    }

    /// Resolve a pending or active report.
    pub async fn resolve_report(
        &self,
        report_id: &str,
        resolution: ResolutionType,
        actor: &str,
        note: Option<&str>,
    ) -> AppResult<missing_report::Model> {
        let note = note.map(str::trim).filter(|n| !n.is_empty()).map(String::from);
        if note.as_ref().is_some_and(|n| n.len() > MAX_NOTE_LENGTH) {
            return Err(AppError::Validation("note is too long".to_string()));
        }

        self.apply(report_id, move |d| {
            let (title, detail, severity) = match resolution {
                ResolutionType::FoundSafe => (
                    "Child Recovered",
                    format!("Child found safe; confirmed by {actor}."),
                    TimelineSeverity::Success,
                ),
                ResolutionType::FoundMedical => (
                    "Child Recovered",
                    format!("Child found and receiving medical care; confirmed by {actor}."),
                    TimelineSeverity::Success,
                ),
                ResolutionType::FalseReport => (
                    "Closed: False Report",
                    format!("Closed as a false report by {actor}."),
                    TimelineSeverity::Info,
                ),
                ResolutionType::GuardianRetracted => (
                    "Report Retracted",
                    format!("Retracted on behalf of the guardian by {actor}."),
                    TimelineSeverity::Info,
                ),
            };

            d.transition(resolution.target_status(), title, detail, severity, actor)?;
            d.report.resolution_type = Some(resolution);
            if let Some(note) = &note {
                d.report.case_notes.0.push(CaseNote {
                    body: format!("Resolution: {note}"),
                    author: actor.to_string(),
                    created_at: d.now,
                });
            }

            d.notify_partners(NoticeKind::AlertClosed, "Alert resolved, stand down");
            d.notify(
                NotifyChannel::PublicFeed,
                NoticeKind::AlertClosed,
                title.to_string(),
            );
            Ok(None)
        })
        .await
    }

    /// Guardian-initiated cancellation: pending becomes retracted, active
    /// becomes closed.
    pub async fn cancel_report(
        &self,
        report_id: &str,
        actor: &str,
    ) -> AppResult<missing_report::Model> {
        self.apply(report_id, move |d| {
            let (to, title) = match d.report.status {
                ReportStatus::Pending => (ReportStatus::Retracted, "Report Retracted"),
                ReportStatus::Active => (ReportStatus::Closed, "Alert Cancelled"),
                status => return Err(invalid_transition(&d.report.id, status, ReportStatus::Closed)),
            };

            d.transition(
                to,
                title,
                format!("Cancelled by guardian ({actor})."),
                TimelineSeverity::Info,
                actor,
            )?;
            d.report.resolution_type = Some(ResolutionType::GuardianRetracted);

            d.notify_partners(NoticeKind::AlertClosed, "Alert cancelled by guardian");
            d.notify(
                NotifyChannel::PublicFeed,
                NoticeKind::AlertClosed,
                title.to_string(),
            );
            Ok(None)
        })
        .await
    }

    /// Append an internal note. Notes never appear on the timeline.
    pub async fn add_case_note(
        &self,
        report_id: &str,
        note: &str,
        author: &str,
    ) -> AppResult<missing_report::Model> {
        let body = non_empty(note, "note")?;
        if body.len() > MAX_NOTE_LENGTH {
            return Err(AppError::Validation("note is too long".to_string()));
        }
        let author = non_empty(author, "author")?;

        self.apply(report_id, move |d| {
            d.report.case_notes.0.push(CaseNote {
                body: body.clone(),
                author: author.clone(),
                created_at: d.now,
            });
            d.mark_changed();
            Ok(None)
        })
        .await
    }

    /// Set one partner flag. Only an actual flip is recorded.
    pub async fn update_partner_channel(
        &self,
        report_id: &str,
        channel: PartnerChannel,
        notified: bool,
        actor: &str,
    ) -> AppResult<missing_report::Model> {
        let estimator = self.estimator;

        self.apply(report_id, move |d| {
            d.ensure_not_terminal()?;
            if d.report.partner_notified.get(channel) == notified {
                return Ok(None);
            }

            d.report.partner_notified.set(channel, notified);
            refresh_reach(d, estimator);
            if notified {
                d.record(
                    "Partner Notified",
                    format!("{channel} notified by {actor}."),
                    TimelineSeverity::Success,
                    actor,
                );
                d.notify(
                    NotifyChannel::Partner(channel),
                    NoticeKind::PartnerAlert,
                    "Missing child alert".to_string(),
                );
            } else {
                d.record(
                    "Partner Stood Down",
                    format!("{channel} stood down by {actor}."),
                    TimelineSeverity::Info,
                    actor,
                );
            }
            Ok(None)
        })
        .await
    }

    /// Raise the priority. Priorities never go down.
    pub async fn escalate_priority(
        &self,
        report_id: &str,
        priority: ReportPriority,
        actor: &str,
    ) -> AppResult<missing_report::Model> {
        self.apply(report_id, move |d| {
            d.ensure_not_terminal()?;
            let current = d.report.priority;
            if priority < current {
                return Err(AppError::Validation(format!(
                    "Priority can only rise (currently {current:?})"
                )));
            }
            if priority == current {
                return Ok(None);
            }

            raise_priority(d, priority, actor);
            Ok(None)
        })
        .await
    }

    /// Assign the case to an administrator.
    pub async fn assign_admin(
        &self,
        report_id: &str,
        admin_id: &str,
        actor: &str,
    ) -> AppResult<missing_report::Model> {
        let admin_id = non_empty(admin_id, "adminId")?;

        self.apply(report_id, move |d| {
            d.ensure_not_terminal()?;
            if d.report.assigned_admin_id.as_deref() == Some(admin_id.as_str()) {
                return Ok(None);
            }

            d.report.assigned_admin_id = Some(admin_id.clone());
            d.record(
                "Case Assigned",
                format!("Assigned to {admin_id} by {actor}."),
                TimelineSeverity::Info,
                actor,
            );
            Ok(None)
        })
        .await
    }

    /// Send an internal broadcast to every notified partner.
    pub async fn broadcast_update(
        &self,
        report_id: &str,
        message: &str,
        actor: &str,
    ) -> AppResult<missing_report::Model> {
        let message = non_empty(message, "message")?;
        if message.len() > MAX_NOTE_LENGTH {
            return Err(AppError::Validation("message is too long".to_string()));
        }

        self.apply(report_id, move |d| {
            if d.report.status != ReportStatus::Active {
                return Err(AppError::InvalidState(format!(
                    "Report {} is {}; broadcasts need an active alert",
                    d.report.id, d.report.status
                )));
            }

            d.record(
                "Internal broadcast",
                message.clone(),
                TimelineSeverity::Info,
                actor,
            );
            d.notify_partners(NoticeKind::Broadcast, &message);
            Ok(None)
        })
        .await
    }

    // ==================== Scheduled work ====================

    /// Handle one expansion tick. Late ticks for reports that left `active`
    /// are counted and ignored.
    pub async fn handle_expansion_tick(&self, report_id: &str) -> AppResult<Option<f64>> {
        let policy = Arc::clone(&self.policy);
        let estimator = self.estimator;

        let result = self
            .apply(report_id, move |d| {
                grow_radius(d, &policy, estimator, SCHEDULER_ACTOR)?;
                if escalation_due(&d.report, d.now, &policy) {
                    raise_priority(d, ReportPriority::Critical, SCHEDULER_ACTOR);
                }
                Ok(None)
            })
            .await;

        match result {
            Ok(report) => Ok(Some(report.current_radius_km)),
            Err(AppError::InvalidTransition(reason) | AppError::NotFound(reason)) => {
                Metrics::incr(&get_metrics().stale_ticks);
                debug!(report_id, %reason, "Ignoring stale expansion tick");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Handle an auto-verify deadline. Returns whether the report was
    /// verified by it.
    pub async fn handle_auto_verify(&self, report_id: &str) -> AppResult<bool> {
        match self.verify_report(report_id, AUTO_VERIFY_ACTOR).await {
            Ok(_) => Ok(true),
            Err(AppError::InvalidTransition(reason) | AppError::NotFound(reason)) => {
                debug!(report_id, %reason, "Auto-verify deadline no longer applies");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Rebuild timers from persisted reports after a restart. Active reports
    /// are caught up to now before their ticks are re-armed.
    pub async fn resume_schedules(&self) -> AppResult<ResumeSummary> {
        let mut summary = ResumeSummary::default();

        let active = self
            .store
            .list_reports(&ReportFilter::with_statuses(&[ReportStatus::Active]))
            .await?;
        for report in active {
            if self.handle_expansion_tick(&report.id).await?.is_some() {
                self.scheduler
                    .schedule_expansion(&report.id, self.policy.expansion_tick())
                    .await;
                summary.active += 1;
            }
        }

        if let Some(delay) = self.policy.auto_verify_delay() {
            let now = self.clock.now();
            let pending = self
                .store
                .list_reports(&ReportFilter::with_statuses(&[ReportStatus::Pending]))
                .await?;
            for report in pending {
                let remaining = chrono::Duration::from_std(delay)
                    .ok()
                    .and_then(|delay| report.started_at.checked_add_signed(delay))
                    .map_or(delay, |due| (due - now).to_std().unwrap_or_default());
                self.scheduler
                    .schedule_auto_verify(&report.id, remaining)
                    .await;
                summary.pending += 1;
            }
        }

        info!(
            active = summary.active,
            pending = summary.pending,
            "Lifecycle timers resumed"
        );
        Ok(summary)
    }

    // ==================== Queries ====================

    /// Get a report by ID.
    pub async fn get_report(&self, report_id: &str) -> AppResult<missing_report::Model> {
        self.store
            .find_report(report_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Report {report_id} not found")))
    }

    /// Report with its tips and current public view.
    pub async fn get_report_detail(&self, report_id: &str) -> AppResult<ReportDetail> {
        let report = self.get_report(report_id).await?;
        let tips = self.store.list_tips(report_id).await?;
        let now = self.clock.now();

        Ok(ReportDetail {
            community_alert: projection::project(&report, None, now, &self.projection),
            escalation_due: escalation_due(&report, now, &self.policy),
            report,
            tips,
        })
    }

    /// Admin queue listing.
    pub async fn list_reports(&self, filter: &ReportFilter) -> AppResult<Vec<missing_report::Model>> {
        self.store.list_reports(filter).await
    }

    /// Public alert feed. Nearest first when a viewer location is given,
    /// most recently seen first otherwise.
    pub async fn list_community_alerts(&self, query: &AlertQuery) -> AppResult<Vec<CommunityAlert>> {
        let now = self.clock.now();
        let reports = self
            .store
            .list_reports(&ReportFilter::with_statuses(&[
                ReportStatus::Pending,
                ReportStatus::Active,
                ReportStatus::Found,
                ReportStatus::Closed,
            ]))
            .await?;

        let mut alerts: Vec<CommunityAlert> = reports
            .iter()
            .filter_map(|r| projection::project(r, query.viewer, now, &self.projection))
            .filter(|a| {
                !query.within_broadcast
                    || query.viewer.is_none()
                    || a.distance_km.is_some_and(|distance| distance <= a.radius_km)
            })
            .collect();

        if query.viewer.is_some() {
            // Alerts without coordinates go last.
            alerts.sort_by(|a, b| {
                let a = a.distance_km.unwrap_or(f64::INFINITY);
                let b = b.distance_km.unwrap_or(f64::INFINITY);
                a.total_cmp(&b)
            });
        } else {
            alerts.sort_by(|a, b| b.last_seen_at.cmp(&a.last_seen_at));
        }
        if let Some(limit) = query.limit {
            alerts.truncate(limit);
        }

        Ok(alerts)
    }

    // ==================== Internals ====================

    fn initial_radius(&self, priority: ReportPriority) -> f64 {
        let steps = f64::from(priority.steps_above_medium());
        (self.policy.default_radius_km + self.policy.priority_radius_step_km * steps)
            .min(self.policy.max_radius_km)
    }

    pub(crate) async fn lock_report(&self, report_id: &str) -> ReportGuard {
        self.locks.acquire(report_id).await
    }

    #[cfg(test)]
    pub(crate) fn lock_entries(&self) -> usize {
        self.locks.len()
    }

    async fn apply<F>(&self, report_id: &str, mutate: F) -> AppResult<missing_report::Model>
    where
        F: Fn(&mut ReportDraft) -> AppResult<Option<TipWrite>> + Send + Sync,
    {
        let guard = self.lock_report(report_id).await;
        let now = self.clock.now();
        self.apply_locked(&guard, report_id, now, mutate).await
    }

    async fn apply_at<F>(
        &self,
        report_id: &str,
        now: DateTime<Utc>,
        mutate: F,
    ) -> AppResult<missing_report::Model>
    where
        F: Fn(&mut ReportDraft) -> AppResult<Option<TipWrite>> + Send + Sync,
    {
        let guard = self.lock_report(report_id).await;
        self.apply_locked(&guard, report_id, now, mutate).await
    }

    /// Read, mutate and commit one report while its lock is held.
    ///
    /// A failed version check re-reads the report and re-runs `mutate`.
    /// Nothing is written when `mutate` fails or leaves the draft unchanged.
    pub(crate) async fn apply_locked<F>(
        &self,
        _guard: &ReportGuard,
        report_id: &str,
        now: DateTime<Utc>,
        mutate: F,
    ) -> AppResult<missing_report::Model>
    where
        F: Fn(&mut ReportDraft) -> AppResult<Option<TipWrite>> + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let current = self.get_report(report_id).await?;

            let mut draft = ReportDraft::new(current.clone(), now);
            let tip = mutate(&mut draft)?;
            if !draft.changed {
                return Ok(current);
            }
            draft.report.updated_at = now;

            let ReportDraft {
                report, notices, ..
            } = draft;
            match self.store.save_report(report, current.version, tip).await {
                Ok(saved) => {
                    self.after_commit(&current, &saved, notices, now).await;
                    return Ok(saved);
                }
                Err(AppError::ConcurrencyConflict(reason)) => {
                    Metrics::incr(&get_metrics().concurrency_conflicts);
                    if attempt >= MAX_COMMIT_ATTEMPTS {
                        warn!(report_id, attempt, "Giving up after repeated version conflicts");
                        return Err(AppError::ConcurrencyConflict(reason));
                    }
                    debug!(report_id, attempt, "Version conflict, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn after_commit(
        &self,
        previous: &missing_report::Model,
        saved: &missing_report::Model,
        notices: Vec<PendingNotice>,
        now: DateTime<Utc>,
    ) {
        if previous.status != saved.status {
            info!(
                report_id = %saved.id,
                from = %previous.status,
                to = %saved.status,
                radius_km = saved.current_radius_km,
                "Report status changed"
            );

            if saved.status == ReportStatus::Active {
                Metrics::incr(&get_metrics().reports_verified);
                self.scheduler.cancel(&saved.id).await;
                self.scheduler
                    .schedule_expansion(&saved.id, self.policy.expansion_tick())
                    .await;
            } else if saved.status.is_terminal() {
                Metrics::incr(&get_metrics().reports_resolved);
                self.scheduler.cancel(&saved.id).await;
            }
        }

        if saved.current_radius_km > previous.current_radius_km {
            Metrics::incr(&get_metrics().radius_expansions);
            debug!(
                report_id = %saved.id,
                radius_km = saved.current_radius_km,
                "Radius expanded"
            );
        }

        self.publish(saved, notices, now);
    }

    fn publish(&self, report: &missing_report::Model, notices: Vec<PendingNotice>, now: DateTime<Utc>) {
        if notices.is_empty() {
            return;
        }
        let alert = projection::project(report, None, now, &self.projection);

        for notice in notices {
            self.dispatch.dispatch(
                notice.channel,
                AlertNotice {
                    kind: notice.kind,
                    report_id: report.id.clone(),
                    status: report.status,
                    priority: report.priority,
                    radius_km: report.current_radius_km,
                    notified_count: report.notified_count,
                    message: notice.message,
                    alert: alert.clone(),
                    occurred_at: now,
                },
            );
        }
    }
}

/// Recompute the reach estimate. The count never goes down.
fn refresh_reach(d: &mut ReportDraft, estimator: ReachEstimator) {
    let estimate = estimator.estimate(d.report.current_radius_km, &d.report.partner_notified);
    d.report.notified_count = d.report.notified_count.max(estimate);
}

/// Continuous growth since `last_expansion_at`, capped at the maximum.
///
/// One timeline event is recorded when the radius crosses into a new step of
/// `expansion_rate_km_per_hour` kilometres.
#[allow(clippy::cast_precision_loss)]
fn grow_radius(
    d: &mut ReportDraft,
    policy: &AlertPolicyConfig,
    estimator: ReachEstimator,
    actor: &str,
) -> AppResult<()> {
    d.ensure_status(ReportStatus::Active, ReportStatus::Active)?;

    let since = d
        .report
        .last_expansion_at
        .or(d.report.activated_at)
        .unwrap_or(d.report.started_at);
    if d.now <= since {
        return Ok(());
    }

    let hours = (d.now - since).num_milliseconds() as f64 / 3_600_000.0;
    let old = d.report.current_radius_km;
    let new = (old + d.report.expansion_rate_km_per_hour * hours)
        .min(policy.max_radius_km)
        .max(old);
    if new <= old {
        return Ok(());
    }

    d.report.current_radius_km = new;
    d.report.last_expansion_at = Some(d.now);
    refresh_reach(d, estimator);
    d.mark_changed();

    let step = policy.expansion_rate_km_per_hour;
    if step > 0.0 && (new / step).floor() > (old / step).floor() {
        d.record(
            "Radius Expanded",
            format!("Broadcast radius expanded to {new:.1} km."),
            TimelineSeverity::Info,
            actor,
        );
        d.notify(
            NotifyChannel::PublicFeed,
            NoticeKind::RadiusExpanded,
            format!("Search radius expanded to {new:.1} km"),
        );
    }
    Ok(())
}

pub(crate) fn raise_priority(d: &mut ReportDraft, priority: ReportPriority, actor: &str) {
    let previous = d.report.priority;
    d.report.priority = priority;

    let severity = if priority == ReportPriority::Critical {
        TimelineSeverity::Danger
    } else {
        TimelineSeverity::Warning
    };
    d.record(
        "Priority Escalated",
        format!("Priority raised from {previous:?} to {priority:?} by {actor}."),
        severity,
        actor,
    );
    if d.report.status == ReportStatus::Active {
        d.notify_partners(NoticeKind::Escalated, &format!("Priority raised to {priority:?}"));
    }
}

fn escalation_due(report: &missing_report::Model, now: DateTime<Utc>, policy: &AlertPolicyConfig) -> bool {
    report.status == ReportStatus::Active
        && report.priority < ReportPriority::Critical
        && report
            .activated_at
            .is_some_and(|activated| now - activated >= policy.escalation_after())
}
