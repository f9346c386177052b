//! Fixtures shared by the service tests.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use flare_common::AlertPolicyConfig;
use flare_db::entities::community_tip::{self, TipStatus};
use flare_db::entities::missing_report::{
    self, CaseNotes, LastSeenLocation, PartnerFlags, ReportPriority, ReportStatus,
    SubjectSnapshot, Timeline,
};

use crate::services::clock::{Clock, ManualClock};
use crate::services::notification::{AlertNotice, NotificationDispatch, NotifyChannel};
use crate::services::registry::{ChildSummary, InMemoryChildRegistry};
use crate::services::report::{LocationInput, ReportService, SubmitReportInput};
use crate::services::scheduler::LifecycleScheduler;
use crate::services::store::InMemoryReportStore;
use crate::services::tip::TipService;

pub const CHILD_ID: &str = "child-1";
pub const GUARDIAN_ID: &str = "guardian-1";

/// A report as the engine would have stored it.
pub fn sample_report(id: &str, status: ReportStatus) -> missing_report::Model {
    let now = Utc::now();
    missing_report::Model {
        id: id.to_string(),
        child_id: CHILD_ID.to_string(),
        guardian_id: GUARDIAN_ID.to_string(),
        status,
        priority: ReportPriority::Medium,
        started_at: now,
        closed_at: status.is_terminal().then_some(now),
        last_seen_location: LastSeenLocation {
            address: "12 Harbour Road, Westfield".to_string(),
            lat: Some(51.5072),
            lng: Some(-0.1276),
        },
        last_seen_at: now,
        outfit: "Red raincoat, yellow boots".to_string(),
        context: "Left the playground during pickup".to_string(),
        who_nearby: None,
        with_known_person: false,
        known_person_details: None,
        anonymous_report: false,
        subject: SubjectSnapshot {
            first_name: "Mia".to_string(),
            age: Some(7),
            blurred_photo_url: Some("https://cdn.example/blurred/mia.jpg".to_string()),
        },
        current_radius_km: 10.0,
        expansion_rate_km_per_hour: 5.0,
        activated_at: (status != ReportStatus::Pending).then_some(now),
        last_expansion_at: None,
        notified_count: 1885,
        tips_received: 0,
        partner_notified: PartnerFlags::default(),
        timeline: Timeline::default(),
        case_notes: CaseNotes::default(),
        assigned_admin_id: None,
        resolution_type: None,
        timeline_seq: 0,
        version: 0,
        updated_at: now,
    }
}

pub fn sample_tip(id: &str, report_id: &str) -> community_tip::Model {
    let now = Utc::now();
    community_tip::Model {
        id: id.to_string(),
        report_id: report_id.to_string(),
        created_at: now,
        reporter_name: "Anonymous".to_string(),
        description: "Saw a girl in a red raincoat near the station".to_string(),
        location: "Westfield station".to_string(),
        sighted_at: now,
        status: TipStatus::Pending,
        dismiss_reason: None,
        reviewed_by: None,
        updated_at: None,
    }
}

pub fn submit_input() -> SubmitReportInput {
    SubmitReportInput {
        child_id: CHILD_ID.to_string(),
        guardian_id: GUARDIAN_ID.to_string(),
        last_seen_location: LocationInput {
            address: "12 Harbour Road, Westfield".to_string(),
            lat: Some(51.5072),
            lng: Some(-0.1276),
        },
        last_seen_at: None,
        outfit: "Red raincoat, yellow boots".to_string(),
        context: "Left the playground during pickup".to_string(),
        who_nearby: None,
        with_known_person: false,
        known_person_details: None,
        anonymous_report: false,
        priority: None,
    }
}

/// Scheduler that records what it was asked to do.
#[derive(Default)]
pub struct RecordingScheduler {
    expansions: Mutex<Vec<String>>,
    auto_verifies: Mutex<Vec<(String, Duration)>>,
    cancels: Mutex<Vec<String>>,
}

impl RecordingScheduler {
    pub fn expansions(&self) -> Vec<String> {
        self.expansions.lock().unwrap().clone()
    }

    pub fn auto_verifies(&self) -> Vec<(String, Duration)> {
        self.auto_verifies.lock().unwrap().clone()
    }

    pub fn cancellations(&self, report_id: &str) -> usize {
        self.cancels
            .lock()
            .unwrap()
            .iter()
            .filter(|id| id.as_str() == report_id)
            .count()
    }
}

#[async_trait]
impl LifecycleScheduler for RecordingScheduler {
    async fn schedule_expansion(&self, report_id: &str, _every: Duration) {
        self.expansions.lock().unwrap().push(report_id.to_string());
    }

    async fn schedule_auto_verify(&self, report_id: &str, after: Duration) {
        self.auto_verifies
            .lock()
            .unwrap()
            .push((report_id.to_string(), after));
    }

    async fn cancel(&self, report_id: &str) -> bool {
        self.cancels.lock().unwrap().push(report_id.to_string());
        true
    }
}

/// Dispatch that keeps every notice.
#[derive(Default)]
pub struct RecordingDispatch {
    sent: Mutex<Vec<(NotifyChannel, AlertNotice)>>,
}

impl RecordingDispatch {
    pub fn sent(&self) -> Vec<(NotifyChannel, AlertNotice)> {
        self.sent.lock().unwrap().clone()
    }
}

impl NotificationDispatch for RecordingDispatch {
    fn dispatch(&self, channel: NotifyChannel, notice: AlertNotice) {
        self.sent.lock().unwrap().push((channel, notice));
    }
}

/// Engine wired to in-memory collaborators and a manual clock.
pub struct Harness {
    pub service: ReportService,
    pub tips: TipService,
    pub clock: Arc<ManualClock>,
    pub scheduler: Arc<RecordingScheduler>,
    pub dispatch: Arc<RecordingDispatch>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_policy(AlertPolicyConfig::default()).await
    }

    pub async fn with_policy(policy: AlertPolicyConfig) -> Self {
        let registry = Arc::new(InMemoryChildRegistry::new());
        registry
            .register_child(ChildSummary {
                child_id: CHILD_ID.to_string(),
                guardian_id: GUARDIAN_ID.to_string(),
                first_name: "Mia".to_string(),
                age: Some(7),
                blurred_photo_url: None,
            })
            .await;

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        ));
        let scheduler = Arc::new(RecordingScheduler::default());
        let dispatch = Arc::new(RecordingDispatch::default());

        let service = ReportService::new(
            Arc::new(InMemoryReportStore::new()),
            registry,
            clock.clone(),
            policy,
        )
        .with_scheduler(scheduler.clone())
        .with_dispatch(dispatch.clone());

        Self {
            tips: TipService::new(service.clone()),
            service,
            clock,
            scheduler,
            dispatch,
        }
    }

    /// File the default report.
    pub async fn submit(&self) -> missing_report::Model {
        self.service
            .submit_report(submit_input(), GUARDIAN_ID)
            .await
            .unwrap()
    }

    pub fn now(&self) -> chrono::DateTime<Utc> {
        self.clock.now()
    }
}
