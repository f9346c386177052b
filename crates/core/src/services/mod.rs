//! Business logic services.

#![allow(missing_docs)]

pub mod clock;
pub mod notification;
pub mod projection;
pub mod reach;
pub mod registry;
pub mod report;
pub mod scheduler;
pub mod store;
pub mod tip;

#[cfg(test)]
pub(crate) mod test_support;

pub use clock::{Clock, ClockRef, ManualClock, SystemClock};
pub use notification::{
    AlertNotice, DeliveryResult, LoggingGateway, NoOpDispatch, NoticeKind, NotificationDispatch,
    NotificationDispatchRef, NotificationGateway, NotificationGatewayRef, NotifyChannel,
};
pub use projection::{CommunityAlert, GeoPoint, ProjectionPolicy};
pub use reach::ReachEstimator;
pub use registry::{ChildRegistry, ChildRegistryRef, ChildSummary, InMemoryChildRegistry};
pub use report::{
    AlertQuery, LocationInput, ReportDetail, ReportService, ResumeSummary, SubmitReportInput,
    AUTO_VERIFY_ACTOR, SCHEDULER_ACTOR, SYSTEM_ACTOR,
};
pub use scheduler::{LifecycleScheduler, LifecycleSchedulerRef, NoOpScheduler};
pub use store::{
    DbReportStore, InMemoryReportStore, ReportFilter, ReportStore, ReportStoreRef, TipWrite,
};
pub use tip::{SubmitTipInput, TipService};
