//! Database entities.

pub mod community_tip;
pub mod missing_report;

pub use community_tip::Entity as CommunityTip;
pub use missing_report::Entity as MissingReport;
