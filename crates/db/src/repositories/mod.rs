//! Repositories wrapping database access.

mod report;
mod tip;

pub use report::{ReportFilter, ReportRepository, TipWrite};
pub use tip::TipRepository;
