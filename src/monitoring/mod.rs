pub mod report;
pub mod stats;

pub use report::{parse_violation_reports, CspViolationReport};
pub use stats::{CspStats, PerformanceTimer};
