pub mod analytics;
pub mod report;
pub mod session;
pub mod snapshot;

pub use analytics::{AnalyticsSummary, CoveragePoint, PassSummary, RunAnalytics};
pub use report::ExplorationReport;
pub use session::{ExplorationSession, SessionError};
pub use snapshot::RunSnapshot;
