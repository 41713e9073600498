pub mod blocker;
pub mod graph;
pub mod navigation;
pub mod path;

pub use blocker::is_blocker_activity;
pub use graph::{GraphError, GraphStats, NavigationGraph, RecordedTransition};
pub use navigation::ElementNavigation;
pub use path::PathStep;
