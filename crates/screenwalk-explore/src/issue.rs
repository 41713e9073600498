//! Anomalies observed during exploration and operator corrections.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use screenwalk_ident::{Bounds, ScreenId, UiElement};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    /// Tapping the element kept failing; it was abandoned.
    StuckElement,
    BackNavigationFailed,
    /// The foreground app changed unexpectedly.
    AppLeft,
    TransitionTimeout,
    ScrollFailed,
    /// The element closed or minimized the app.
    DangerousElement,
    RecoveryFailed,
    BlockerEncountered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

/// What an operator can tell the explorer to do about an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CorrectionAction {
    /// Tap these screen coordinates instead.
    DemonstrateTap { x: i32, y: i32 },
    DemonstrateScroll { direction: ScrollDirection },
    MarkIgnore,
    MarkDangerous,
    Skip,
}

/// Snapshot of the element an issue is about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueContext {
    pub element_id: Option<String>,
    pub resource_id: Option<String>,
    pub text: Option<String>,
    pub class_name: Option<String>,
    pub bounds: Option<Bounds>,
}

impl IssueContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn for_element(element: &UiElement) -> Self {
        Self {
            element_id: Some(element.element_id.clone()),
            resource_id: element.resource_id.clone(),
            text: element.text.clone(),
            class_name: Some(element.class_name.clone()),
            bounds: Some(element.bounds),
        }
    }

    /// Only the id is known (the element is no longer on screen).
    pub fn for_element_id(element_id: &str) -> Self {
        Self {
            element_id: Some(element_id.to_string()),
            ..Self::default()
        }
    }
}

/// An anomaly. Immutable apart from a single operator correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationIssue {
    id: u64,
    issue_type: IssueType,
    screen_id: Option<ScreenId>,
    context: IssueContext,
    description: String,
    recorded_at: DateTime<Utc>,
    correction: Option<CorrectionAction>,
}

impl ExplorationIssue {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn issue_type(&self) -> IssueType {
        self.issue_type
    }

    pub fn screen_id(&self) -> Option<&ScreenId> {
        self.screen_id.as_ref()
    }

    pub fn context(&self) -> &IssueContext {
        &self.context
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    pub fn correction(&self) -> Option<CorrectionAction> {
        self.correction
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorrectionError {
    #[error("no issue with id {0}")]
    UnknownIssue(u64),

    #[error("issue {0} already has a correction")]
    AlreadyCorrected(u64),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueLog {
    issues: Vec<ExplorationIssue>,
    next_id: u64,
}

impl IssueLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an issue and return its id.
    pub fn record(
        &mut self,
        issue_type: IssueType,
        screen_id: Option<&ScreenId>,
        context: IssueContext,
        description: impl Into<String>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.issues.push(ExplorationIssue {
            id,
            issue_type,
            screen_id: screen_id.cloned(),
            context,
            description: description.into(),
            recorded_at: Utc::now(),
            correction: None,
        });
        id
    }

    pub fn get(&self, id: u64) -> Option<&ExplorationIssue> {
        self.issues.iter().find(|issue| issue.id == id)
    }

    /// Attach a correction. Each issue takes at most one.
    pub fn apply_correction(
        &mut self,
        id: u64,
        action: CorrectionAction,
    ) -> Result<&ExplorationIssue, CorrectionError> {
        let issue = self
            .issues
            .iter_mut()
            .find(|issue| issue.id == id)
            .ok_or(CorrectionError::UnknownIssue(id))?;
        if issue.correction.is_some() {
            return Err(CorrectionError::AlreadyCorrected(id));
        }
        issue.correction = Some(action);
        Ok(issue)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExplorationIssue> {
        self.issues.iter()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn count_by_type(&self) -> BTreeMap<IssueType, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.issue_type).or_insert(0) += 1;
        }
        counts
    }

    pub fn uncorrected(&self) -> impl Iterator<Item = &ExplorationIssue> {
        self.issues.iter().filter(|issue| issue.correction.is_none())
    }
}
