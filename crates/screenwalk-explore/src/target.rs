//! Pending exploration work.
//!
//! [`TargetQueue`] is an explicit max-heap: highest priority first, and among
//! equal priorities the earliest enqueued first, so no target starves.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};
use screenwalk_ident::{Bounds, ScreenId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    TapElement,
    ScrollContainer,
    /// Get to `screen_id` first; its own targets are generated on arrival.
    NavigateToScreen,
}

/// A unit of work: created by the planner, consumed once executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationTarget {
    pub kind: TargetKind,
    pub screen_id: ScreenId,
    #[serde(default)]
    pub element_id: Option<String>,
    #[serde(default)]
    pub bounds: Option<Bounds>,
    /// Higher runs sooner.
    pub priority: i32,
}

impl ExplorationTarget {
    pub fn tap(screen_id: ScreenId, element_id: &str, bounds: Bounds, priority: i32) -> Self {
        Self {
            kind: TargetKind::TapElement,
            screen_id,
            element_id: Some(element_id.to_string()),
            bounds: Some(bounds),
            priority,
        }
    }

    pub fn scroll(screen_id: ScreenId, container_id: &str, bounds: Bounds, priority: i32) -> Self {
        Self {
            kind: TargetKind::ScrollContainer,
            screen_id,
            element_id: Some(container_id.to_string()),
            bounds: Some(bounds),
            priority,
        }
    }

    pub fn navigate_to(screen_id: ScreenId, priority: i32) -> Self {
        Self {
            kind: TargetKind::NavigateToScreen,
            screen_id,
            element_id: None,
            bounds: None,
            priority,
        }
    }

    /// Same kind of work on the same screen and element.
    pub fn same_work(&self, other: &Self) -> bool {
        self.kind == other.kind && self.screen_id == other.screen_id && self.element_id == other.element_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct QueuedTarget {
    seq: u64,
    target: ExplorationTarget,
}

impl Eq for QueuedTarget {}

impl Ord for QueuedTarget {
    fn cmp(&self, other: &Self) -> Ordering {
        self.target
            .priority
            .cmp(&other.target.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedTarget {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetQueue {
    heap: BinaryHeap<QueuedTarget>,
    next_seq: u64,
}

impl TargetQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, target: ExplorationTarget) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueuedTarget { seq, target });
    }

    pub fn pop(&mut self) -> Option<ExplorationTarget> {
        self.heap.pop().map(|q| q.target)
    }

    /// Remove the best target matching `pred`, leaving the rest in order.
    pub fn pop_matching(
        &mut self,
        mut pred: impl FnMut(&ExplorationTarget) -> bool,
    ) -> Option<ExplorationTarget> {
        let best = self.heap.iter().filter(|q| pred(&q.target)).max()?.seq;
        let mut items = std::mem::take(&mut self.heap).into_vec();
        let found = items
            .iter()
            .position(|q| q.seq == best)
            .map(|index| items.swap_remove(index));
        self.heap = BinaryHeap::from(items);
        found.map(|q| q.target)
    }

    pub fn peek(&self) -> Option<&ExplorationTarget> {
        self.heap.peek().map(|q| &q.target)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn contains_work(&self, target: &ExplorationTarget) -> bool {
        self.heap.iter().any(|q| q.target.same_work(target))
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&ExplorationTarget) -> bool) {
        self.heap.retain(|q| keep(&q.target));
    }

    /// Copy of the queue in pop order.
    pub fn to_sorted_vec(&self) -> Vec<ExplorationTarget> {
        self.heap
            .clone()
            .into_sorted_vec()
            .into_iter()
            .rev()
            .map(|q| q.target)
            .collect()
    }
}

/// A screen with outstanding work, for coverage-oriented backtracking.
///
/// Orders by unvisited work (more first), then least recently visited, then
/// screen ID. `max` / a max-heap yields the best screen to revisit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierItem {
    pub screen_id: ScreenId,
    pub unvisited: usize,
    pub last_visit: DateTime<Utc>,
}

impl Ord for FrontierItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.unvisited
            .cmp(&other.unvisited)
            .then_with(|| other.last_visit.cmp(&self.last_visit))
            .then_with(|| other.screen_id.cmp(&self.screen_id))
    }
}

impl PartialOrd for FrontierItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort frontier items best-first.
pub fn sort_frontier(items: &mut [FrontierItem]) {
    items.sort_by(|a, b| b.cmp(a));
}
