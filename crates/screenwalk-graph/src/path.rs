//! Path queries over the navigation graph.
//!
//! Two flavours:
//! - [`NavigationGraph::find_path`]: fewest hops over the most recent
//!   destination of every element.
//! - [`NavigationGraph::find_optimal_path`]: Dijkstra over every destination
//!   ever observed, with edge cost `1 - reliability`. This is the one the
//!   planner uses; when the two disagree it is authoritative.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap, VecDeque};

use screenwalk_ident::ScreenId;
use serde::{Deserialize, Serialize};

use crate::graph::NavigationGraph;

/// One tap of a planned route: on `screen`, tap `element_id`, expect `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub screen: ScreenId,
    pub element_id: String,
    pub destination: ScreenId,
}

/// Heap entry for Dijkstra. Ordered so the max-heap pops the lowest cost,
/// breaking ties by screen ID for determinism.
#[derive(Debug, Clone, PartialEq)]
struct Frontier {
    cost: f64,
    screen: ScreenId,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.screen.cmp(&self.screen))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl NavigationGraph {
    /// Shortest hop-count route using each element's most recent destination.
    ///
    /// `find_path(x, x)` is `Some(vec![])`; unreachable targets give `None`.
    /// Prefer [`find_optimal_path`](Self::find_optimal_path) for planning.
    pub fn find_path(&self, from: &ScreenId, to: &ScreenId) -> Option<Vec<PathStep>> {
        if from == to {
            return Some(Vec::new());
        }

        let mut parent: HashMap<ScreenId, PathStep> = HashMap::new();
        let mut visited: BTreeSet<ScreenId> = BTreeSet::new();
        let mut queue = VecDeque::new();

        visited.insert(from.clone());
        queue.push_back(from.clone());

        while let Some(current) = queue.pop_front() {
            let Some(edges) = self.last_destinations(&current) else {
                continue;
            };
            for (element_id, next) in edges {
                if !visited.insert(next.clone()) {
                    continue;
                }
                parent.insert(
                    next.clone(),
                    PathStep {
                        screen: current.clone(),
                        element_id: element_id.clone(),
                        destination: next.clone(),
                    },
                );
                if next == to {
                    return Some(unwind(&parent, from, to));
                }
                queue.push_back(next.clone());
            }
        }

        None
    }

    /// Most reliable route: minimizes the sum of `1 - reliability` over all
    /// observed destinations. Blocker screens are never passed through, only
    /// entered when they are the requested destination.
    pub fn find_optimal_path(&self, from: &ScreenId, to: &ScreenId) -> Option<Vec<PathStep>> {
        self.find_optimal_path_avoiding(from, to, &BTreeSet::new())
    }

    /// [`find_optimal_path`](Self::find_optimal_path) that also refuses to
    /// enter any screen in `avoid` (unless it is the destination).
    pub fn find_optimal_path_avoiding(
        &self,
        from: &ScreenId,
        to: &ScreenId,
        avoid: &BTreeSet<ScreenId>,
    ) -> Option<Vec<PathStep>> {
        if from == to {
            return Some(Vec::new());
        }

        let mut best: BTreeMap<ScreenId, f64> = BTreeMap::new();
        let mut parent: HashMap<ScreenId, PathStep> = HashMap::new();
        let mut settled: BTreeSet<ScreenId> = BTreeSet::new();
        let mut heap = BinaryHeap::new();

        best.insert(from.clone(), 0.0);
        heap.push(Frontier {
            cost: 0.0,
            screen: from.clone(),
        });

        while let Some(Frontier { cost, screen }) = heap.pop() {
            if !settled.insert(screen.clone()) {
                continue;
            }
            if &screen == to {
                return Some(unwind(&parent, from, to));
            }

            for nav in self.elements_from(&screen) {
                for candidate in nav.destinations().keys() {
                    if candidate != to
                        && (self.is_blocker_screen(candidate) || avoid.contains(candidate))
                    {
                        continue;
                    }
                    if settled.contains(candidate) {
                        continue;
                    }
                    let edge = 1.0 - self.transition_reliability(&screen, nav.element_id(), candidate);
                    let next_cost = cost + edge;
                    let improves = best.get(candidate).map_or(true, |&known| next_cost < known);
                    if improves {
                        best.insert(candidate.clone(), next_cost);
                        parent.insert(
                            candidate.clone(),
                            PathStep {
                                screen: screen.clone(),
                                element_id: nav.element_id().to_string(),
                                destination: candidate.clone(),
                            },
                        );
                        heap.push(Frontier {
                            cost: next_cost,
                            screen: candidate.clone(),
                        });
                    }
                }
            }
        }

        None
    }

    /// Total `1 - reliability` of a route, for comparing alternatives.
    pub fn path_cost(&self, path: &[PathStep]) -> f64 {
        path.iter()
            .map(|step| 1.0 - self.transition_reliability(&step.screen, &step.element_id, &step.destination))
            .sum()
    }
}

fn unwind(parent: &HashMap<ScreenId, PathStep>, from: &ScreenId, to: &ScreenId) -> Vec<PathStep> {
    let mut steps = Vec::new();
    let mut cursor = to.clone();
    while &cursor != from {
        let Some(step) = parent.get(&cursor) else {
            break;
        };
        cursor = step.screen.clone();
        steps.push(step.clone());
    }
    steps.reverse();
    steps
}
