use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use screenwalk_ident::ScreenId;
use serde::{Deserialize, Serialize};

/// Observed outcomes of tapping one element on one screen.
///
/// The same tap can land on different screens depending on hidden app state
/// (logged in or not, first launch, feature flags), so destinations are kept
/// as a histogram rather than a single edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNavigation {
    from_screen: ScreenId,
    element_id: String,
    destinations: BTreeMap<ScreenId, u32>,
    blocker_destinations: BTreeSet<ScreenId>,
    tap_count: u32,
    first_seen: DateTime<Utc>,
}

impl ElementNavigation {
    pub(crate) fn new(from_screen: ScreenId, element_id: &str, first_seen: DateTime<Utc>) -> Self {
        Self {
            from_screen,
            element_id: element_id.to_string(),
            destinations: BTreeMap::new(),
            blocker_destinations: BTreeSet::new(),
            tap_count: 0,
            first_seen,
        }
    }

    /// Count one tap that landed on `to`. Returns true on the first landing there.
    pub(crate) fn record(&mut self, to: &ScreenId) -> bool {
        self.tap_count += 1;
        let visits = self.destinations.entry(to.clone()).or_insert(0);
        *visits += 1;
        *visits == 1
    }

    pub(crate) fn flag_blocker(&mut self, to: &ScreenId) {
        self.blocker_destinations.insert(to.clone());
    }

    pub fn from_screen(&self) -> &ScreenId {
        &self.from_screen
    }

    pub fn element_id(&self) -> &str {
        &self.element_id
    }

    pub fn destinations(&self) -> &BTreeMap<ScreenId, u32> {
        &self.destinations
    }

    pub fn blocker_destinations(&self) -> &BTreeSet<ScreenId> {
        &self.blocker_destinations
    }

    pub fn tap_count(&self) -> u32 {
        self.tap_count
    }

    pub fn first_seen(&self) -> DateTime<Utc> {
        self.first_seen
    }

    pub fn visits_to(&self, to: &ScreenId) -> u32 {
        self.destinations.get(to).copied().unwrap_or(0)
    }

    pub fn total_visits(&self) -> u32 {
        self.destinations.values().sum()
    }

    /// Led to two or more distinct screens.
    pub fn is_conditional(&self) -> bool {
        self.destinations.len() >= 2
    }

    pub fn is_blocker_destination(&self, to: &ScreenId) -> bool {
        self.blocker_destinations.contains(to)
    }

    /// Most visited destination; ties go to the smallest screen ID.
    pub fn most_visited(&self) -> Option<&ScreenId> {
        most_visited_of(self.destinations.iter())
    }

    /// Most visited destination that is not a blocker for this element and
    /// passes `is_blocker`, falling back to [`most_visited`](Self::most_visited).
    pub fn real_destination(&self, is_blocker: impl Fn(&ScreenId) -> bool) -> Option<&ScreenId> {
        let non_blocker = self
            .destinations
            .iter()
            .filter(|(screen, _)| !self.blocker_destinations.contains(*screen) && !is_blocker(screen));
        most_visited_of(non_blocker).or_else(|| self.most_visited())
    }
}

fn most_visited_of<'a>(
    entries: impl Iterator<Item = (&'a ScreenId, &'a u32)>,
) -> Option<&'a ScreenId> {
    let mut best: Option<(&ScreenId, u32)> = None;
    for (screen, &visits) in entries {
        match best {
            Some((_, best_visits)) if visits <= best_visits => {}
            _ => best = Some((screen, visits)),
        }
    }
    best.map(|(screen, _)| screen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use screenwalk_ident::compute_screen_id;

    fn screen(name: &str) -> ScreenId {
        compute_screen_id(name, "com.test")
    }

    #[test]
    fn test_record_counts_taps_and_visits() {
        let mut nav = ElementNavigation::new(screen("A"), "btn", Utc::now());
        assert!(nav.record(&screen("B")));
        assert!(!nav.record(&screen("B")));
        assert_eq!(nav.tap_count(), 2);
        assert_eq!(nav.visits_to(&screen("B")), 2);
        assert!(!nav.is_conditional());
    }

    #[test]
    fn test_most_visited_tie_prefers_smallest_id() {
        let mut nav = ElementNavigation::new(screen("A"), "btn", Utc::now());
        let (b, c) = (screen("B"), screen("C"));
        nav.record(&b);
        nav.record(&c);
        let expected = std::cmp::min(&b, &c);
        assert_eq!(nav.most_visited(), Some(expected));
    }

    #[test]
    fn test_real_destination_falls_back_when_all_blocked() {
        let mut nav = ElementNavigation::new(screen("A"), "btn", Utc::now());
        let login = screen("Login");
        nav.record(&login);
        nav.flag_blocker(&login);
        assert_eq!(nav.real_destination(|_| false), Some(&login));
    }
}
