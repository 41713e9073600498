//! Sensor and action candidates for the flow-generation collaborator.
//!
//! A sensor candidate is a read-only element that displays a value; an action
//! candidate is something the user can tap. Both accumulate across passes,
//! one entry per element ID.

use screenwalk_ident::{ScreenId, UiElement};
use serde::{Deserialize, Serialize};

/// Things deduplicated by element ID.
pub trait ElementKeyed {
    fn element_id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorCandidate {
    pub element_id: String,
    pub screen_id: ScreenId,
    pub resource_id: Option<String>,
    pub class_name: String,
    /// Text at first sighting.
    pub sample_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCandidate {
    pub element_id: String,
    pub screen_id: ScreenId,
    pub label: String,
    pub class_name: String,
    pub toggle: bool,
}

impl ElementKeyed for SensorCandidate {
    fn element_id(&self) -> &str {
        &self.element_id
    }
}

impl ElementKeyed for ActionCandidate {
    fn element_id(&self) -> &str {
        &self.element_id
    }
}

/// Append entries from `incoming` whose element ID is not yet in `existing`.
/// The first entry seen for an ID wins. Returns how many were added.
pub fn merge_by_element_id<T: ElementKeyed>(
    existing: &mut Vec<T>,
    incoming: impl IntoIterator<Item = T>,
) -> usize {
    let before = existing.len();
    for item in incoming {
        if !existing.iter().any(|e| e.element_id() == item.element_id()) {
            existing.push(item);
        }
    }
    existing.len() - before
}

/// Classify the elements of one capture.
pub fn collect_candidates(
    screen_id: &ScreenId,
    elements: &[UiElement],
) -> (Vec<SensorCandidate>, Vec<ActionCandidate>) {
    let mut sensors = Vec::new();
    let mut actions = Vec::new();

    for element in elements {
        if element.is_actionable() {
            if let Some(label) = element.label() {
                actions.push(ActionCandidate {
                    element_id: element.element_id.clone(),
                    screen_id: screen_id.clone(),
                    label: label.to_string(),
                    class_name: element.class_name.clone(),
                    toggle: element.checkable,
                });
            }
        } else if !element.scrollable {
            let Some(text) = element.text.as_deref().map(str::trim) else {
                continue;
            };
            if text.chars().any(|c| c.is_ascii_digit()) {
                sensors.push(SensorCandidate {
                    element_id: element.element_id.clone(),
                    screen_id: screen_id.clone(),
                    resource_id: element.resource_id.clone(),
                    class_name: element.class_name.clone(),
                    sample_text: text.to_string(),
                });
            }
        }
    }

    (sensors, actions)
}
