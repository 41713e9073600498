use serde::{Deserialize, Serialize};

use crate::identity::{compute_screen_id, generate_element_id, ScreenId};

// ── Geometry ─────────────────────────────────────────────────────────

/// Screen-space rectangle of a UI element, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn center_x(&self) -> i32 {
        self.left + self.width() / 2
    }

    pub fn center_y(&self) -> i32 {
        self.top + self.height() / 2
    }

    /// Zero or negative area. Gestures against empty bounds are never dispatched.
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

// ── Elements ─────────────────────────────────────────────────────────

/// A single node of a captured UI tree, reduced to the attributes the
/// planner needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiElement {
    /// Derived identity; filled by [`UiElement::new`] or
    /// [`ScreenDescriptor::assign_element_ids`] when absent in captured JSON.
    #[serde(default)]
    pub element_id: String,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub content_description: Option<String>,
    pub class_name: String,
    #[serde(default)]
    pub bounds: Bounds,
    #[serde(default)]
    pub clickable: bool,
    #[serde(default)]
    pub scrollable: bool,
    #[serde(default)]
    pub checkable: bool,
    #[serde(default)]
    pub checked: bool,
}

impl UiElement {
    pub fn new(
        resource_id: Option<&str>,
        text: Option<&str>,
        class_name: &str,
        bounds: Bounds,
    ) -> Self {
        let mut element = Self {
            element_id: String::new(),
            resource_id: resource_id.map(str::to_string),
            text: text.map(str::to_string),
            content_description: None,
            class_name: class_name.to_string(),
            bounds,
            clickable: false,
            scrollable: false,
            checkable: false,
            checked: false,
        };
        element.refresh_id();
        element
    }

    pub fn clickable(mut self) -> Self {
        self.clickable = true;
        self
    }

    pub fn scrollable(mut self) -> Self {
        self.scrollable = true;
        self
    }

    pub fn checkable(mut self, checked: bool) -> Self {
        self.checkable = true;
        self.checked = checked;
        self
    }

    pub fn with_content_description(mut self, description: &str) -> Self {
        self.content_description = Some(description.to_string());
        self
    }

    /// Recompute `element_id` from the stable attributes.
    pub fn refresh_id(&mut self) {
        self.element_id = generate_element_id(
            self.resource_id.as_deref(),
            self.text.as_deref(),
            &self.class_name,
            Some(&self.bounds),
        );
    }

    /// Can be tapped: clickable, or a toggle/checkbox.
    pub fn is_actionable(&self) -> bool {
        self.clickable || self.checkable
    }

    /// Best human-readable label: text, then content description, then
    /// resource-id segment.
    pub fn label(&self) -> Option<&str> {
        self.text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                self.content_description
                    .as_deref()
                    .filter(|d| !d.trim().is_empty())
            })
            .or_else(|| {
                self.resource_id
                    .as_deref()
                    .and_then(|r| r.rsplit('/').next())
                    .filter(|s| !s.is_empty())
            })
    }
}

// ── Captures ─────────────────────────────────────────────────────────

/// What the capture collaborator hands over for one screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenDescriptor {
    pub package_name: String,
    pub activity: String,
    #[serde(default)]
    pub elements: Vec<UiElement>,
}

impl ScreenDescriptor {
    pub fn new(package_name: &str, activity: &str, elements: Vec<UiElement>) -> Self {
        Self {
            package_name: package_name.to_string(),
            activity: activity.to_string(),
            elements,
        }
    }

    pub fn screen_id(&self) -> ScreenId {
        compute_screen_id(&self.activity, &self.package_name)
    }

    /// Fill in `element_id` for every element that arrived without one.
    pub fn assign_element_ids(&mut self) {
        for element in &mut self.elements {
            if element.element_id.is_empty() {
                element.refresh_id();
            }
        }
    }

    pub fn find_element(&self, element_id: &str) -> Option<&UiElement> {
        self.elements.iter().find(|e| e.element_id == element_id)
    }
}
