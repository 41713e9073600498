//! Deterministic screen and element identities.
//!
//! IDs are derived only from attributes that survive between independent
//! capture sessions (package, activity, resource id, short text, class), so the
//! same logical screen or control maps to the same graph node every run.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::Bounds;

/// Length of a screen ID in hex characters.
pub const SCREEN_ID_LEN: usize = 16;

const MAX_TEXT_LEN: usize = 30;
const TEXT_PREFIX_LEN: usize = 20;
const POSITION_BUCKET_PX: i32 = 10;
const SIZE_BUCKET_PX: i32 = 20;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("screen id must be {SCREEN_ID_LEN} hex characters, got {0:?}")]
    MalformedScreenId(String),
}

/// Stable identity of a screen: the first 16 hex chars of
/// `sha256("<package>|<activity>")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScreenId(String);

impl ScreenId {
    /// Validate an externally supplied ID.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let well_formed = raw.len() == SCREEN_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if well_formed {
            Ok(Self(raw.to_string()))
        } else {
            Err(IdentityError::MalformedScreenId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ScreenId {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ScreenId> for String {
    fn from(id: ScreenId) -> Self {
        id.0
    }
}

/// Compute the screen ID for an activity of a package.
///
/// On-screen text and layout never participate, so dynamic content cannot
/// fragment one logical screen into several nodes.
pub fn compute_screen_id(activity: &str, package_name: &str) -> ScreenId {
    let mut hasher = Sha256::new();
    hasher.update(format!("{package_name}|{activity}").as_bytes());
    let digest = hex::encode(hasher.finalize());
    ScreenId(digest[..SCREEN_ID_LEN].to_string())
}

/// Compute an element ID from its stable attributes.
///
/// Layout: `<resource segment>_<text prefix>_<class simple name>`, lowercased and
/// restricted to `[a-z0-9_]`. Anonymous elements (no resource id and no text)
/// also get their quantized center and size appended, so unlabeled containers
/// stay distinct while sub-pixel jitter between captures still maps to the
/// same ID.
pub fn generate_element_id(
    resource_id: Option<&str>,
    text: Option<&str>,
    class_name: &str,
    bounds: Option<&Bounds>,
) -> String {
    let resource = resource_id
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| r.rsplit('/').next().unwrap_or(r));
    let text = text.map(str::trim).filter(|t| !t.is_empty());

    let mut parts: Vec<String> = Vec::with_capacity(4);
    if let Some(segment) = resource {
        parts.push(segment.to_string());
    }
    if let Some(t) = text {
        if t.chars().count() < MAX_TEXT_LEN {
            parts.push(t.chars().take(TEXT_PREFIX_LEN).collect());
        }
    }
    parts.push(simple_class_name(class_name).to_string());

    if resource.is_none() && text.is_none() {
        if let Some(b) = bounds {
            parts.push(format!(
                "{}_{}_{}_{}",
                quantize(b.center_x(), POSITION_BUCKET_PX),
                quantize(b.center_y(), POSITION_BUCKET_PX),
                quantize(b.width(), SIZE_BUCKET_PX),
                quantize(b.height(), SIZE_BUCKET_PX),
            ));
        }
    }

    sanitize(&parts.join("_"))
}

fn simple_class_name(class_name: &str) -> &str {
    class_name.rsplit('.').next().unwrap_or(class_name)
}

/// Round to the nearest multiple of `step` (half away from zero).
fn quantize(value: i32, step: i32) -> i32 {
    ((value as f64 / step as f64).round() as i32) * step
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_lowercase)
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_id_shape() {
        let id = compute_screen_id(".MainActivity", "com.example.app");
        assert_eq!(id.as_str().len(), SCREEN_ID_LEN);
        assert!(ScreenId::parse(id.as_str()).is_ok());
    }

    #[test]
    fn test_screen_id_matches_sha256_prefix() {
        // sha256("a|b")
        let id = compute_screen_id("b", "a");
        let expected = hex::encode(Sha256::digest(b"a|b"));
        assert_eq!(id.as_str(), &expected[..16]);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(ScreenId::parse("").is_err());
        assert!(ScreenId::parse("ABCDEF0123456789").is_err());
        assert!(ScreenId::parse("0123456789abcdeg").is_err());
        assert!(ScreenId::parse("0123456789abcdef0").is_err());
        assert!(ScreenId::parse("0123456789abcdef").is_ok());
    }

    #[test]
    fn test_quantize() {
        assert_eq!(quantize(104, 10), 100);
        assert_eq!(quantize(105, 10), 110);
        assert_eq!(quantize(209, 20), 200);
        assert_eq!(quantize(211, 20), 220);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Sign In!_Button"), "sign_in__button");
        assert_eq!(sanitize("a-b"), "a_b");
    }

    #[test]
    fn test_long_text_is_dropped() {
        let long = "This label is definitely longer than thirty characters";
        let id = generate_element_id(Some("com.app:id/banner"), Some(long), "android.widget.TextView", None);
        assert_eq!(id, "banner_textview");
    }

    #[test]
    fn test_text_prefix_truncated_to_twenty() {
        let id = generate_element_id(None, Some("abcdefghijklmnopqrstuvwxy"), "Button", None);
        assert_eq!(id, "abcdefghijklmnopqrst_button");
    }
}
