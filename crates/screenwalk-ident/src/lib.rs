pub mod identity;
pub mod parse;
pub mod types;

pub use identity::{compute_screen_id, generate_element_id, IdentityError, ScreenId};
pub use parse::{parse_descriptor, ParseError};
pub use types::{Bounds, ScreenDescriptor, UiElement};
