use crate::types::ScreenDescriptor;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("screen descriptor has an empty {0}")]
    MissingField(&'static str),
}

/// Decode a capture collaborator's screen descriptor and assign element IDs.
pub fn parse_descriptor(json: &str) -> Result<ScreenDescriptor, ParseError> {
    let mut descriptor: ScreenDescriptor = serde_json::from_str(json)?;
    if descriptor.package_name.trim().is_empty() {
        return Err(ParseError::MissingField("package_name"));
    }
    if descriptor.activity.trim().is_empty() {
        return Err(ParseError::MissingField("activity"));
    }
    descriptor.assign_element_ids();
    Ok(descriptor)
}
