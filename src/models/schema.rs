//! Metadata schema decoding and its error taxonomy.
//!
//! A failing decode blocks every later validation stage: scene inspection
//! is meaningless while the character's own bookkeeping is inconsistent.

use serde_json::Value;
use thiserror::Error;

use crate::models::metadata::CharacterMetadata;

/// Errors produced while decoding a metadata draft.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Structural mismatch: missing field, wrong primitive type, list where
    /// a record was expected, or an unknown `material_type` tag.
    #[error("metadata does not match the expected structure: {0}")]
    Type(#[from] serde_json::Error),

    /// Value-domain violation on a structurally valid record.
    #[error("invalid value for `{field}`: {message}")]
    Value { field: String, message: String },
}

impl SchemaError {
    pub fn value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Value {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Decodes a raw metadata draft into a validated [`CharacterMetadata`].
///
/// Structural validation is depth-first and fail-fast; value-domain
/// constraints run only once the structure is sound. The returned record has
/// its role mappings in canonical order regardless of draft key order, so
/// decoding an already-exported record is idempotent.
pub fn decode_metadata(draft: &Value) -> Result<CharacterMetadata, SchemaError> {
    let mut metadata: CharacterMetadata = serde_json::from_value(draft.clone())?;
    metadata.validate()?;
    Ok(metadata)
}

/// Fresh draft with session defaults: software preset, placeholder version,
/// every bone and blendshape role unassigned.
pub fn default_draft() -> Value {
    serde_json::to_value(CharacterMetadata::default()).expect("default metadata must serialize")
}
