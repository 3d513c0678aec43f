//! Metadata stage: schema validation of the session's metadata draft.
//!
//! Runs first and alone gates everything else: when the character's own
//! bookkeeping is inconsistent, inspecting the scene is meaningless. The
//! caller stamps the running add-on version into the draft before
//! validation (see [`crate::state::Session::validate`]); this stage checks
//! that the stamp is present and current.

use serde_json::Value;

use crate::models::{CharacterMetadata, decode_metadata};
use crate::services::rules::{ReportEntry, StageReport};

pub const METADATA_CHECK_KEY: &str = "metadata_check";

const METADATA_BASE_MESSAGE: &str = "Character metadata does not match the expected schema!";

/// Stage aggregator for the single schema-validity entry.
pub struct MetadataStage;

impl MetadataStage {
    /// Decodes and constrains the draft against the schema and the running
    /// add-on version.
    ///
    /// Returns the one-entry report plus the decoded record when the draft
    /// is valid; later stages consume the record read-only.
    pub fn run(draft: &Value, addon_version: &str) -> (StageReport, Option<CharacterMetadata>) {
        let mut report = StageReport::new();
        match Self::decode(draft, addon_version) {
            Ok(metadata) => {
                report.insert(
                    METADATA_CHECK_KEY,
                    ReportEntry {
                        check: true,
                        message: METADATA_BASE_MESSAGE.to_string(),
                    },
                );
                (report, Some(metadata))
            }
            Err(detail) => {
                tracing::warn!("Metadata draft failed schema validation: {detail}");
                report.insert(
                    METADATA_CHECK_KEY,
                    ReportEntry {
                        check: false,
                        message: format!("{METADATA_BASE_MESSAGE}\n{detail}"),
                    },
                );
                (report, None)
            }
        }
    }

    fn decode(draft: &Value, addon_version: &str) -> Result<CharacterMetadata, String> {
        let metadata = decode_metadata(draft).map_err(|err| err.to_string())?;
        if metadata.version != addon_version {
            return Err(format!(
                "metadata version `{}` does not match the running add-on version `{addon_version}`",
                metadata.version
            ));
        }
        Ok(metadata)
    }
}
