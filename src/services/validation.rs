//! Validation orchestrator.
//!
//! Runs the four stages in strict order, short-circuiting on the first
//! failing stage. The Warning stage is terminal either way: failing
//! entries there downgrade the verdict to pass-with-caveats instead of
//! aborting.

use anyhow::{Context, Result};
use camino::Utf8Path;
use serde_json::Value;

use crate::models::CharacterMetadata;
use crate::scene::Scene;
use crate::services::cleanup::CleanupStage;
use crate::services::metadata_check::MetadataStage;
use crate::services::requirement::RequirementStage;
use crate::services::rules::StageReport;
use crate::services::warning::WarningStage;

/// Terminal verdict of one validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStatus {
    /// Metadata schema invalid; nothing else was inspected.
    Metadata,
    /// Remediable scene defects; run the cleanup and validate again.
    Cleanup,
    /// Hard requirements not met; the character cannot be uploaded.
    Fail,
    /// Uploadable, with quality caveats.
    Warning,
    /// Uploadable as-is.
    Clean,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Metadata => "metadata",
            ValidationStatus::Cleanup => "cleanup",
            ValidationStatus::Fail => "fail",
            ValidationStatus::Warning => "warning",
            ValidationStatus::Clean => "clean",
        }
    }

    /// Export runs only for verdicts that leave the character uploadable.
    pub fn is_exportable(&self) -> bool {
        matches!(self, ValidationStatus::Warning | ValidationStatus::Clean)
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four per-stage reports of one validation pass. Stages that never
/// ran stay empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReports {
    pub metadata: StageReport,
    pub cleanup: StageReport,
    pub requirement: StageReport,
    pub warning: StageReport,
}

/// Everything one validation pass produced.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub status: ValidationStatus,
    /// Decoded metadata, present once the Metadata stage passed.
    pub metadata: Option<CharacterMetadata>,
    pub reports: ValidationReports,
}

/// Runs the full pipeline against the session's metadata draft and the
/// current scene.
///
/// Side effect: the scene is normalized (edit modes exited, selection
/// cleared) and persisted before any rule runs. The caller stamps the
/// running add-on version into the draft beforehand.
pub fn validate_character(
    draft: &Value,
    addon_version: &str,
    scene: &mut dyn Scene,
    textures_dir: &Utf8Path,
    usd_enabled: bool,
) -> Result<ValidationOutcome> {
    scene.normalize();
    scene
        .persist()
        .context("Failed to save the scene before validation")?;

    let mut reports = ValidationReports::default();

    let (metadata_report, decoded) = MetadataStage::run(draft, addon_version);
    reports.metadata = metadata_report;
    let Some(metadata) = decoded else {
        tracing::info!("Validation stopped at the metadata stage");
        return Ok(ValidationOutcome {
            status: ValidationStatus::Metadata,
            metadata: None,
            reports,
        });
    };

    reports.cleanup = CleanupStage::run(&metadata, scene);
    if !reports.cleanup.passed() {
        tracing::info!(
            "Validation stopped at the cleanup stage: {:?}",
            reports.cleanup.failing_keys()
        );
        return Ok(ValidationOutcome {
            status: ValidationStatus::Cleanup,
            metadata: Some(metadata),
            reports,
        });
    }

    reports.requirement = RequirementStage::run(&metadata, scene, textures_dir);
    if !reports.requirement.passed() {
        tracing::info!(
            "Validation failed on requirements: {:?}",
            reports.requirement.failing_keys()
        );
        return Ok(ValidationOutcome {
            status: ValidationStatus::Fail,
            metadata: Some(metadata),
            reports,
        });
    }

    reports.warning = WarningStage::run(&metadata, scene, usd_enabled);
    let status = if reports.warning.passed() {
        ValidationStatus::Clean
    } else {
        tracing::info!(
            "Validation passed with warnings: {:?}",
            reports.warning.failing_keys()
        );
        ValidationStatus::Warning
    };

    Ok(ValidationOutcome {
        status,
        metadata: Some(metadata),
        reports,
    })
}
