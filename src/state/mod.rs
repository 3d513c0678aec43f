//! Session state for one open character asset.
//!
//! The [`Session`] is the explicit context object the host UI drives: it
//! owns the long-lived metadata draft, the user settings, and the reports
//! of the last validation pass. It is created when the asset is opened and
//! torn down when the asset closes; the host event loop serializes all
//! calls, so no locking is involved.
//!
//! Mutations emit [`SessionEvent`]s that the UI drains with
//! [`Session::take_events`] to refresh its panels.

use std::fs;
use std::time::Instant;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use crate::config::SessionSettings;
use crate::metrics::Metrics;
use crate::models::conventions::{BLENDSHAPE_ROLES, BONE_ROLES};
use crate::models::{CharacterMetadata, EyeRig, default_draft};
use crate::scene::Scene;
use crate::services::assignment::{
    BoneAssignment, ShapeKeyAssignment, check_duplicate_assigned_bones,
};
use crate::services::cleanup::cleanup_character;
use crate::services::export::ExportData;
use crate::services::validation::{
    ValidationReports, ValidationStatus, validate_character,
};

/// Change events emitted when the session is modified.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The metadata draft changed through a UI assignment.
    MetadataChanged,

    /// A validation pass finished with the given verdict.
    ValidationFinished { status: ValidationStatus },

    /// The cleanup executor ran.
    CleanupApplied,

    /// An export package was written.
    ExportFinished { output_path: Utf8PathBuf },
}

/// Errors for session operations driven by the UI.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("Unknown bone role `{0}`")]
    UnknownBoneRole(String),

    #[error("Unknown blendshape role `{0}`")]
    UnknownBlendshapeRole(String),

    #[error("Please save your file before proceeding")]
    UnsavedAsset,

    #[error("Run Validation first")]
    ValidationRequired,

    #[error("Character is not ready for export")]
    NotExportable,
}

/// Errors for eye-rig registration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EyeRigError {
    #[error("Selected eye bone is already registered!")]
    AlreadyRegistered,

    #[error("Eye bone already registered as pose bone!")]
    RegisteredAsPoseBone,

    #[error("Horizontal and vertical axis are the same!")]
    SameAxis,
}

/// Long-lived state for one open asset.
pub struct Session {
    asset_path: Option<Utf8PathBuf>,
    settings: SessionSettings,
    draft: Value,
    metadata: Option<CharacterMetadata>,
    reports: ValidationReports,
    status: Option<ValidationStatus>,
    cleanup_required: bool,
    metrics: Metrics,
    events: Vec<SessionEvent>,
}

impl Session {
    /// Session for an asset that has not been saved to disk yet.
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            asset_path: None,
            settings,
            draft: default_draft(),
            metadata: None,
            reports: ValidationReports::default(),
            status: None,
            cleanup_required: false,
            metrics: Metrics::new(),
            events: Vec::new(),
        }
    }

    /// Session for an asset file on disk.
    pub fn open(asset_path: impl Into<Utf8PathBuf>, settings: SessionSettings) -> Self {
        let mut session = Self::new(settings);
        session.asset_path = Some(asset_path.into());
        session
    }

    /// Called when the host saves the asset for the first time.
    pub fn set_asset_path(&mut self, asset_path: impl Into<Utf8PathBuf>) {
        self.asset_path = Some(asset_path.into());
    }

    pub fn asset_path(&self) -> Option<&Utf8Path> {
        self.asset_path.as_deref()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SessionSettings {
        &mut self.settings
    }

    /// Raw metadata draft, as the UI panels render it.
    pub fn draft(&self) -> &Value {
        &self.draft
    }

    /// Decoded metadata of the last validation pass that got past the
    /// Metadata stage.
    pub fn metadata(&self) -> Option<&CharacterMetadata> {
        self.metadata.as_ref()
    }

    pub fn reports(&self) -> &ValidationReports {
        &self.reports
    }

    pub fn status(&self) -> Option<ValidationStatus> {
        self.status
    }

    pub fn cleanup_required(&self) -> bool {
        self.cleanup_required
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Drains the queued change events.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    // Metadata draft mutations, driven by the UI collaborator.

    pub fn set_armature(&mut self, name: Option<&str>) {
        self.draft["body"]["armature_name"] = opt_value(name);
        self.events.push(SessionEvent::MetadataChanged);
    }

    pub fn set_face_mesh(&mut self, name: Option<&str>) {
        self.draft["face"]["mesh_name"] = opt_value(name);
        self.events.push(SessionEvent::MetadataChanged);
    }

    pub fn assign_bone(&mut self, role: &str, bone_name: Option<&str>) -> Result<(), SessionError> {
        if !BONE_ROLES.contains(&role) {
            return Err(SessionError::UnknownBoneRole(role.to_string()));
        }
        self.draft["body"]["bone_names"][role] = opt_value(bone_name);
        self.events.push(SessionEvent::MetadataChanged);
        Ok(())
    }

    pub fn assign_blendshape(
        &mut self,
        role: &str,
        shape_key_name: Option<&str>,
    ) -> Result<(), SessionError> {
        if !BLENDSHAPE_ROLES.contains(&role) {
            return Err(SessionError::UnknownBlendshapeRole(role.to_string()));
        }
        self.draft["face"]["blendshape_names"][role] = opt_value(shape_key_name);
        self.events.push(SessionEvent::MetadataChanged);
        Ok(())
    }

    /// Applies an auto-assignment result to the draft.
    pub fn apply_bone_assignment(&mut self, assignment: &BoneAssignment) {
        for (role, bone_name) in &assignment.bones {
            self.draft["body"]["bone_names"][role] = opt_value(bone_name.as_deref());
        }
        self.events.push(SessionEvent::MetadataChanged);
    }

    /// Applies a blendshape auto-assignment result to the draft.
    pub fn apply_shape_key_assignment(&mut self, assignment: &ShapeKeyAssignment) {
        match assignment {
            ShapeKeyAssignment::Clear => {
                for role in BLENDSHAPE_ROLES {
                    self.draft["face"]["blendshape_names"][role] = Value::Null;
                }
                self.draft["eyes_rig"] = Value::Array(Vec::new());
                self.events.push(SessionEvent::MetadataChanged);
            }
            ShapeKeyAssignment::Unmatched => {}
            ShapeKeyAssignment::Assigned { blendshapes, .. } => {
                for (role, shape_key_name) in blendshapes {
                    self.draft["face"]["blendshape_names"][role] =
                        opt_value(shape_key_name.as_deref());
                }
                self.events.push(SessionEvent::MetadataChanged);
            }
        }
    }

    /// Registers an eye rig, guarding against duplicate registration,
    /// reuse of a pose bone, and degenerate axes.
    pub fn add_eye_rig(&mut self, rig: EyeRig) -> Result<(), EyeRigError> {
        if rig.horizontal_rotation_axis == rig.vertical_rotation_axis {
            return Err(EyeRigError::SameAxis);
        }
        let registered = self.draft["eyes_rig"]
            .as_array()
            .map(|rigs| {
                rigs.iter()
                    .any(|entry| entry["bone_name"].as_str() == Some(rig.bone_name.as_str()))
            })
            .unwrap_or(false);
        if registered {
            return Err(EyeRigError::AlreadyRegistered);
        }
        if self
            .draft_bone_names()
            .values()
            .any(|value| value.as_deref() == Some(rig.bone_name.as_str()))
        {
            return Err(EyeRigError::RegisteredAsPoseBone);
        }

        let entry = serde_json::to_value(&rig).unwrap_or(Value::Null);
        if let Some(rigs) = self.draft["eyes_rig"].as_array_mut() {
            rigs.push(entry);
        }
        self.events.push(SessionEvent::MetadataChanged);
        Ok(())
    }

    /// Removes the eye rig registered for `bone_name`, if any.
    pub fn remove_eye_rig(&mut self, bone_name: &str) -> bool {
        let Some(rigs) = self.draft["eyes_rig"].as_array_mut() else {
            return false;
        };
        let before = rigs.len();
        rigs.retain(|entry| entry["bone_name"].as_str() != Some(bone_name));
        let removed = rigs.len() != before;
        if removed {
            self.events.push(SessionEvent::MetadataChanged);
        }
        removed
    }

    /// Bone names assigned more than once in the current draft.
    pub fn duplicate_bones(&self) -> Vec<String> {
        check_duplicate_assigned_bones(&self.draft_bone_names())
    }

    /// Runs the full validation pipeline against the current scene.
    pub fn validate(&mut self, scene: &mut dyn Scene) -> Result<ValidationStatus> {
        let asset_path = self
            .asset_path
            .clone()
            .ok_or(SessionError::UnsavedAsset)?;
        let textures_dir = asset_path
            .parent()
            .ok_or(SessionError::UnsavedAsset)?
            .to_path_buf();

        // Stamp the running add-on version before the schema check.
        if let Some(root) = self.draft.as_object_mut() {
            root.insert("version".to_string(), Value::from(crate::ADDON_VERSION));
        }

        let start = Instant::now();
        let outcome = validate_character(
            &self.draft,
            crate::ADDON_VERSION,
            scene,
            &textures_dir,
            self.settings.usd_export,
        )?;
        self.metrics.record_validation(start.elapsed());

        self.metadata = outcome.metadata;
        self.reports = outcome.reports;
        self.status = Some(outcome.status);
        self.cleanup_required = outcome.status == ValidationStatus::Cleanup;
        self.events.push(SessionEvent::ValidationFinished {
            status: outcome.status,
        });
        Ok(outcome.status)
    }

    /// Runs the cleanup executor for the failing rules of the last
    /// validation pass, after backing up the asset file.
    pub fn cleanup(&mut self, scene: &mut dyn Scene) -> Result<()> {
        let metadata = self
            .metadata
            .as_ref()
            .ok_or(SessionError::ValidationRequired)?;

        if let Some(asset_path) = &self.asset_path {
            backup_asset_file(asset_path)?;
        }

        cleanup_character(metadata, &self.reports.cleanup, scene)
            .context("Cleanup failed to mutate the scene")?;

        self.metrics.record_cleanup();
        self.cleanup_required = false;
        self.events.push(SessionEvent::CleanupApplied);
        Ok(())
    }

    /// Builds the export package. Only valid after a validation pass ended
    /// exportable (`warning` or `clean`).
    pub fn export(&mut self, scene: &dyn Scene) -> Result<Utf8PathBuf> {
        if !self.status.is_some_and(|status| status.is_exportable()) {
            return Err(SessionError::NotExportable.into());
        }
        let metadata = self
            .metadata
            .as_ref()
            .ok_or(SessionError::ValidationRequired)?;
        let asset_path = self
            .asset_path
            .clone()
            .ok_or(SessionError::UnsavedAsset)?;

        let export = ExportData::new(&asset_path, &self.settings.export_folder)?;
        let output_path = export.run(metadata, scene)?;

        self.metrics.record_export();
        self.events.push(SessionEvent::ExportFinished {
            output_path: output_path.clone(),
        });
        Ok(output_path)
    }

    fn draft_bone_names(&self) -> IndexMap<String, Option<String>> {
        let mut bone_names = IndexMap::new();
        if let Some(map) = self.draft["body"]["bone_names"].as_object() {
            for (role, value) in map {
                bone_names.insert(role.clone(), value.as_str().map(str::to_string));
            }
        }
        bone_names
    }
}

fn opt_value(value: Option<&str>) -> Value {
    match value {
        Some(text) => Value::from(text),
        None => Value::Null,
    }
}

/// Copies the asset to `<stem>_backup.<ext>` before destructive cleanup.
fn backup_asset_file(asset_path: &Utf8Path) -> Result<()> {
    let Some(parent) = asset_path.parent() else {
        return Ok(());
    };
    let stem = asset_path.file_stem().unwrap_or("character");
    let backup_name = match asset_path.extension() {
        Some(ext) => format!("{stem}_backup.{ext}"),
        None => format!("{stem}_backup"),
    };
    fs::copy(asset_path, parent.join(backup_name))
        .with_context(|| format!("Failed to back up {asset_path}"))?;
    Ok(())
}
