//! Auto-assignment of bones and blendshapes, plus assignment diagnostics.
//!
//! An unknown skeleton is matched against the known naming conventions by
//! its signature bone (the convention's name for the hips slot, compared
//! after stripping any `namespace:` prefix). The first convention declared
//! in [`BONE_CONVENTIONS`] whose signature matches wins; every role slot
//! is then filled positionally.

use indexmap::IndexMap;

use crate::models::EyeRig;
use crate::models::conventions::{
    BLENDSHAPE_ROLES, BONE_CONVENTIONS, BONE_ROLES, BoneConvention, SHAPE_KEY_CONVENTIONS,
};
use crate::scene::{Scene, SceneResult};

/// Strips a `namespace:` prefix, as used by referenced/imported rigs.
pub fn strip_namespace(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Result of a successful bone auto-assignment.
#[derive(Debug, Clone)]
pub struct BoneAssignment {
    /// Label of the matched convention, for user feedback.
    pub convention: &'static str,
    /// Role to bone-name mapping, unmatched roles left unassigned.
    pub bones: IndexMap<String, Option<String>>,
}

/// Finds the first convention whose signature bone appears in the
/// candidate skeleton.
pub fn detect_bone_convention(bone_names: &[String]) -> Option<&'static BoneConvention> {
    BONE_CONVENTIONS.iter().find(|convention| {
        bone_names
            .iter()
            .any(|name| strip_namespace(name) == convention.signature())
    })
}

/// Matches the armature's bones against the known conventions and fills
/// every role slot. Returns `None` when no convention matches; the user
/// then assigns bones manually.
pub fn auto_assign_bones(
    scene: &dyn Scene,
    armature_name: &str,
) -> SceneResult<Option<BoneAssignment>> {
    let armature = scene.armature(armature_name)?;
    let bone_names: Vec<String> = armature.bones.iter().map(|bone| bone.name.clone()).collect();

    let Some(convention) = detect_bone_convention(&bone_names) else {
        tracing::info!("No bone naming convention matched {armature_name}");
        return Ok(None);
    };
    tracing::info!(
        "Auto assigning bones based on the {} naming convention",
        convention.label
    );

    let mut bones = IndexMap::with_capacity(BONE_ROLES.len());
    for (role, expected) in BONE_ROLES.iter().zip(convention.names.iter()) {
        let assigned = if expected.is_empty() {
            None
        } else {
            bone_names
                .iter()
                .find(|name| strip_namespace(name) == *expected)
                .cloned()
        };
        bones.insert((*role).to_string(), assigned);
    }
    Ok(Some(BoneAssignment {
        convention: convention.label,
        bones,
    }))
}

/// Result of a blendshape auto-assignment.
#[derive(Debug, Clone)]
pub enum ShapeKeyAssignment {
    /// Mesh gone, not a mesh, or without shape keys: clear the face
    /// mapping and any eye rigs.
    Clear,
    /// Shape keys exist but none match a known convention; leave the
    /// mapping untouched.
    Unmatched,
    /// Matched a convention; roles filled positionally.
    Assigned {
        convention: &'static str,
        blendshapes: IndexMap<String, Option<String>>,
    },
}

/// Matches the mesh's shape keys against the known blendshape conventions.
pub fn auto_assign_blendshapes(scene: &dyn Scene, mesh_name: &str) -> ShapeKeyAssignment {
    let shape_keys = match scene.shape_keys(mesh_name) {
        Ok(Some(keys)) if !keys.is_empty() => keys,
        // A dangling or keyless mesh resets the face setup entirely.
        _ => return ShapeKeyAssignment::Clear,
    };
    let shape_key_names: Vec<String> = shape_keys.into_iter().map(|key| key.name).collect();

    let Some(convention) = SHAPE_KEY_CONVENTIONS.iter().find(|convention| {
        shape_key_names
            .iter()
            .any(|name| convention.names.contains(&name.as_str()))
    }) else {
        return ShapeKeyAssignment::Unmatched;
    };

    let mut blendshapes = IndexMap::with_capacity(BLENDSHAPE_ROLES.len());
    for (role, expected) in BLENDSHAPE_ROLES.iter().zip(convention.names.iter()) {
        let assigned = shape_key_names
            .iter()
            .find(|name| name.as_str() == *expected)
            .cloned();
        blendshapes.insert((*role).to_string(), assigned);
    }
    ShapeKeyAssignment::Assigned {
        convention: convention.label,
        blendshapes,
    }
}

/// Returns bone names assigned to more than one role, each reported once.
/// Unassigned roles are ignored.
pub fn check_duplicate_assigned_bones(
    bone_names: &IndexMap<String, Option<String>>,
) -> Vec<String> {
    let mut seen: Vec<&str> = Vec::new();
    let mut duplicates: Vec<String> = Vec::new();

    for value in bone_names.values().flatten() {
        if seen.contains(&value.as_str()) {
            if !duplicates.contains(value) {
                duplicates.push(value.clone());
            }
        } else {
            seen.push(value.as_str());
        }
    }
    duplicates
}

/// Returns eye-rig bones that are also assigned as body pose bones.
pub fn check_eye_bone_conflicts(
    bone_names: &IndexMap<String, Option<String>>,
    eyes_rig: &[EyeRig],
) -> Vec<String> {
    eyes_rig
        .iter()
        .filter(|rig| {
            bone_names
                .values()
                .any(|value| value.as_deref() == Some(rig.bone_name.as_str()))
        })
        .map(|rig| rig.bone_name.clone())
        .collect()
}
