//! Cleanup stage rules and the cleanup executor.
//!
//! Every rule in this stage diagnoses a remediable scene defect and has a
//! matching one-click mutation in [`cleanup_character`]. Mutations are
//! idempotent and independent of each other, so a partial cleanup always
//! leaves the scene structurally valid.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::CharacterMetadata;
use crate::scene::{
    DataBlockKind, ModifierInfo, ModifierKind, ObjectKind, PosePosition, RotationMode, Scene,
    SceneError, SceneResult,
};
use crate::services::rules::{Message, Rule, StageReport, assigned_armature, join_names};

pub const TEXT_FILES_KEY: &str = "text_files_check";
pub const ARMATURE_POSE_POSITION_KEY: &str = "armature_pose_position_check";
pub const HIPS_BONE_RELATIONS_KEY: &str = "hips_bone_relations_check";
pub const BONE_ROTATION_MODE_KEY: &str = "bone_rotation_mode_check";
pub const AUTO_SMOOTH_KEY: &str = "auto_smooth_check";
pub const OBJECT_NAMING_KEY: &str = "syntax_check";
pub const CURVES_GEO_NODES_KEY: &str = "curves_geo_nodes_check";

static DOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.").expect("Invalid dot regex"));

/// Stage aggregator running all cleanup diagnostics.
pub struct CleanupStage;

impl CleanupStage {
    pub fn run(metadata: &CharacterMetadata, scene: &dyn Scene) -> StageReport {
        let mut report = StageReport::new();
        report.record(&TextFilesRule { scene });
        report.record(&ArmaturePosePositionRule { metadata, scene });
        report.record(&HipsBoneRelationsRule { metadata, scene });
        report.record(&BoneRotationModeRule { metadata, scene });
        report.record(&AutoSmoothRule { scene });
        report.record(&ObjectNamingRule { scene });
        report.record(&CurvesGeoNodesRule { scene });
        report
    }
}

/// Embedded text blocks can carry scripts; they never ship with a
/// character.
struct TextFilesRule<'a> {
    scene: &'a dyn Scene,
}

impl Rule for TextFilesRule<'_> {
    type Fact = Vec<String>;

    fn key(&self) -> &'static str {
        TEXT_FILES_KEY
    }

    fn base_message(&self) -> String {
        "Text files detected!".to_string()
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        Ok(self.scene.text_block_names())
    }

    fn check(&self, text_block_names: Self::Fact, message: &mut Message) -> bool {
        if text_block_names.is_empty() {
            true
        } else {
            message.expand(format!(
                "The following text files will be removed: {}",
                join_names(&text_block_names)
            ));
            false
        }
    }
}

/// An armature stuck in rest position cannot be animated.
struct ArmaturePosePositionRule<'a> {
    metadata: &'a CharacterMetadata,
    scene: &'a dyn Scene,
}

impl Rule for ArmaturePosePositionRule<'_> {
    type Fact = PosePosition;

    fn key(&self) -> &'static str {
        ARMATURE_POSE_POSITION_KEY
    }

    fn base_message(&self) -> String {
        "Armature is not in Pose Position! Having the armature in Rest Position \
         will prevent character from being animated."
            .to_string()
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        let armature_name = assigned_armature(self.metadata)?;
        Ok(self.scene.armature(armature_name)?.pose_position)
    }

    fn check(&self, pose_position: Self::Fact, message: &mut Message) -> bool {
        if pose_position == PosePosition::Pose {
            true
        } else {
            message.expand("Armature will be set to Pose Position mode.");
            false
        }
    }
}

/// The hip bone must be disconnected from its parent with local location
/// enabled so the root can translate the character in place.
struct HipsBoneRelationsRule<'a> {
    metadata: &'a CharacterMetadata,
    scene: &'a dyn Scene,
}

impl Rule for HipsBoneRelationsRule<'_> {
    type Fact = (bool, bool);

    fn key(&self) -> &'static str {
        HIPS_BONE_RELATIONS_KEY
    }

    fn base_message(&self) -> String {
        "Wrong Hips bone relations settings! Hips bone must be disconnected from its \
         parent bone and local location turned on to allow for the translation of the character."
            .to_string()
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        let armature_name = assigned_armature(self.metadata)?;
        let hips_name =
            self.metadata
                .bone("Hips")
                .ok_or_else(|| SceneError::BoneNotFound {
                    armature: armature_name.to_string(),
                    bone: "Hips".to_string(),
                })?;
        let armature = self.scene.armature(armature_name)?;
        let hips = armature
            .bone(hips_name)
            .ok_or_else(|| SceneError::BoneNotFound {
                armature: armature_name.to_string(),
                bone: hips_name.to_string(),
            })?;
        Ok((hips.use_connect, hips.use_local_location))
    }

    fn check(&self, (use_connect, use_local_location): Self::Fact, message: &mut Message) -> bool {
        if use_connect || !use_local_location {
            message.expand(
                "Under Relations settings for the Hips bone, Connected option will be disabled \
                 and Local Location option enabled.",
            );
            false
        } else {
            true
        }
    }
}

/// Retargeting expects a consistent XYZ rotation order on every pose bone.
struct BoneRotationModeRule<'a> {
    metadata: &'a CharacterMetadata,
    scene: &'a dyn Scene,
}

impl Rule for BoneRotationModeRule<'_> {
    type Fact = Vec<RotationMode>;

    fn key(&self) -> &'static str {
        BONE_ROTATION_MODE_KEY
    }

    fn base_message(&self) -> String {
        "Wrong bone rotation mode! Rotation mode for all main pose armature bones must be XYZ."
            .to_string()
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        let armature_name = assigned_armature(self.metadata)?;
        let armature = self.scene.armature(armature_name)?;
        let mut modes = Vec::new();
        for bone in &armature.bones {
            if !modes.contains(&bone.rotation_mode) {
                modes.push(bone.rotation_mode);
            }
        }
        Ok(modes)
    }

    fn check(&self, modes: Self::Fact, message: &mut Message) -> bool {
        if modes.iter().any(|mode| *mode != RotationMode::Xyz) {
            message.expand("Bone rotation mode will be set to XYZ for all main pose armature bones.");
            false
        } else {
            true
        }
    }
}

/// Auto smooth can create artifacts during rendering.
struct AutoSmoothRule<'a> {
    scene: &'a dyn Scene,
}

impl Rule for AutoSmoothRule<'_> {
    type Fact = Vec<bool>;

    fn key(&self) -> &'static str {
        AUTO_SMOOTH_KEY
    }

    fn base_message(&self) -> String {
        "Auto Smooth is enabled on some mesh objects! In some cases, \
         Auto Smooth can create artifacts during rendering."
            .to_string()
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        Ok(self.scene.meshes().iter().map(|m| m.auto_smooth).collect())
    }

    fn check(&self, auto_smooth_values: Self::Fact, message: &mut Message) -> bool {
        if auto_smooth_values.iter().any(|enabled| *enabled) {
            message.expand("Auto Smooth will be disabled on all Mesh objects.");
            false
        } else {
            true
        }
    }
}

/// A `.` in a name collides with the host tool's automatic duplicate
/// suffixing on reimport.
struct ObjectNamingRule<'a> {
    scene: &'a dyn Scene,
}

impl Rule for ObjectNamingRule<'_> {
    type Fact = Vec<String>;

    fn key(&self) -> &'static str {
        OBJECT_NAMING_KEY
    }

    fn base_message(&self) -> String {
        "Detected objects with . in their name!".to_string()
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        let mut all_names = Vec::new();
        for kind in RENAMED_KINDS {
            all_names.extend(self.scene.data_block_names(kind));
        }
        Ok(all_names)
    }

    fn check(&self, all_names: Self::Fact, message: &mut Message) -> bool {
        if all_names.iter().any(|name| name.contains('.')) {
            message.expand(
                "All armature, material, mesh, and object names will be changed to include _ \
                 instead of . symbol.",
            );
            false
        } else {
            true
        }
    }
}

/// Curves objects must not carry unresolved geometry-node modifiers; only
/// the surface-deform binding may stay live.
struct CurvesGeoNodesRule<'a> {
    scene: &'a dyn Scene,
}

impl Rule for CurvesGeoNodesRule<'_> {
    type Fact = Vec<(String, Vec<ModifierInfo>)>;

    fn key(&self) -> &'static str {
        CURVES_GEO_NODES_KEY
    }

    fn base_message(&self) -> String {
        "Detected curves objects with geometry nodes! All geometry nodes will be applied."
            .to_string()
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        let mut curves = Vec::new();
        for object in self.scene.objects() {
            if object.kind == ObjectKind::Curves && object.visible {
                let modifiers = self.scene.modifiers(&object.name)?;
                curves.push((object.name, modifiers));
            }
        }
        Ok(curves)
    }

    fn check(&self, curves: Self::Fact, _message: &mut Message) -> bool {
        !curves
            .iter()
            .any(|(_, modifiers)| modifiers.iter().any(is_appliable_geo_nodes))
    }
}

fn is_appliable_geo_nodes(modifier: &ModifierInfo) -> bool {
    match &modifier.kind {
        ModifierKind::GeometryNodes(info) => !info.is_deform_only(),
        _ => false,
    }
}

const RENAMED_KINDS: [DataBlockKind; 4] = [
    DataBlockKind::Armature,
    DataBlockKind::Material,
    DataBlockKind::Mesh,
    DataBlockKind::Object,
];

/// Applies the remediation for every failing cleanup rule in `report`.
///
/// Each mutation is self-contained; keys absent from the report are
/// skipped. Callers re-run validation afterwards to confirm the scene is
/// clean.
pub fn cleanup_character(
    metadata: &CharacterMetadata,
    report: &StageReport,
    scene: &mut dyn Scene,
) -> SceneResult<()> {
    scene.normalize();

    if report.is_failing(TEXT_FILES_KEY) {
        tracing::info!("Cleanup: removing embedded text blocks");
        scene.remove_text_blocks();
    }
    if report.is_failing(ARMATURE_POSE_POSITION_KEY) {
        let armature = assigned_armature(metadata)?;
        tracing::info!("Cleanup: forcing {armature} into pose position");
        scene.set_pose_position(armature, PosePosition::Pose)?;
    }
    if report.is_failing(HIPS_BONE_RELATIONS_KEY) {
        let armature = assigned_armature(metadata)?;
        let hips = metadata
            .bone("Hips")
            .ok_or_else(|| SceneError::BoneNotFound {
                armature: armature.to_string(),
                bone: "Hips".to_string(),
            })?;
        tracing::info!("Cleanup: disconnecting {hips} and enabling local location");
        scene.set_bone_relations(armature, hips, false, true)?;
    }
    if report.is_failing(BONE_ROTATION_MODE_KEY) {
        let armature = assigned_armature(metadata)?;
        tracing::info!("Cleanup: forcing XYZ rotation mode on all bones of {armature}");
        scene.set_all_rotation_modes(armature, RotationMode::Xyz)?;
    }
    if report.is_failing(AUTO_SMOOTH_KEY) {
        tracing::info!("Cleanup: disabling auto smooth on all meshes");
        scene.disable_auto_smooth();
    }
    if report.is_failing(OBJECT_NAMING_KEY) {
        tracing::info!("Cleanup: renaming dotted data block names");
        rename_dotted_data_blocks(scene)?;
    }
    if report.is_failing(CURVES_GEO_NODES_KEY) {
        tracing::info!("Cleanup: applying geometry node modifiers on curves objects");
        resolve_curves_geo_nodes(scene)?;
    }

    scene.persist()
}

/// Replaces `.` with `_` in armature, material, mesh, and object names.
/// A rename that collides with an existing name of the same kind gets a
/// `_N` suffix instead.
fn rename_dotted_data_blocks(scene: &mut dyn Scene) -> SceneResult<()> {
    for kind in RENAMED_KINDS {
        let dotted: Vec<String> = scene
            .data_block_names(kind)
            .into_iter()
            .filter(|name| name.contains('.'))
            .collect();
        for old_name in dotted {
            let taken = scene.data_block_names(kind);
            let base_name = DOT_RE.replace_all(&old_name, "_").into_owned();
            let mut new_name = base_name.clone();
            let mut count = 0;
            while taken.contains(&new_name) {
                count += 1;
                new_name = format!("{base_name}_{count}");
            }
            scene.rename_data_block(kind, &old_name, &new_name)?;
        }
    }
    Ok(())
}

/// Applies every non-deform geometry-node modifier on visible curves
/// objects; a modifier the host refuses to apply is removed instead.
fn resolve_curves_geo_nodes(scene: &mut dyn Scene) -> SceneResult<()> {
    let curves: Vec<String> = scene
        .objects()
        .into_iter()
        .filter(|object| object.kind == ObjectKind::Curves && object.visible)
        .map(|object| object.name)
        .collect();

    for object_name in curves {
        let modifiers = scene.modifiers(&object_name)?;
        for modifier in modifiers.iter().filter(|m| is_appliable_geo_nodes(m)) {
            match scene.apply_modifier(&object_name, &modifier.name) {
                Ok(()) => {}
                Err(SceneError::ModifierNotApplicable { .. }) => {
                    tracing::warn!(
                        "Modifier {} on {object_name} could not be applied, removing it",
                        modifier.name
                    );
                    scene.remove_modifier(&object_name, &modifier.name)?;
                }
                Err(err) => return Err(err),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CharacterMetadata;
    use crate::scene::{ArmatureState, BoneInfo, GeometryNodesInfo, MemoryObject, MemoryScene};

    fn test_metadata() -> CharacterMetadata {
        let mut metadata = CharacterMetadata {
            version: "1.2.3".to_string(),
            ..CharacterMetadata::default()
        };
        metadata.body.armature_name = Some("Rig_BODY".to_string());
        metadata
            .body
            .bone_names
            .insert("Hips".to_string(), Some("Hips".to_string()));
        metadata
    }

    fn clean_armature() -> ArmatureState {
        ArmatureState {
            pose_position: PosePosition::Pose,
            bones: vec![BoneInfo {
                name: "Hips".to_string(),
                parent: None,
                rotation_mode: RotationMode::Xyz,
                use_connect: false,
                use_local_location: true,
            }],
        }
    }

    fn scene_with_armature(state: ArmatureState) -> MemoryScene {
        let mut scene = MemoryScene::new();
        scene.add_object(
            MemoryObject::new("Rig_BODY", ObjectKind::Armature).with_armature(state),
        );
        scene
    }

    #[test]
    fn clean_scene_passes_all_rules() {
        let scene = scene_with_armature(clean_armature());
        let report = CleanupStage::run(&test_metadata(), &scene);
        assert!(report.passed(), "failing: {:?}", report.failing_keys());
        assert_eq!(report.len(), 7);
    }

    #[test]
    fn rest_position_fails_and_cleanup_fixes_it() {
        let mut armature = clean_armature();
        armature.pose_position = PosePosition::Rest;
        let mut scene = scene_with_armature(armature);
        let metadata = test_metadata();

        let report = CleanupStage::run(&metadata, &scene);
        assert!(report.is_failing(ARMATURE_POSE_POSITION_KEY));

        cleanup_character(&metadata, &report, &mut scene).unwrap();
        let rerun = CleanupStage::run(&metadata, &scene);
        assert!(rerun.passed(), "failing: {:?}", rerun.failing_keys());
        assert_eq!(scene.save_count(), 1);
    }

    #[test]
    fn text_blocks_are_listed_and_removed() {
        let mut scene = scene_with_armature(clean_armature());
        scene.add_text_block("startup.py");
        let metadata = test_metadata();

        let report = CleanupStage::run(&metadata, &scene);
        let entry = report.get(TEXT_FILES_KEY).unwrap();
        assert!(!entry.check);
        assert!(entry.message.contains("startup.py"));

        cleanup_character(&metadata, &report, &mut scene).unwrap();
        assert!(scene.text_block_names().is_empty());
    }

    #[test]
    fn connected_hips_fails_and_cleanup_disconnects() {
        let mut armature = clean_armature();
        armature.bones[0].use_connect = true;
        armature.bones[0].use_local_location = false;
        let mut scene = scene_with_armature(armature);
        let metadata = test_metadata();

        let report = CleanupStage::run(&metadata, &scene);
        assert!(report.is_failing(HIPS_BONE_RELATIONS_KEY));

        cleanup_character(&metadata, &report, &mut scene).unwrap();
        let hips = scene.armature("Rig_BODY").unwrap();
        let bone = hips.bone("Hips").unwrap();
        assert!(!bone.use_connect);
        assert!(bone.use_local_location);
    }

    #[test]
    fn non_xyz_rotation_mode_fails() {
        let mut armature = clean_armature();
        armature.bones[0].rotation_mode = RotationMode::Quaternion;
        let scene = scene_with_armature(armature);

        let report = CleanupStage::run(&test_metadata(), &scene);
        assert!(report.is_failing(BONE_ROTATION_MODE_KEY));
    }

    #[test]
    fn dotted_names_are_renamed_collision_safe() {
        let mut scene = scene_with_armature(clean_armature());
        scene.add_material("Skin.001");
        scene.add_material("Skin_001");
        let metadata = test_metadata();

        let report = CleanupStage::run(&metadata, &scene);
        assert!(report.is_failing(OBJECT_NAMING_KEY));

        cleanup_character(&metadata, &report, &mut scene).unwrap();
        let materials = scene.data_block_names(DataBlockKind::Material);
        assert!(materials.contains(&"Skin_001".to_string()));
        assert!(materials.contains(&"Skin_001_1".to_string()));
        assert!(materials.iter().all(|name| !name.contains('.')));
    }

    #[test]
    fn deform_only_geo_nodes_modifier_is_allowed() {
        let mut scene = scene_with_armature(clean_armature());
        scene.add_object(
            MemoryObject::new("Groom", ObjectKind::Curves).with_modifier(ModifierInfo {
                name: "surface_deform".to_string(),
                kind: ModifierKind::GeometryNodes(GeometryNodesInfo {
                    node_types: vec!["DEFORM_CURVES_ON_SURFACE".to_string()],
                }),
            }),
        );

        let report = CleanupStage::run(&test_metadata(), &scene);
        assert!(!report.is_failing(CURVES_GEO_NODES_KEY));
    }

    #[test]
    fn live_geo_nodes_modifier_fails_and_is_applied_or_removed() {
        let mut scene = scene_with_armature(clean_armature());
        scene.add_object(
            MemoryObject::new("Groom", ObjectKind::Curves)
                .with_modifier(ModifierInfo {
                    name: "generate".to_string(),
                    kind: ModifierKind::GeometryNodes(GeometryNodesInfo {
                        node_types: vec!["CURVE_TO_MESH".to_string()],
                    }),
                })
                .with_modifier(ModifierInfo {
                    name: "stubborn".to_string(),
                    kind: ModifierKind::GeometryNodes(GeometryNodesInfo {
                        node_types: vec!["SET_POSITION".to_string()],
                    }),
                }),
        );
        scene.mark_unappliable("Groom", "stubborn");
        let metadata = test_metadata();

        let report = CleanupStage::run(&metadata, &scene);
        assert!(report.is_failing(CURVES_GEO_NODES_KEY));

        cleanup_character(&metadata, &report, &mut scene).unwrap();
        assert!(scene.modifiers("Groom").unwrap().is_empty());
    }

    #[test]
    fn executor_skips_keys_absent_from_report() {
        let mut scene = scene_with_armature(clean_armature());
        scene.add_text_block("startup.py");
        let metadata = test_metadata();

        // Empty report: nothing to fix, text block must survive.
        cleanup_character(&metadata, &StageReport::new(), &mut scene).unwrap();
        assert_eq!(scene.text_block_names().len(), 1);
    }
}
