//! Warning stage rules.
//!
//! Soft diagnostics: a character failing these still uploads, but with
//! degraded animation quality or missing features. Runs only after the
//! Requirement stage passed.

use crate::models::conventions::{GAZE_BLENDSHAPES, IK_CHAIN_PAIRS};
use crate::models::CharacterMetadata;
use crate::scene::{ArmatureState, ModifierKind, ObjectKind, Scene, SceneResult};
use crate::services::rules::{
    Message, Rule, StageReport, assigned_armature, assigned_face_mesh, join_names,
};

pub const MISSING_BONES_KEY: &str = "missing_bones_check";
pub const MISSING_IK_CHAINS_KEY: &str = "missing_ik_chains_check";
pub const DISABLED_IN_RENDERS_KEY: &str = "disabled_in_renders_check";
pub const MISSING_BLENDSHAPES_KEY: &str = "missing_blendshapes_check";
pub const MISSING_EYE_CONTROLS_KEY: &str = "missing_eye_controls_check";
pub const MUTED_BLENDSHAPES_KEY: &str = "muted_blendshapes_check";
pub const SHADER_NODES_KEY: &str = "shader_nodes_check";
pub const MESH_MODIFIERS_KEY: &str = "mesh_modifiers_check";

/// Shader node types that survive USD export unchanged.
pub const USD_SHADER_NODE_WHITELIST: [&str; 8] = [
    "OUTPUT_MATERIAL",
    "BSDF_PRINCIPLED",
    "TEX_IMAGE",
    "NORMAL_MAP",
    "UVMAP",
    "MAPPING",
    "TEX_COORD",
    "DISPLACEMENT",
];

/// Stage aggregator for the soft warnings. Face rules are gated on the
/// declared face mesh; the shader and modifier rules on the USD toggle.
pub struct WarningStage;

impl WarningStage {
    pub fn run(metadata: &CharacterMetadata, scene: &dyn Scene, usd_enabled: bool) -> StageReport {
        let mut report = StageReport::new();
        report.record(&MissingBonesRule { metadata });
        report.record(&MissingIkChainsRule { metadata, scene });
        report.record(&DisabledInRendersRule { scene });

        if metadata.face.mesh_name.is_some() {
            report.record(&MissingBlendshapesRule { metadata });
            report.record(&MissingEyeControlsRule { metadata });
            report.record(&MutedBlendshapesRule { metadata, scene });
        }

        if usd_enabled {
            report.record(&ShaderNodesRule { scene });
            report.record(&MeshModifiersRule { scene });
        }

        report
    }
}

struct MissingBonesRule<'a> {
    metadata: &'a CharacterMetadata,
}

impl Rule for MissingBonesRule<'_> {
    type Fact = Vec<String>;

    fn key(&self) -> &'static str {
        MISSING_BONES_KEY
    }

    fn base_message(&self) -> String {
        "Pose bones missing! Missing bones may negatively impact animation quality. \
         Please make sure missing bones are left out intentionally."
            .to_string()
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        Ok(self
            .metadata
            .body
            .bone_names
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(role, _)| role.clone())
            .collect())
    }

    fn check(&self, missing_bones: Self::Fact, message: &mut Message) -> bool {
        if missing_bones.is_empty() {
            true
        } else {
            message.expand(format!("Missing bones: {}", join_names(&missing_bones)));
            false
        }
    }
}

/// Returns whether the hierarchy can be walked from the target bone up its
/// parent chain to the root bone.
pub fn check_ik_chain(armature: &ArmatureState, root_bone: &str, target_bone: &str) -> bool {
    if armature.bone(root_bone).is_none() {
        return false;
    }
    let mut current = match armature.bone(target_bone) {
        Some(bone) => bone,
        None => return false,
    };
    // Parent chains are finite; the step bound guards malformed input.
    for _ in 0..armature.bones.len() {
        let Some(parent_name) = current.parent.as_deref() else {
            return false;
        };
        if parent_name == root_bone {
            return true;
        }
        current = match armature.bone(parent_name) {
            Some(bone) => bone,
            None => return false,
        };
    }
    false
}

struct MissingIkChainsRule<'a> {
    metadata: &'a CharacterMetadata,
    scene: &'a dyn Scene,
}

impl Rule for MissingIkChainsRule<'_> {
    type Fact = Vec<String>;

    fn key(&self) -> &'static str {
        MISSING_IK_CHAINS_KEY
    }

    fn base_message(&self) -> String {
        "Unable to establish all IK bone chains! IK features may not be applied for \
         some limbs."
            .to_string()
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        let armature_name = assigned_armature(self.metadata)?;
        let armature = self.scene.armature(armature_name)?;

        let mut missing_ik_pairs = Vec::new();
        for (root_role, target_role) in IK_CHAIN_PAIRS {
            let pair_label = format!("{root_role} <- {target_role}");
            match (self.metadata.bone(root_role), self.metadata.bone(target_role)) {
                (Some(root_bone), Some(target_bone)) => {
                    if !check_ik_chain(&armature, root_bone, target_bone) {
                        missing_ik_pairs.push(pair_label);
                    }
                }
                _ => missing_ik_pairs.push(pair_label),
            }
        }
        Ok(missing_ik_pairs)
    }

    fn check(&self, missing_ik_pairs: Self::Fact, message: &mut Message) -> bool {
        if missing_ik_pairs.is_empty() {
            true
        } else {
            message.expand(format!(
                "Missing IK chains: {}",
                join_names(&missing_ik_pairs)
            ));
            false
        }
    }
}

struct DisabledInRendersRule<'a> {
    scene: &'a dyn Scene,
}

impl Rule for DisabledInRendersRule<'_> {
    type Fact = (Vec<String>, Vec<String>);

    fn key(&self) -> &'static str {
        DISABLED_IN_RENDERS_KEY
    }

    fn base_message(&self) -> String {
        "Disabled objects in the render! Objects or collections are disabled in the renderer! \
         This may result in parts of your character not being rendered."
            .to_string()
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        let collections = self
            .scene
            .collections()
            .into_iter()
            .filter(|c| c.hide_render)
            .map(|c| c.name)
            .collect();
        let objects = self
            .scene
            .objects()
            .into_iter()
            .filter(|o| o.hide_render && o.visible)
            .map(|o| o.name)
            .collect();
        Ok((collections, objects))
    }

    fn check(&self, (collections, objects): Self::Fact, message: &mut Message) -> bool {
        if collections.is_empty() && objects.is_empty() {
            return true;
        }
        if !collections.is_empty() {
            message.expand(format!("Disabled Collections: {}", join_names(&collections)));
        }
        if !objects.is_empty() {
            message.expand(format!("Disabled Objects: {}", join_names(&objects)));
        }
        false
    }
}

struct MissingBlendshapesRule<'a> {
    metadata: &'a CharacterMetadata,
}

impl Rule for MissingBlendshapesRule<'_> {
    type Fact = Vec<String>;

    fn key(&self) -> &'static str {
        MISSING_BLENDSHAPES_KEY
    }

    fn base_message(&self) -> String {
        "Face blendshapes missing! Missing blendshapes may negatively impact facial animation \
         quality. Please make sure missing blendshapes are left out intentionally."
            .to_string()
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        Ok(self
            .metadata
            .face
            .blendshape_names
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(role, _)| role.clone())
            .collect())
    }

    fn check(&self, missing_blendshapes: Self::Fact, message: &mut Message) -> bool {
        if missing_blendshapes.is_empty() {
            true
        } else {
            message.expand(format!(
                "Missing blendshapes: {}",
                join_names(&missing_blendshapes)
            ));
            false
        }
    }
}

/// Eye bones without gaze blendshapes cannot be driven by the facial
/// performance.
struct MissingEyeControlsRule<'a> {
    metadata: &'a CharacterMetadata,
}

impl Rule for MissingEyeControlsRule<'_> {
    type Fact = Vec<String>;

    fn key(&self) -> &'static str {
        MISSING_EYE_CONTROLS_KEY
    }

    fn base_message(&self) -> String {
        "Eye control blendshapes missing! Missing face blendshapes for eye control, but eye \
         bones are assigned! As a result, the gaze may not function correctly."
            .to_string()
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        Ok(GAZE_BLENDSHAPES
            .iter()
            .filter(|role| self.metadata.blendshape(role).is_none())
            .map(|role| role.to_string())
            .collect())
    }

    fn check(&self, missing_gaze_blendshapes: Self::Fact, message: &mut Message) -> bool {
        if missing_gaze_blendshapes.is_empty() || self.metadata.eyes_rig.is_empty() {
            true
        } else {
            message.expand(format!(
                "Missing gaze blendshapes: {}",
                join_names(&missing_gaze_blendshapes)
            ));
            false
        }
    }
}

struct MutedBlendshapesRule<'a> {
    metadata: &'a CharacterMetadata,
    scene: &'a dyn Scene,
}

impl Rule for MutedBlendshapesRule<'_> {
    type Fact = Vec<String>;

    fn key(&self) -> &'static str {
        MUTED_BLENDSHAPES_KEY
    }

    fn base_message(&self) -> String {
        "Muted blendshapes detected! Muted blendshapes will receive animation data but will \
         not display the animation."
            .to_string()
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        let mesh_name = assigned_face_mesh(self.metadata)?;
        let Some(shape_keys) = self.scene.shape_keys(mesh_name)? else {
            return Ok(Vec::new());
        };

        let mut muted_blendshapes = Vec::new();
        for (role, value) in &self.metadata.face.blendshape_names {
            let Some(shape_key_name) = value else {
                continue;
            };
            if shape_keys
                .iter()
                .any(|key| &key.name == shape_key_name && key.mute)
            {
                muted_blendshapes.push(role.clone());
            }
        }
        Ok(muted_blendshapes)
    }

    fn check(&self, muted_blendshapes: Self::Fact, message: &mut Message) -> bool {
        if muted_blendshapes.is_empty() {
            true
        } else {
            message.expand(format!(
                "Muted blendshapes: {}",
                join_names(&muted_blendshapes)
            ));
            false
        }
    }
}

/// Shader graphs outside the USD-safe node set do not translate on export.
struct ShaderNodesRule<'a> {
    scene: &'a dyn Scene,
}

impl Rule for ShaderNodesRule<'_> {
    type Fact = (Vec<String>, Vec<String>);

    fn key(&self) -> &'static str {
        SHADER_NODES_KEY
    }

    fn base_message(&self) -> String {
        "Unsupported shader setup for USD export! Materials using unsupported shader nodes \
         or translucency will not translate correctly."
            .to_string()
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        let mut unsupported_materials = Vec::new();
        let mut translucent_materials = Vec::new();
        for shader in self.scene.shaders() {
            let offending: Vec<String> = shader
                .node_types
                .iter()
                .filter(|node_type| !USD_SHADER_NODE_WHITELIST.contains(&node_type.as_str()))
                .cloned()
                .collect();
            if !offending.is_empty() {
                unsupported_materials
                    .push(format!("{} ({})", shader.material_name, join_names(&offending)));
            }
            if shader.translucency != 0.0 {
                translucent_materials.push(shader.material_name.clone());
            }
        }
        Ok((unsupported_materials, translucent_materials))
    }

    fn check(
        &self,
        (unsupported_materials, translucent_materials): Self::Fact,
        message: &mut Message,
    ) -> bool {
        if unsupported_materials.is_empty() && translucent_materials.is_empty() {
            return true;
        }
        if !unsupported_materials.is_empty() {
            message.expand(format!(
                "Materials with unsupported nodes: {}",
                join_names(&unsupported_materials)
            ));
        }
        if !translucent_materials.is_empty() {
            message.expand(format!(
                "Materials with translucency: {}",
                join_names(&translucent_materials)
            ));
        }
        false
    }
}

/// USD export bakes nothing: every modifier except the armature binding
/// should be applied beforehand.
struct MeshModifiersRule<'a> {
    scene: &'a dyn Scene,
}

impl Rule for MeshModifiersRule<'_> {
    type Fact = Vec<String>;

    fn key(&self) -> &'static str {
        MESH_MODIFIERS_KEY
    }

    fn base_message(&self) -> String {
        "Mesh modifiers detected! With USD support enabled, modifiers other than Armature \
         should be applied before upload."
            .to_string()
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        let mut flagged = Vec::new();
        for object in self.scene.objects() {
            if object.kind != ObjectKind::Mesh {
                continue;
            }
            for modifier in self.scene.modifiers(&object.name)? {
                if !matches!(modifier.kind, ModifierKind::Armature) {
                    flagged.push(format!("{} ({})", object.name, modifier.name));
                }
            }
        }
        Ok(flagged)
    }

    fn check(&self, flagged: Self::Fact, message: &mut Message) -> bool {
        if flagged.is_empty() {
            true
        } else {
            message.expand(format!(
                "Objects with modifiers: {}",
                join_names(&flagged)
            ));
            false
        }
    }
}
