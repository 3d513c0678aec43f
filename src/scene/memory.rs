//! In-memory [`Scene`] implementation.
//!
//! Backs the test suite and any host-free embedding. State is plain owned
//! data; mutations follow the same semantics the host adapter promises
//! (applying a modifier consumes it, renaming is kind-scoped, persisting
//! bumps a save counter instead of touching disk).

use camino::Utf8PathBuf;

use super::{
    ArmatureState, CollectionInfo, DataBlockKind, ImageInfo, ImageSource, MeshDataInfo,
    ModifierInfo, ObjectInfo, ObjectKind, PosePosition, RotationMode, Scene, SceneError,
    SceneResult, ShaderInfo, ShapeKeyInfo,
};

/// One object held by a [`MemoryScene`].
#[derive(Debug, Clone)]
pub struct MemoryObject {
    pub name: String,
    pub kind: ObjectKind,
    pub visible: bool,
    pub hide_render: bool,
    pub armature: Option<ArmatureState>,
    pub modifiers: Vec<ModifierInfo>,
    pub poly_count: u64,
    pub curve_count: u64,
    pub shape_keys: Option<Vec<ShapeKeyInfo>>,
}

impl MemoryObject {
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            visible: true,
            hide_render: false,
            armature: None,
            modifiers: Vec::new(),
            poly_count: 0,
            curve_count: 0,
            shape_keys: None,
        }
    }

    pub fn with_armature(mut self, state: ArmatureState) -> Self {
        self.armature = Some(state);
        self
    }

    pub fn with_poly_count(mut self, count: u64) -> Self {
        self.poly_count = count;
        self
    }

    pub fn with_curve_count(mut self, count: u64) -> Self {
        self.curve_count = count;
        self
    }

    pub fn with_modifier(mut self, modifier: ModifierInfo) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn with_shape_keys(mut self, keys: Vec<ShapeKeyInfo>) -> Self {
        self.shape_keys = Some(keys);
        self
    }

    pub fn hidden_in_render(mut self) -> Self {
        self.hide_render = true;
        self
    }

    pub fn invisible(mut self) -> Self {
        self.visible = false;
        self
    }
}

/// Owned scene state implementing [`Scene`].
#[derive(Debug, Default)]
pub struct MemoryScene {
    objects: Vec<MemoryObject>,
    text_blocks: Vec<String>,
    armature_data_names: Vec<String>,
    material_names: Vec<String>,
    meshes: Vec<MeshDataInfo>,
    collections: Vec<CollectionInfo>,
    images: Vec<ImageInfo>,
    environment_images: Vec<String>,
    shaders: Vec<ShaderInfo>,
    /// `(object, modifier)` pairs whose apply the host would refuse.
    unappliable: Vec<(String, String)>,
    normalized: bool,
    save_count: u32,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, object: MemoryObject) -> &mut Self {
        if object.kind == ObjectKind::Armature && !self.armature_data_names.contains(&object.name) {
            self.armature_data_names.push(object.name.clone());
        }
        if object.kind == ObjectKind::Mesh && !self.meshes.iter().any(|m| m.name == object.name) {
            self.meshes.push(MeshDataInfo {
                name: object.name.clone(),
                auto_smooth: false,
            });
        }
        self.objects.push(object);
        self
    }

    pub fn add_text_block(&mut self, name: impl Into<String>) -> &mut Self {
        self.text_blocks.push(name.into());
        self
    }

    pub fn add_material(&mut self, name: impl Into<String>) -> &mut Self {
        self.material_names.push(name.into());
        self
    }

    pub fn add_collection(&mut self, name: impl Into<String>, hide_render: bool) -> &mut Self {
        self.collections.push(CollectionInfo {
            name: name.into(),
            hide_render,
        });
        self
    }

    pub fn add_image(&mut self, image: ImageInfo) -> &mut Self {
        self.images.push(image);
        self
    }

    pub fn add_environment_image(&mut self, name: impl Into<String>) -> &mut Self {
        self.environment_images.push(name.into());
        self
    }

    pub fn add_shader(&mut self, shader: ShaderInfo) -> &mut Self {
        self.shaders.push(shader);
        self
    }

    pub fn set_auto_smooth(&mut self, mesh_name: &str, enabled: bool) -> &mut Self {
        if let Some(mesh) = self.meshes.iter_mut().find(|m| m.name == mesh_name) {
            mesh.auto_smooth = enabled;
        }
        self
    }

    pub fn mark_unappliable(&mut self, object: &str, modifier: &str) -> &mut Self {
        self.unappliable
            .push((object.to_string(), modifier.to_string()));
        self
    }

    /// Convenience for image fixtures: a flat file image with one user.
    pub fn file_image(name: &str, filepath: impl Into<Utf8PathBuf>) -> ImageInfo {
        ImageInfo {
            name: name.to_string(),
            filepath: filepath.into(),
            users: 1,
            packed: false,
            source: ImageSource::File,
        }
    }

    /// Number of times the scene was persisted.
    pub fn save_count(&self) -> u32 {
        self.save_count
    }

    /// Whether [`Scene::normalize`] ran since construction.
    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    fn find(&self, name: &str) -> SceneResult<&MemoryObject> {
        self.objects
            .iter()
            .find(|o| o.name == name)
            .ok_or_else(|| SceneError::ObjectNotFound(name.to_string()))
    }

    fn find_mut(&mut self, name: &str) -> SceneResult<&mut MemoryObject> {
        self.objects
            .iter_mut()
            .find(|o| o.name == name)
            .ok_or_else(|| SceneError::ObjectNotFound(name.to_string()))
    }

    fn armature_mut(&mut self, name: &str) -> SceneResult<&mut ArmatureState> {
        let object = self.find_mut(name)?;
        object
            .armature
            .as_mut()
            .ok_or_else(|| SceneError::NotAnArmature(name.to_string()))
    }
}

impl Scene for MemoryScene {
    fn text_block_names(&self) -> Vec<String> {
        self.text_blocks.clone()
    }

    fn objects(&self) -> Vec<ObjectInfo> {
        self.objects
            .iter()
            .map(|o| ObjectInfo {
                name: o.name.clone(),
                kind: o.kind,
                visible: o.visible,
                hide_render: o.hide_render,
            })
            .collect()
    }

    fn object(&self, name: &str) -> Option<ObjectInfo> {
        self.objects.iter().find(|o| o.name == name).map(|o| ObjectInfo {
            name: o.name.clone(),
            kind: o.kind,
            visible: o.visible,
            hide_render: o.hide_render,
        })
    }

    fn armature(&self, object_name: &str) -> SceneResult<ArmatureState> {
        let object = self.find(object_name)?;
        object
            .armature
            .clone()
            .ok_or_else(|| SceneError::NotAnArmature(object_name.to_string()))
    }

    fn data_block_names(&self, kind: DataBlockKind) -> Vec<String> {
        match kind {
            DataBlockKind::Armature => self.armature_data_names.clone(),
            DataBlockKind::Material => self.material_names.clone(),
            DataBlockKind::Mesh => self.meshes.iter().map(|m| m.name.clone()).collect(),
            DataBlockKind::Object => self.objects.iter().map(|o| o.name.clone()).collect(),
        }
    }

    fn meshes(&self) -> Vec<MeshDataInfo> {
        self.meshes.clone()
    }

    fn modifiers(&self, object_name: &str) -> SceneResult<Vec<ModifierInfo>> {
        Ok(self.find(object_name)?.modifiers.clone())
    }

    fn evaluated_poly_count(&self, object_name: &str) -> SceneResult<u64> {
        let object = self.find(object_name)?;
        if object.kind != ObjectKind::Mesh {
            return Err(SceneError::NotAMesh(object_name.to_string()));
        }
        Ok(object.poly_count)
    }

    fn curve_strand_count(&self, object_name: &str) -> SceneResult<u64> {
        Ok(self.find(object_name)?.curve_count)
    }

    fn shape_keys(&self, object_name: &str) -> SceneResult<Option<Vec<ShapeKeyInfo>>> {
        let object = self.find(object_name)?;
        if object.kind != ObjectKind::Mesh {
            return Err(SceneError::NotAMesh(object_name.to_string()));
        }
        Ok(object.shape_keys.clone())
    }

    fn collections(&self) -> Vec<CollectionInfo> {
        self.collections.clone()
    }

    fn images(&self) -> Vec<ImageInfo> {
        self.images.clone()
    }

    fn environment_image_names(&self) -> Vec<String> {
        self.environment_images.clone()
    }

    fn shaders(&self) -> Vec<ShaderInfo> {
        self.shaders.clone()
    }

    fn normalize(&mut self) {
        self.normalized = true;
    }

    fn persist(&mut self) -> SceneResult<()> {
        self.save_count += 1;
        Ok(())
    }

    fn remove_text_blocks(&mut self) {
        self.text_blocks.clear();
    }

    fn set_pose_position(&mut self, armature: &str, pose: PosePosition) -> SceneResult<()> {
        self.armature_mut(armature)?.pose_position = pose;
        Ok(())
    }

    fn set_bone_relations(
        &mut self,
        armature: &str,
        bone: &str,
        use_connect: bool,
        use_local_location: bool,
    ) -> SceneResult<()> {
        let armature_name = armature.to_string();
        let state = self.armature_mut(armature)?;
        let bone_info = state
            .bones
            .iter_mut()
            .find(|b| b.name == bone)
            .ok_or_else(|| SceneError::BoneNotFound {
                armature: armature_name,
                bone: bone.to_string(),
            })?;
        bone_info.use_connect = use_connect;
        bone_info.use_local_location = use_local_location;
        Ok(())
    }

    fn set_all_rotation_modes(&mut self, armature: &str, mode: RotationMode) -> SceneResult<()> {
        for bone in &mut self.armature_mut(armature)?.bones {
            bone.rotation_mode = mode;
        }
        Ok(())
    }

    fn disable_auto_smooth(&mut self) {
        for mesh in &mut self.meshes {
            mesh.auto_smooth = false;
        }
    }

    fn rename_data_block(&mut self, kind: DataBlockKind, old: &str, new: &str) -> SceneResult<()> {
        let renamed = match kind {
            DataBlockKind::Armature => {
                rename_in(&mut self.armature_data_names, old, new)
            }
            DataBlockKind::Material => rename_in(&mut self.material_names, old, new),
            DataBlockKind::Mesh => {
                if let Some(mesh) = self.meshes.iter_mut().find(|m| m.name == old) {
                    mesh.name = new.to_string();
                    true
                } else {
                    false
                }
            }
            DataBlockKind::Object => {
                if let Some(object) = self.objects.iter_mut().find(|o| o.name == old) {
                    object.name = new.to_string();
                    true
                } else {
                    false
                }
            }
        };
        if renamed {
            Ok(())
        } else {
            Err(SceneError::DataBlockNotFound(old.to_string()))
        }
    }

    fn apply_modifier(&mut self, object: &str, modifier: &str) -> SceneResult<()> {
        if self
            .unappliable
            .iter()
            .any(|(o, m)| o == object && m == modifier)
        {
            return Err(SceneError::ModifierNotApplicable {
                object: object.to_string(),
                modifier: modifier.to_string(),
            });
        }
        self.remove_modifier(object, modifier)
    }

    fn remove_modifier(&mut self, object: &str, modifier: &str) -> SceneResult<()> {
        let target = self.find_mut(object)?;
        let before = target.modifiers.len();
        target.modifiers.retain(|m| m.name != modifier);
        if target.modifiers.len() == before {
            return Err(SceneError::ModifierNotFound {
                object: object.to_string(),
                modifier: modifier.to_string(),
            });
        }
        Ok(())
    }
}

fn rename_in(names: &mut [String], old: &str, new: &str) -> bool {
    if let Some(name) = names.iter_mut().find(|n| n.as_str() == old) {
        *name = new.to_string();
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::BoneInfo;

    fn one_bone_armature() -> ArmatureState {
        ArmatureState {
            pose_position: PosePosition::Rest,
            bones: vec![BoneInfo {
                name: "Hips".to_string(),
                parent: None,
                rotation_mode: RotationMode::Quaternion,
                use_connect: true,
                use_local_location: false,
            }],
        }
    }

    #[test]
    fn pose_position_mutation_round_trips() {
        let mut scene = MemoryScene::new();
        scene.add_object(
            MemoryObject::new("Rig_BODY", ObjectKind::Armature).with_armature(one_bone_armature()),
        );

        scene
            .set_pose_position("Rig_BODY", PosePosition::Pose)
            .unwrap();
        let state = scene.armature("Rig_BODY").unwrap();
        assert_eq!(state.pose_position, PosePosition::Pose);
    }

    #[test]
    fn missing_object_is_reported() {
        let scene = MemoryScene::new();
        assert_eq!(
            scene.armature("Ghost"),
            Err(SceneError::ObjectNotFound("Ghost".to_string()))
        );
    }

    #[test]
    fn apply_modifier_consumes_it() {
        let mut scene = MemoryScene::new();
        scene.add_object(MemoryObject::new("Groom", ObjectKind::Curves).with_modifier(
            ModifierInfo {
                name: "nodes".to_string(),
                kind: crate::scene::ModifierKind::GeometryNodes(crate::scene::GeometryNodesInfo {
                    node_types: vec!["CURVE_TO_MESH".to_string()],
                }),
            },
        ));

        scene.apply_modifier("Groom", "nodes").unwrap();
        assert!(scene.modifiers("Groom").unwrap().is_empty());
    }

    #[test]
    fn unappliable_modifier_errors() {
        let mut scene = MemoryScene::new();
        scene.add_object(MemoryObject::new("Groom", ObjectKind::Curves).with_modifier(
            ModifierInfo {
                name: "nodes".to_string(),
                kind: crate::scene::ModifierKind::Other("NODES".to_string()),
            },
        ));
        scene.mark_unappliable("Groom", "nodes");

        assert!(matches!(
            scene.apply_modifier("Groom", "nodes"),
            Err(SceneError::ModifierNotApplicable { .. })
        ));
        // Still present; the caller decides whether to remove instead.
        assert_eq!(scene.modifiers("Groom").unwrap().len(), 1);
    }

    #[test]
    fn rename_is_kind_scoped() {
        let mut scene = MemoryScene::new();
        scene.add_material("Skin.001");
        scene
            .rename_data_block(DataBlockKind::Material, "Skin.001", "Skin_001")
            .unwrap();
        assert_eq!(
            scene.data_block_names(DataBlockKind::Material),
            vec!["Skin_001".to_string()]
        );
    }
}
