//! Requirement stage rules.
//!
//! These are the hard conditions for upload: a character failing any of
//! them cannot be processed by the animation service, and no cleanup can
//! fix it automatically. Runs only after the Cleanup stage passed.

use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;

use crate::models::CharacterMetadata;
use crate::scene::{ModifierKind, ObjectKind, Scene, SceneResult};
use crate::services::rules::{
    Message, Rule, StageReport, assigned_armature, assigned_face_mesh, join_names,
};

pub const ARMATURE_NAME_KEY: &str = "armature_name_check";
pub const ONE_BODY_ARMATURE_KEY: &str = "one_body_armature_check";
pub const HIPS_BONE_KEY: &str = "hips_bone_check";
pub const POLY_COUNT_KEY: &str = "poly_count_check";
pub const PARTICLE_COUNT_KEY: &str = "particle_count_check";
pub const TEXTURE_FILES_KEY: &str = "texture_files_check";
pub const FACE_NAME_KEY: &str = "face_name_check";
pub const BLENDSHAPES_KEY: &str = "blendshapes_check";
pub const ONE_FACE_MESH_KEY: &str = "one_face_mesh_check";

/// Suffix the main pose armature must carry.
pub const ARMATURE_TAG: &str = "BODY";

/// Suffix the main face mesh must carry.
pub const FACE_TAG: &str = "FACE";

/// Upper bound on summed polygons over visible evaluated meshes.
pub const POLY_COUNT_LIMIT: u64 = 1_500_000;

/// Upper bound on summed hair strands (particles and curves).
pub const HAIR_STRAND_LIMIT: u64 = 100_000;

/// Texture file formats the service accepts.
pub const ALLOWED_TEXTURE_FORMATS: [&str; 6] = ["jpg", "jpeg", "png", "tif", "tiff", "exr"];

/// Image names the host tool creates for its own use; never shipped.
pub const IGNORED_IMAGE_NAMES: [&str; 2] = ["Render Result", "Viewer Node"];

static UDIM_TILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(\d{4})_").expect("Invalid UDIM tile regex"));

/// Stage aggregator running all hard requirements. The face rules run only
/// when a face mesh is declared in metadata.
pub struct RequirementStage;

impl RequirementStage {
    pub fn run(
        metadata: &CharacterMetadata,
        scene: &dyn Scene,
        textures_dir: &Utf8Path,
    ) -> StageReport {
        let mut report = StageReport::new();
        report.record(&MainArmatureNameRule { metadata });
        report.record(&OneBodyArmatureRule { scene });
        report.record(&HipsBoneRule { metadata });
        report.record(&PolyCountRule { scene });
        report.record(&HairStrandCountRule { scene });
        report.record(&TextureFilesRule {
            scene,
            textures_dir,
        });

        if metadata.face.mesh_name.is_some() {
            report.record(&MainFaceMeshNameRule { metadata });
            report.record(&BlendshapesRule { metadata, scene });
            report.record(&OneFaceMeshRule { scene });
        }

        report
    }
}

struct MainArmatureNameRule<'a> {
    metadata: &'a CharacterMetadata,
}

impl Rule for MainArmatureNameRule<'_> {
    type Fact = String;

    fn key(&self) -> &'static str {
        ARMATURE_NAME_KEY
    }

    fn base_message(&self) -> String {
        format!(
            "Wrong skeleton/armature name! The main skeleton/armature name does not end with \
             the tag \"{ARMATURE_TAG}\"!"
        )
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        Ok(assigned_armature(self.metadata)?.to_string())
    }

    fn check(&self, armature_name: Self::Fact, _message: &mut Message) -> bool {
        armature_name.ends_with(ARMATURE_TAG)
    }
}

struct OneBodyArmatureRule<'a> {
    scene: &'a dyn Scene,
}

impl Rule for OneBodyArmatureRule<'_> {
    type Fact = Vec<String>;

    fn key(&self) -> &'static str {
        ONE_BODY_ARMATURE_KEY
    }

    fn base_message(&self) -> String {
        format!(
            "Multiple main skeleton/armature! More than one skeleton/armature with the tag \
             \"{ARMATURE_TAG}\" detected!"
        )
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        Ok(self
            .scene
            .objects()
            .into_iter()
            .filter(|o| o.kind == ObjectKind::Armature && o.name.ends_with(ARMATURE_TAG))
            .map(|o| o.name)
            .collect())
    }

    fn check(&self, armature_names: Self::Fact, _message: &mut Message) -> bool {
        armature_names.len() <= 1
    }
}

struct HipsBoneRule<'a> {
    metadata: &'a CharacterMetadata,
}

impl Rule for HipsBoneRule<'_> {
    type Fact = Option<String>;

    fn key(&self) -> &'static str {
        HIPS_BONE_KEY
    }

    fn base_message(&self) -> String {
        "Hips bone not found!".to_string()
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        Ok(self.metadata.bone("Hips").map(str::to_string))
    }

    fn check(&self, hips_bone: Self::Fact, _message: &mut Message) -> bool {
        hips_bone.is_some_and(|name| !name.is_empty())
    }
}

struct PolyCountRule<'a> {
    scene: &'a dyn Scene,
}

impl Rule for PolyCountRule<'_> {
    type Fact = u64;

    fn key(&self) -> &'static str {
        POLY_COUNT_KEY
    }

    fn base_message(&self) -> String {
        format!(
            "Poly count limit exceeded! Poly count exceeds the allowed amount of \
             {POLY_COUNT_LIMIT} polygons per character! Note that subdivision counts towards \
             your poly count."
        )
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        let mut poly_count_sum = 0;
        for object in self.scene.objects() {
            if object.kind == ObjectKind::Mesh && object.visible {
                poly_count_sum += self.scene.evaluated_poly_count(&object.name)?;
            }
        }
        Ok(poly_count_sum)
    }

    fn check(&self, poly_count_sum: Self::Fact, _message: &mut Message) -> bool {
        poly_count_sum <= POLY_COUNT_LIMIT
    }
}

struct HairStrandCountRule<'a> {
    scene: &'a dyn Scene,
}

impl Rule for HairStrandCountRule<'_> {
    type Fact = u64;

    fn key(&self) -> &'static str {
        PARTICLE_COUNT_KEY
    }

    fn base_message(&self) -> String {
        format!(
            "Hair strand limit exceeded! Hair strand count exceeds the allowed amount of \
             {HAIR_STRAND_LIMIT} hair strands per character!"
        )
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        let mut strand_count_sum = 0;
        for object in self.scene.objects() {
            for modifier in self.scene.modifiers(&object.name)? {
                match modifier.kind {
                    ModifierKind::ParticleSystem(particles) => {
                        strand_count_sum += particles.strand_count();
                    }
                    ModifierKind::GeometryNodes(_) if object.kind == ObjectKind::Curves => {
                        strand_count_sum += self.scene.curve_strand_count(&object.name)?;
                    }
                    _ => {}
                }
            }
        }
        Ok(strand_count_sum)
    }

    fn check(&self, strand_count_sum: Self::Fact, _message: &mut Message) -> bool {
        strand_count_sum <= HAIR_STRAND_LIMIT
    }
}

struct TextureFilesRule<'a> {
    scene: &'a dyn Scene,
    textures_dir: &'a Utf8Path,
}

impl Rule for TextureFilesRule<'_> {
    type Fact = Vec<String>;

    fn key(&self) -> &'static str {
        TEXTURE_FILES_KEY
    }

    fn base_message(&self) -> String {
        format!(
            "Missing or unsupported texture files detected! Please provide all texture files \
             used by the character in one of the supported file formats. Supported file \
             formats: {}",
            ALLOWED_TEXTURE_FORMATS.join(", ")
        )
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        let texture_names = collect_texture_file_names(self.textures_dir);
        let texture_names_udim: Vec<String> = texture_names
            .iter()
            .map(|name| UDIM_TILE_RE.replace_all(name, "_<UDIM>_").into_owned())
            .collect();

        let mut ignored: Vec<String> =
            IGNORED_IMAGE_NAMES.iter().map(|s| s.to_string()).collect();
        ignored.extend(self.scene.environment_image_names());

        let mut missing_textures = Vec::new();
        for image in self.scene.images() {
            if image.users == 0 || image.packed || ignored.contains(&image.name) {
                continue;
            }
            let texture_name = image_base_name(image.filepath.as_str());
            if !texture_names.contains(&texture_name)
                && !texture_names_udim.contains(&texture_name)
            {
                missing_textures.push(texture_name);
            }
        }
        Ok(missing_textures)
    }

    fn check(&self, missing_textures: Self::Fact, message: &mut Message) -> bool {
        if missing_textures.is_empty() {
            true
        } else {
            message.expand(format!(
                "Missing or unsupported texture files: {}",
                join_names(&missing_textures)
            ));
            message.expand(
                "NOTE: All texture files (or folders containing texture files) used by the \
                 character need to be placed in the same directory as the character file.",
            );
            false
        }
    }
}

struct MainFaceMeshNameRule<'a> {
    metadata: &'a CharacterMetadata,
}

impl Rule for MainFaceMeshNameRule<'_> {
    type Fact = String;

    fn key(&self) -> &'static str {
        FACE_NAME_KEY
    }

    fn base_message(&self) -> String {
        format!("Wrong face mesh name! Main face mesh name does not end with the tag \"{FACE_TAG}\"!")
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        Ok(assigned_face_mesh(self.metadata)?.to_string())
    }

    fn check(&self, mesh_name: Self::Fact, _message: &mut Message) -> bool {
        mesh_name.ends_with(FACE_TAG)
    }
}

/// At least one non-Basis blendshape must be wired up for facial animation
/// data to land anywhere. A face mesh without a shape-key container yields
/// the empty list and fails like any other unwired face.
struct BlendshapesRule<'a> {
    metadata: &'a CharacterMetadata,
    scene: &'a dyn Scene,
}

impl Rule for BlendshapesRule<'_> {
    type Fact = Vec<String>;

    fn key(&self) -> &'static str {
        BLENDSHAPES_KEY
    }

    fn base_message(&self) -> String {
        "No valid blendshapes! There are no blendshapes to apply animation data to.".to_string()
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        let mesh_name = assigned_face_mesh(self.metadata)?;
        if self.scene.shape_keys(mesh_name)?.is_none() {
            return Ok(Vec::new());
        }
        Ok(self
            .metadata
            .face
            .blendshape_names
            .iter()
            .skip(1) // Basis is the rest shape, not an animation target
            .filter_map(|(_, value)| value.clone())
            .collect())
    }

    fn check(&self, blendshapes: Self::Fact, message: &mut Message) -> bool {
        if blendshapes.is_empty() {
            let mesh_name = self.metadata.face.mesh_name.as_deref().unwrap_or_default();
            message.expand(format!(
                "Please check that {mesh_name} mesh has correctly named blendshapes."
            ));
            false
        } else {
            true
        }
    }
}

struct OneFaceMeshRule<'a> {
    scene: &'a dyn Scene,
}

impl Rule for OneFaceMeshRule<'_> {
    type Fact = Vec<String>;

    fn key(&self) -> &'static str {
        ONE_FACE_MESH_KEY
    }

    fn base_message(&self) -> String {
        format!(
            "Multiple main face meshes! More than one mesh with the tag \"{FACE_TAG}\" detected!"
        )
    }

    fn get(&self) -> SceneResult<Self::Fact> {
        Ok(self
            .scene
            .objects()
            .into_iter()
            .filter(|o| o.kind == ObjectKind::Mesh && o.name.ends_with(FACE_TAG))
            .map(|o| o.name)
            .collect())
    }

    fn check(&self, mesh_names: Self::Fact, _message: &mut Message) -> bool {
        mesh_names.len() <= 1
    }
}

/// Recursively collects supported texture file names under `dir`. I/O
/// problems (missing directory, unreadable entries) simply contribute no
/// names; the rule then reports the referenced textures as missing.
fn collect_texture_file_names(dir: &Utf8Path) -> Vec<String> {
    let mut names = Vec::new();
    let mut pending: Vec<Utf8PathBuf> = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let Ok(entries) = current.read_dir_utf8() else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                pending.push(path.to_path_buf());
            } else if has_allowed_format(path) {
                names.push(path.file_name().unwrap_or_default().to_string());
            }
        }
    }
    names
}

fn has_allowed_format(path: &Utf8Path) -> bool {
    path.extension()
        .map(|ext| ALLOWED_TEXTURE_FORMATS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Base name of an image path as stored by the host, tolerating
/// foreign-platform separators.
fn image_base_name(filepath: &str) -> String {
    let normalized = filepath.replace('\\', "/");
    normalized
        .rsplit('/')
        .next()
        .unwrap_or(&normalized)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{
        ArmatureState, GeometryNodesInfo, ImageSource, MemoryObject, MemoryScene, ModifierInfo,
        ParticleSystemInfo, PosePosition, RotationMode, ShapeKeyInfo,
    };

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

    fn base_scene() -> MemoryScene {
        let mut scene = MemoryScene::new();
        scene.add_object(
            MemoryObject::new("Rig_BODY", ObjectKind::Armature).with_armature(ArmatureState {
                pose_position: PosePosition::Pose,
                bones: Vec::new(),
            }),
        );
        scene
    }

    fn run(metadata: &CharacterMetadata, scene: &MemoryScene) -> StageReport {
        RequirementStage::run(metadata, scene, Utf8Path::new("/nonexistent"))
    }

    #[test]
    fn minimal_valid_character_passes() {
        let report = run(&test_metadata(), &base_scene());
        assert!(report.passed(), "failing: {:?}", report.failing_keys());
        assert_eq!(report.len(), 6);
    }

    #[test]
    fn face_rules_run_only_when_mesh_declared() {
        let mut metadata = test_metadata();
        metadata.face.mesh_name = Some("Head_FACE".to_string());
        let mut scene = base_scene();
        scene.add_object(
            MemoryObject::new("Head_FACE", ObjectKind::Mesh).with_shape_keys(vec![ShapeKeyInfo {
                name: "jawOpen".to_string(),
                mute: false,
            }]),
        );
        metadata
            .face
            .blendshape_names
            .insert("jawOpen".to_string(), Some("jawOpen".to_string()));

        let report = run(&metadata, &scene);
        assert_eq!(report.len(), 9);
        assert!(report.passed(), "failing: {:?}", report.failing_keys());
    }

    #[test]
    fn armature_without_tag_fails() {
        let mut metadata = test_metadata();
        metadata.body.armature_name = Some("Rig".to_string());
        let report = run(&metadata, &base_scene());
        assert!(report.is_failing(ARMATURE_NAME_KEY));
    }

    #[test]
    fn two_tagged_armatures_fail() {
        let mut scene = base_scene();
        scene.add_object(MemoryObject::new("Other_BODY", ObjectKind::Armature).with_armature(
            ArmatureState {
                pose_position: PosePosition::Pose,
                bones: Vec::new(),
            },
        ));
        let report = run(&test_metadata(), &scene);
        assert!(report.is_failing(ONE_BODY_ARMATURE_KEY));
    }

    #[test]
    fn poly_count_over_budget_fails() {
        let mut scene = base_scene();
        scene.add_object(MemoryObject::new("Body_MESH", ObjectKind::Mesh).with_poly_count(900_000));
        scene.add_object(MemoryObject::new("Head_MESH", ObjectKind::Mesh).with_poly_count(700_000));
        let report = run(&test_metadata(), &scene);
        assert!(report.is_failing(POLY_COUNT_KEY));
    }

    #[test]
    fn hidden_meshes_do_not_count_towards_poly_budget() {
        let mut scene = base_scene();
        scene.add_object(
            MemoryObject::new("Proxy_MESH", ObjectKind::Mesh)
                .with_poly_count(2_000_000)
                .invisible(),
        );
        let report = run(&test_metadata(), &scene);
        assert!(!report.is_failing(POLY_COUNT_KEY));
    }

    #[test]
    fn particle_children_multiply_strand_count() {
        let mut scene = base_scene();
        scene.add_object(
            MemoryObject::new("Scalp", ObjectKind::Mesh).with_modifier(ModifierInfo {
                name: "fur".to_string(),
                kind: ModifierKind::ParticleSystem(ParticleSystemInfo {
                    count: 1_000,
                    children_enabled: true,
                    rendered_child_count: 120,
                }),
            }),
        );
        let report = run(&test_metadata(), &scene);
        assert!(report.is_failing(PARTICLE_COUNT_KEY));
    }

    #[test]
    fn curve_strands_count_towards_budget() {
        let mut scene = base_scene();
        scene.add_object(
            MemoryObject::new("Groom", ObjectKind::Curves)
                .with_curve_count(150_000)
                .with_modifier(ModifierInfo {
                    name: "surface_deform".to_string(),
                    kind: ModifierKind::GeometryNodes(GeometryNodesInfo {
                        node_types: vec!["DEFORM_CURVES_ON_SURFACE".to_string()],
                    }),
                }),
        );
        let report = run(&test_metadata(), &scene);
        assert!(report.is_failing(PARTICLE_COUNT_KEY));
    }

    #[test]
    fn missing_texture_is_reported_by_name() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp.path()).unwrap();
        std::fs::write(dir.join("skin.png"), b"png").unwrap();

        let mut scene = base_scene();
        scene.add_image(MemoryScene::file_image("skin", "//textures/skin.png"));
        scene.add_image(MemoryScene::file_image("cloth", "//textures/cloth.png"));

        let report = RequirementStage::run(&test_metadata(), &scene, dir);
        let entry = report.get(TEXTURE_FILES_KEY).unwrap();
        assert!(!entry.check);
        assert!(entry.message.contains("cloth.png"));
        assert!(!entry.message.contains("skin.png,"));
    }

    #[test]
    fn udim_tiles_resolve_the_placeholder_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp.path()).unwrap();
        std::fs::write(dir.join("skin_1001_diff.png"), b"png").unwrap();
        std::fs::write(dir.join("skin_1002_diff.png"), b"png").unwrap();

        let mut scene = base_scene();
        let mut image = MemoryScene::file_image("skin", "//skin_<UDIM>_diff.png");
        image.source = ImageSource::Tiled;
        scene.add_image(image);

        let report = RequirementStage::run(&test_metadata(), &scene, dir);
        assert!(!report.is_failing(TEXTURE_FILES_KEY));
    }

    #[test]
    fn packed_unused_and_environment_images_are_ignored() {
        let mut scene = base_scene();
        let mut packed = MemoryScene::file_image("packed", "//packed.png");
        packed.packed = true;
        scene.add_image(packed);
        let mut unused = MemoryScene::file_image("unused", "//unused.png");
        unused.users = 0;
        scene.add_image(unused);
        scene.add_image(MemoryScene::file_image("sky", "//sky.exr"));
        scene.add_environment_image("sky");

        let report = run(&test_metadata(), &scene);
        assert!(!report.is_failing(TEXTURE_FILES_KEY));
    }

    #[test]
    fn keyless_face_mesh_fails_blendshapes_recoverably() {
        let mut metadata = test_metadata();
        metadata.face.mesh_name = Some("Head_FACE".to_string());
        metadata
            .face
            .blendshape_names
            .insert("jawOpen".to_string(), Some("jawOpen".to_string()));
        let mut scene = base_scene();
        scene.add_object(MemoryObject::new("Head_FACE", ObjectKind::Mesh));

        let report = run(&metadata, &scene);
        let entry = report.get(BLENDSHAPES_KEY).unwrap();
        assert!(!entry.check);
        assert!(entry.message.contains("Head_FACE"));
    }

    #[test]
    fn two_tagged_face_meshes_fail() {
        let mut metadata = test_metadata();
        metadata.face.mesh_name = Some("Head_FACE".to_string());
        metadata
            .face
            .blendshape_names
            .insert("jawOpen".to_string(), Some("jawOpen".to_string()));
        let mut scene = base_scene();
        scene.add_object(
            MemoryObject::new("Head_FACE", ObjectKind::Mesh).with_shape_keys(vec![ShapeKeyInfo {
                name: "jawOpen".to_string(),
                mute: false,
            }]),
        );
        scene.add_object(MemoryObject::new("Backup_FACE", ObjectKind::Mesh));

        let report = run(&metadata, &scene);
        assert!(report.is_failing(ONE_FACE_MESH_KEY));
    }
}
