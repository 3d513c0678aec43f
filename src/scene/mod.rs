//! Capability interface over the host tool's scene graph.
//!
//! The host exposes its objects as untyped attribute bags; the pipeline
//! never touches those directly. Instead every observation and every
//! cleanup mutation goes through the [`Scene`] trait, implemented by an
//! adapter on the host side and by [`memory::MemoryScene`] for host-free
//! runs and tests.
//!
//! Read accessors take `&self`; cleanup mutations take `&mut self`. The
//! pipeline is synchronous and single-threaded by contract, so no locking
//! is involved.

pub mod memory;

use camino::Utf8PathBuf;
use thiserror::Error;

pub use memory::{MemoryObject, MemoryScene};

pub type SceneResult<T> = Result<T, SceneError>;

/// Errors raised when an observation or mutation dereferences scene state
/// that is missing or of the wrong kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("Object `{0}` not found in scene")]
    ObjectNotFound(String),

    #[error("Object `{0}` is not an armature")]
    NotAnArmature(String),

    #[error("Object `{0}` is not a mesh")]
    NotAMesh(String),

    #[error("Bone `{bone}` not found in armature `{armature}`")]
    BoneNotFound { armature: String, bone: String },

    #[error("Modifier `{modifier}` not found on `{object}`")]
    ModifierNotFound { object: String, modifier: String },

    #[error("Modifier `{modifier}` on `{object}` cannot be applied")]
    ModifierNotApplicable { object: String, modifier: String },

    #[error("Data block `{0}` not found")]
    DataBlockNotFound(String),

    #[error("Failed to persist scene: {0}")]
    Persist(String),
}

/// Scene object categories the pipeline distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Armature,
    Mesh,
    Curves,
    Other,
}

/// Whether an armature is evaluated in pose or rest position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosePosition {
    Pose,
    Rest,
}

/// Rotation order (or non-Euler mode) of a pose bone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationMode {
    Xyz,
    Xzy,
    Yxz,
    Yzx,
    Zxy,
    Zyx,
    Quaternion,
    AxisAngle,
}

impl std::fmt::Display for RotationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RotationMode::Xyz => "XYZ",
            RotationMode::Xzy => "XZY",
            RotationMode::Yxz => "YXZ",
            RotationMode::Yzx => "YZX",
            RotationMode::Zxy => "ZXY",
            RotationMode::Zyx => "ZYX",
            RotationMode::Quaternion => "QUATERNION",
            RotationMode::AxisAngle => "AXIS_ANGLE",
        };
        f.write_str(label)
    }
}

/// Named data-block collections subject to the naming rule and renaming
/// cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBlockKind {
    Armature,
    Material,
    Mesh,
    Object,
}

/// One scene object as seen from the view layer.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub name: String,
    pub kind: ObjectKind,
    /// Present in the active view layer; hidden objects do not count
    /// towards budgets.
    pub visible: bool,
    /// Excluded from rendering.
    pub hide_render: bool,
}

/// One bone of an armature, merged data- and pose-level view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoneInfo {
    pub name: String,
    pub parent: Option<String>,
    pub rotation_mode: RotationMode,
    pub use_connect: bool,
    pub use_local_location: bool,
}

/// Snapshot of an armature's bones and evaluation mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmatureState {
    pub pose_position: PosePosition,
    pub bones: Vec<BoneInfo>,
}

impl ArmatureState {
    pub fn bone(&self, name: &str) -> Option<&BoneInfo> {
        self.bones.iter().find(|bone| bone.name == name)
    }
}

/// Mesh data-block state relevant to validation.
#[derive(Debug, Clone)]
pub struct MeshDataInfo {
    pub name: String,
    pub auto_smooth: bool,
}

/// One shape key on a mesh.
#[derive(Debug, Clone)]
pub struct ShapeKeyInfo {
    pub name: String,
    pub mute: bool,
}

/// One collection and its render visibility.
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub name: String,
    pub hide_render: bool,
}

/// How an image datablock sources its pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    File,
    Tiled,
    Sequence,
    Movie,
}

/// One image datablock referenced by the scene.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub name: String,
    /// Path as stored by the host; `<UDIM>` placeholder for tiled images,
    /// first frame for sequences.
    pub filepath: Utf8PathBuf,
    pub users: u32,
    pub packed: bool,
    pub source: ImageSource,
}

/// Particle system settings feeding the hair-strand budget.
#[derive(Debug, Clone)]
pub struct ParticleSystemInfo {
    pub count: u64,
    /// Child particle generation enabled (child type other than NONE).
    pub children_enabled: bool,
    pub rendered_child_count: u64,
}

impl ParticleSystemInfo {
    /// Strands this system contributes: base count multiplied by the
    /// rendered-child multiplier when children are produced.
    pub fn strand_count(&self) -> u64 {
        if self.children_enabled && self.rendered_child_count > 0 {
            self.count * self.rendered_child_count
        } else {
            self.count
        }
    }
}

/// Geometry-nodes modifier contents, builtin group input/output excluded.
#[derive(Debug, Clone)]
pub struct GeometryNodesInfo {
    pub node_types: Vec<String>,
}

impl GeometryNodesInfo {
    /// A single deform-curves-on-surface node keeps groom curves bound to
    /// the scalp; such modifiers must stay live.
    pub fn is_deform_only(&self) -> bool {
        self.node_types.len() == 1 && self.node_types[0] == "DEFORM_CURVES_ON_SURFACE"
    }
}

/// Kind and payload of one object modifier.
#[derive(Debug, Clone)]
pub enum ModifierKind {
    Armature,
    ParticleSystem(ParticleSystemInfo),
    GeometryNodes(GeometryNodesInfo),
    Other(String),
}

/// One modifier on a scene object.
#[derive(Debug, Clone)]
pub struct ModifierInfo {
    pub name: String,
    pub kind: ModifierKind,
}

/// Shader graph summary for one material, consumed by the USD warnings.
#[derive(Debug, Clone)]
pub struct ShaderInfo {
    pub material_name: String,
    pub node_types: Vec<String>,
    pub translucency: f64,
}

/// Read and mutate access to the host scene.
pub trait Scene {
    // Observations

    /// Names of embedded text/script blocks.
    fn text_block_names(&self) -> Vec<String>;

    /// Every object in the scene.
    fn objects(&self) -> Vec<ObjectInfo>;

    /// Single object lookup.
    fn object(&self, name: &str) -> Option<ObjectInfo>;

    /// Bone-level state of the named armature object.
    fn armature(&self, object_name: &str) -> SceneResult<ArmatureState>;

    /// Names of all data blocks of one kind.
    fn data_block_names(&self, kind: DataBlockKind) -> Vec<String>;

    /// All mesh data blocks.
    fn meshes(&self) -> Vec<MeshDataInfo>;

    /// Modifier stack of the named object.
    fn modifiers(&self, object_name: &str) -> SceneResult<Vec<ModifierInfo>>;

    /// Polygon count of a mesh object after modifier evaluation.
    fn evaluated_poly_count(&self, object_name: &str) -> SceneResult<u64>;

    /// Strand count of a curves object.
    fn curve_strand_count(&self, object_name: &str) -> SceneResult<u64>;

    /// Shape keys of a mesh object; `Ok(None)` when the mesh carries no
    /// shape-key container at all.
    fn shape_keys(&self, object_name: &str) -> SceneResult<Option<Vec<ShapeKeyInfo>>>;

    /// Every collection in the scene.
    fn collections(&self) -> Vec<CollectionInfo>;

    /// Every image datablock.
    fn images(&self) -> Vec<ImageInfo>;

    /// Names of images used as world environment maps; these never ship
    /// with the character.
    fn environment_image_names(&self) -> Vec<String>;

    /// Shader graph summaries for all materials.
    fn shaders(&self) -> Vec<ShaderInfo>;

    // Mutations

    /// Exit edit modes and deselect everything.
    fn normalize(&mut self);

    /// Purge orphan data and save the host file.
    fn persist(&mut self) -> SceneResult<()>;

    /// Delete all embedded text blocks.
    fn remove_text_blocks(&mut self);

    fn set_pose_position(&mut self, armature: &str, pose: PosePosition) -> SceneResult<()>;

    fn set_bone_relations(
        &mut self,
        armature: &str,
        bone: &str,
        use_connect: bool,
        use_local_location: bool,
    ) -> SceneResult<()>;

    fn set_all_rotation_modes(&mut self, armature: &str, mode: RotationMode) -> SceneResult<()>;

    /// Disable auto-smooth on every mesh data block.
    fn disable_auto_smooth(&mut self);

    fn rename_data_block(&mut self, kind: DataBlockKind, old: &str, new: &str) -> SceneResult<()>;

    /// Bake a modifier into the object data. Fails with
    /// [`SceneError::ModifierNotApplicable`] when the host cannot apply it.
    fn apply_modifier(&mut self, object: &str, modifier: &str) -> SceneResult<()>;

    fn remove_modifier(&mut self, object: &str, modifier: &str) -> SceneResult<()>;
}
