//! Typed character metadata records.
//!
//! The session keeps metadata as a raw JSON draft that the UI mutates field
//! by field; the Metadata stage decodes the draft into these records. Serde
//! carries the structural checks (missing fields, wrong primitive types,
//! unknown material tags) and [`validate`](CharacterMetadata::validate)
//! carries the value-domain constraints that types alone cannot express.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::conventions::{BLENDSHAPE_ROLES, BONE_ROLES};
use crate::models::schema::SchemaError;

/// Software packages that can author a character for upload.
pub const SUPPORTED_SOFTWARE: [&str; 2] = ["blender", "maya"];

/// Render engines whose material definitions the service understands.
pub const SUPPORTED_RENDER_ENGINES: [&str; 1] = ["arnold"];

/// Accepted bump map interpretations.
pub const SUPPORTED_BUMP_TYPES: [&str; 3] = ["bump", "normal_tangent_space", "normal_object_space"];

/// Local rotation axes an eye rig can swing around.
pub const SUPPORTED_AXES: [&str; 3] = ["X", "Y", "Z"];

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("Invalid version regex"));

/// Root metadata record describing one character asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterMetadata {
    pub software: String,
    pub version: String,
    pub materials: Vec<Material>,
    pub eyes_rig: Vec<EyeRig>,
    pub body: BodyMetadata,
    pub face: FaceMetadata,
}

/// A material definition, discriminated by the `material_type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "material_type", rename_all = "lowercase")]
pub enum Material {
    Surface(MaterialSurface),
    Flat(MaterialFlat),
    Hair(MaterialHair),
}

impl Material {
    pub fn material_name(&self) -> &str {
        match self {
            Material::Surface(m) => &m.material_name,
            Material::Flat(m) => &m.material_name,
            Material::Hair(m) => &m.material_name,
        }
    }
}

/// Full PBR surface material. Every channel is an optional constant value
/// plus an optional texture reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSurface {
    pub material_name: String,
    pub mesh_names: Vec<String>,
    pub render_engine: String,
    #[serde(rename = "diffuseWeight_value")]
    pub diffuse_weight_value: Option<f64>,
    #[serde(rename = "diffuseWeight_texture")]
    pub diffuse_weight_texture: Option<String>,
    pub diffuse_value: Option<Vec<f64>>,
    pub diffuse_texture: Option<String>,
    pub metalness_value: Option<f64>,
    pub metalness_texture: Option<String>,
    #[serde(rename = "specularWeight_value")]
    pub specular_weight_value: Option<f64>,
    #[serde(rename = "specularWeight_texture")]
    pub specular_weight_texture: Option<String>,
    pub specular_value: Option<Vec<f64>>,
    pub specular_texture: Option<String>,
    pub roughness_value: Option<f64>,
    pub roughness_texture: Option<String>,
    pub anisotropic_value: Option<f64>,
    pub anisotropic_texture: Option<String>,
    #[serde(rename = "anisotropicRotation_value")]
    pub anisotropic_rotation_value: Option<f64>,
    #[serde(rename = "anisotropicRotation_texture")]
    pub anisotropic_rotation_texture: Option<String>,
    #[serde(rename = "transmissionWeight_value")]
    pub transmission_weight_value: Option<f64>,
    #[serde(rename = "transmissionWeight_texture")]
    pub transmission_weight_texture: Option<String>,
    pub transmission_value: Option<Vec<f64>>,
    pub transmission_texture: Option<String>,
    pub ior_value: Option<f64>,
    pub ior_texture: Option<String>,
    #[serde(rename = "sssWeight_value")]
    pub sss_weight_value: Option<f64>,
    #[serde(rename = "sssWeight_texture")]
    pub sss_weight_texture: Option<String>,
    pub sss_value: Option<Vec<f64>>,
    pub sss_texture: Option<String>,
    #[serde(rename = "sssRadius_value")]
    pub sss_radius_value: Option<Vec<f64>>,
    #[serde(rename = "sssRadius_texture")]
    pub sss_radius_texture: Option<String>,
    #[serde(rename = "coatWeight_value")]
    pub coat_weight_value: Option<f64>,
    #[serde(rename = "coatWeight_texture")]
    pub coat_weight_texture: Option<String>,
    pub coat_value: Option<Vec<f64>>,
    pub coat_texture: Option<String>,
    #[serde(rename = "emissionWeight_value")]
    pub emission_weight_value: Option<f64>,
    #[serde(rename = "emissionWeight_texture")]
    pub emission_weight_texture: Option<String>,
    pub emission_value: Option<Vec<f64>>,
    pub emission_texture: Option<String>,
    pub opacity_value: Option<Vec<f64>>,
    pub opacity_texture: Option<String>,
    pub bump_type: Option<String>,
    pub bump_flip: bool,
    pub bump_texture: Option<String>,
    #[serde(rename = "bumpWeight_value")]
    pub bump_weight_value: Option<f64>,
}

/// Unlit material with a single emission channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialFlat {
    pub material_name: String,
    pub mesh_names: Vec<String>,
    pub render_engine: String,
    pub emission_value: Option<Vec<f64>>,
    pub emission_texture: Option<String>,
}

/// Hair/groom material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialHair {
    pub material_name: String,
    pub groom_names: Vec<String>,
    pub render_engine: String,
    pub diffuse_value: Option<Vec<f64>>,
    pub diffuse_texture: Option<String>,
    pub melanin_value: Option<f64>,
    pub melanin_texture: Option<String>,
    #[serde(rename = "melaninRedness_value")]
    pub melanin_redness_value: Option<f64>,
    #[serde(rename = "melaninRedness_texture")]
    pub melanin_redness_texture: Option<String>,
    #[serde(rename = "melaninRandomize_value")]
    pub melanin_randomize_value: Option<f64>,
    #[serde(rename = "melaninRandomize_texture")]
    pub melanin_randomize_texture: Option<String>,
    pub roughness_value: Option<f64>,
    pub roughness_texture: Option<String>,
    pub ior_value: Option<f64>,
    pub ior_texture: Option<String>,
}

/// One eye bone driven by gaze blendshapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EyeRig {
    pub bone_name: String,
    pub horizontal_rotation_axis: String,
    pub vertical_rotation_axis: String,
    pub horizontal_min_max_value: Vec<f64>,
    pub vertical_min_max_value: Vec<f64>,
}

/// Skeleton binding: the driving armature and the bone assigned to each of
/// the 51 roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyMetadata {
    pub armature_name: Option<String>,
    pub bone_names: IndexMap<String, Option<String>>,
}

/// Face binding: the blendshape mesh and the shape key assigned to each of
/// the 91 roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceMetadata {
    pub mesh_name: Option<String>,
    pub blendshape_names: IndexMap<String, Option<String>>,
}

fn check_vector3(field: &str, value: Option<&Vec<f64>>) -> Result<(), SchemaError> {
    match value {
        Some(v) if v.len() != 3 => Err(SchemaError::value(
            field,
            "expected a list of 3 float values",
        )),
        _ => Ok(()),
    }
}

fn check_render_engine(field_prefix: &str, render_engine: &str) -> Result<(), SchemaError> {
    if SUPPORTED_RENDER_ENGINES.contains(&render_engine) {
        Ok(())
    } else {
        Err(SchemaError::value(
            format!("{field_prefix}.render_engine"),
            format!(
                "unsupported render engine `{render_engine}`; supported: {}",
                SUPPORTED_RENDER_ENGINES.join(", ")
            ),
        ))
    }
}

/// Checks that a role mapping carries exactly the fixed role-key set, then
/// reorders it canonically so serialization is stable.
fn canonicalize_roles(
    field: &str,
    roles: &[&str],
    map: &mut IndexMap<String, Option<String>>,
) -> Result<(), SchemaError> {
    for key in map.keys() {
        if !roles.contains(&key.as_str()) {
            return Err(SchemaError::value(
                format!("{field}.{key}"),
                "unknown role key",
            ));
        }
    }
    let mut canonical = IndexMap::with_capacity(roles.len());
    for role in roles {
        let value = map
            .shift_remove(*role)
            .ok_or_else(|| SchemaError::value(format!("{field}.{role}"), "missing role key"))?;
        canonical.insert((*role).to_string(), value);
    }
    *map = canonical;
    Ok(())
}

impl MaterialSurface {
    fn validate(&self, field_prefix: &str) -> Result<(), SchemaError> {
        check_render_engine(field_prefix, &self.render_engine)?;

        let vector3_fields: [(&str, Option<&Vec<f64>>); 8] = [
            ("diffuse_value", self.diffuse_value.as_ref()),
            ("specular_value", self.specular_value.as_ref()),
            ("transmission_value", self.transmission_value.as_ref()),
            ("sss_value", self.sss_value.as_ref()),
            ("sssRadius_value", self.sss_radius_value.as_ref()),
            ("coat_value", self.coat_value.as_ref()),
            ("emission_value", self.emission_value.as_ref()),
            ("opacity_value", self.opacity_value.as_ref()),
        ];
        for (name, value) in vector3_fields {
            check_vector3(&format!("{field_prefix}.{name}"), value)?;
        }

        if let Some(bump_type) = &self.bump_type {
            if !SUPPORTED_BUMP_TYPES.contains(&bump_type.as_str()) {
                return Err(SchemaError::value(
                    format!("{field_prefix}.bump_type"),
                    format!(
                        "unsupported bump map type `{bump_type}`; supported: {}",
                        SUPPORTED_BUMP_TYPES.join(", ")
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl MaterialFlat {
    fn validate(&self, field_prefix: &str) -> Result<(), SchemaError> {
        check_render_engine(field_prefix, &self.render_engine)?;
        check_vector3(
            &format!("{field_prefix}.emission_value"),
            self.emission_value.as_ref(),
        )
    }
}

impl MaterialHair {
    fn validate(&self, field_prefix: &str) -> Result<(), SchemaError> {
        check_render_engine(field_prefix, &self.render_engine)?;
        check_vector3(
            &format!("{field_prefix}.diffuse_value"),
            self.diffuse_value.as_ref(),
        )
    }
}

impl EyeRig {
    fn validate(&self, field_prefix: &str) -> Result<(), SchemaError> {
        for (name, axis) in [
            ("horizontal_rotation_axis", &self.horizontal_rotation_axis),
            ("vertical_rotation_axis", &self.vertical_rotation_axis),
        ] {
            if !SUPPORTED_AXES.contains(&axis.as_str()) {
                return Err(SchemaError::value(
                    format!("{field_prefix}.{name}"),
                    format!(
                        "unsupported rotation axis `{axis}`; supported: {}",
                        SUPPORTED_AXES.join(", ")
                    ),
                ));
            }
        }
        if self.horizontal_rotation_axis == self.vertical_rotation_axis {
            return Err(SchemaError::value(
                format!("{field_prefix}.vertical_rotation_axis"),
                "horizontal and vertical rotation axes must differ",
            ));
        }
        for (name, value) in [
            ("horizontal_min_max_value", &self.horizontal_min_max_value),
            ("vertical_min_max_value", &self.vertical_min_max_value),
        ] {
            if value.len() != 2 {
                return Err(SchemaError::value(
                    format!("{field_prefix}.{name}"),
                    "expected a list of 2 float values",
                ));
            }
        }
        Ok(())
    }
}

impl CharacterMetadata {
    /// Runs the value-domain constraints and canonicalizes role-map order.
    ///
    /// Call this after a structural serde decode; [`crate::models::schema`]
    /// wires both steps together.
    pub fn validate(&mut self) -> Result<(), SchemaError> {
        if !SUPPORTED_SOFTWARE.contains(&self.software.as_str()) {
            return Err(SchemaError::value(
                "software",
                format!(
                    "unsupported software `{}`; supported: {}",
                    self.software,
                    SUPPORTED_SOFTWARE.join(", ")
                ),
            ));
        }
        if !VERSION_RE.is_match(&self.version) {
            return Err(SchemaError::value(
                "version",
                "expected format X.Y.Z where X, Y, and Z are integer numbers",
            ));
        }

        for (i, material) in self.materials.iter().enumerate() {
            let field_prefix = format!("materials[{i}]");
            match material {
                Material::Surface(m) => m.validate(&field_prefix)?,
                Material::Flat(m) => m.validate(&field_prefix)?,
                Material::Hair(m) => m.validate(&field_prefix)?,
            }
        }
        for (i, eye_rig) in self.eyes_rig.iter().enumerate() {
            eye_rig.validate(&format!("eyes_rig[{i}]"))?;
        }

        if self.body.armature_name.is_none() {
            return Err(SchemaError::value(
                "body.armature_name",
                "an armature must be assigned",
            ));
        }
        canonicalize_roles("body.bone_names", &BONE_ROLES, &mut self.body.bone_names)?;
        if self.body.bone_names["Hips"].is_none() {
            return Err(SchemaError::value(
                "body.bone_names.Hips",
                "bone role is mandatory and must be assigned",
            ));
        }
        canonicalize_roles(
            "face.blendshape_names",
            &BLENDSHAPE_ROLES,
            &mut self.face.blendshape_names,
        )
    }

    /// Bone name assigned to a role, if any.
    pub fn bone(&self, role: &str) -> Option<&str> {
        self.body.bone_names.get(role)?.as_deref()
    }

    /// Blendshape name assigned to a role, if any.
    pub fn blendshape(&self, role: &str) -> Option<&str> {
        self.face.blendshape_names.get(role)?.as_deref()
    }
}

impl Default for CharacterMetadata {
    fn default() -> Self {
        Self {
            software: "blender".to_string(),
            version: "0.0.0".to_string(),
            materials: Vec::new(),
            eyes_rig: Vec::new(),
            body: BodyMetadata::default(),
            face: FaceMetadata::default(),
        }
    }
}

impl Default for BodyMetadata {
    fn default() -> Self {
        Self {
            armature_name: None,
            bone_names: BONE_ROLES
                .iter()
                .map(|role| ((*role).to_string(), None))
                .collect(),
        }
    }
}

impl Default for FaceMetadata {
    fn default() -> Self {
        Self {
            mesh_name: None,
            blendshape_names: BLENDSHAPE_ROLES
                .iter()
                .map(|role| ((*role).to_string(), None))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_metadata() -> CharacterMetadata {
        let mut metadata = CharacterMetadata {
            version: "1.2.3".to_string(),
            ..CharacterMetadata::default()
        };
        metadata
            .body
            .bone_names
            .insert("Hips".to_string(), Some("Hips".to_string()));
        metadata.body.armature_name = Some("Character_BODY".to_string());
        metadata
    }

    #[test]
    fn default_metadata_fails_on_unassigned_armature() {
        let mut metadata = CharacterMetadata::default();
        let err = metadata.validate().unwrap_err();
        assert!(err.to_string().contains("body.armature_name"));
    }

    #[test]
    fn unassigned_hips_fails_validation() {
        let mut metadata = valid_metadata();
        metadata.body.bone_names.insert("Hips".to_string(), None);
        let err = metadata.validate().unwrap_err();
        assert!(err.to_string().contains("body.bone_names.Hips"));
    }

    #[test]
    fn valid_metadata_passes() {
        let mut metadata = valid_metadata();
        metadata.validate().unwrap();
    }

    #[test]
    fn version_format_is_enforced() {
        let mut metadata = valid_metadata();
        metadata.version = "1.2".to_string();
        let err = metadata.validate().unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn software_domain_is_enforced() {
        let mut metadata = valid_metadata();
        metadata.software = "houdini".to_string();
        let err = metadata.validate().unwrap_err();
        assert!(err.to_string().contains("software"));
    }

    #[test]
    fn flat_material_emission_must_have_three_components() {
        let mut metadata = valid_metadata();
        metadata.materials.push(Material::Flat(MaterialFlat {
            material_name: "Eyes".to_string(),
            mesh_names: vec!["Eyes_MESH".to_string()],
            render_engine: "arnold".to_string(),
            emission_value: Some(vec![1.0, 0.5]),
            emission_texture: None,
        }));
        let err = metadata.validate().unwrap_err();
        assert!(err.to_string().contains("materials[0].emission_value"));
    }

    #[test]
    fn eye_rig_axes_must_differ() {
        let mut metadata = valid_metadata();
        metadata.eyes_rig.push(EyeRig {
            bone_name: "Eye_L".to_string(),
            horizontal_rotation_axis: "Z".to_string(),
            vertical_rotation_axis: "Z".to_string(),
            horizontal_min_max_value: vec![-40.0, 30.0],
            vertical_min_max_value: vec![-20.0, 25.0],
        });
        let err = metadata.validate().unwrap_err();
        assert!(err.to_string().contains("rotation axes must differ"));
    }

    #[test]
    fn role_maps_are_reordered_canonically() {
        let mut metadata = valid_metadata();
        // Simulate a draft that arrived with keys in a different order.
        metadata.body.bone_names.move_index(0, 50);
        metadata.validate().unwrap();
        assert_eq!(
            metadata.body.bone_names.get_index(0).unwrap().0,
            &"Hips".to_string()
        );
    }

    #[test]
    fn missing_role_key_is_reported() {
        let mut metadata = valid_metadata();
        metadata.face.blendshape_names.shift_remove("jawOpen");
        let err = metadata.validate().unwrap_err();
        assert!(err.to_string().contains("face.blendshape_names.jawOpen"));
    }

    #[test]
    fn material_tag_selects_record_shape() {
        let value = serde_json::json!({
            "material_name": "Hair",
            "material_type": "hair",
            "groom_names": ["Groom"],
            "render_engine": "arnold",
            "diffuse_value": null,
            "diffuse_texture": null,
            "melanin_value": 0.5,
            "melanin_texture": null,
            "melaninRedness_value": null,
            "melaninRedness_texture": null,
            "melaninRandomize_value": null,
            "melaninRandomize_texture": null,
            "roughness_value": null,
            "roughness_texture": null,
            "ior_value": null,
            "ior_texture": null,
        });
        let material: Material = serde_json::from_value(value).unwrap();
        assert!(matches!(material, Material::Hair(_)));
        assert_eq!(material.material_name(), "Hair");
    }
}
