//! Data models for character validation.
//!
//! This module contains the records the pipeline consumes and produces:
//! - [`metadata`]: typed character metadata (materials, eye rigs, body
//!   bones, face blendshapes) with value-domain constraints
//! - [`schema`]: draft decoding and the [`SchemaError`] taxonomy
//! - [`conventions`]: the fixed bone/blendshape role keys and the known
//!   external naming conventions used by auto-assignment
//!
//! Metadata lives in the session as a raw JSON draft owned by the UI side;
//! the records here are the validated form that the Cleanup, Requirement,
//! and Warning stages read.

pub mod conventions;
pub mod metadata;
pub mod schema;

pub use conventions::{BLENDSHAPE_ROLES, BONE_ROLES, GAZE_BLENDSHAPES, IK_CHAIN_PAIRS};
pub use metadata::{
    BodyMetadata, CharacterMetadata, EyeRig, FaceMetadata, Material, MaterialFlat, MaterialHair,
    MaterialSurface,
};
pub use schema::{SchemaError, decode_metadata, default_draft};
