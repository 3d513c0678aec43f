// charval - Character asset validation and cleanup for cloud animation
// upload.
//
// This is the library crate containing the validation pipeline, cleanup
// executor, and export services. The host 3D tool's GUI drives it through
// the Session API and implements the Scene trait over its scene graph.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod scene;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::{SessionSettings, SettingsStore};
pub use models::{CharacterMetadata, SchemaError};
pub use scene::{MemoryScene, Scene};
pub use services::{StageReport, ValidationStatus, cleanup_character, validate_character};
pub use state::{Session, SessionEvent};

/// Add-on version, stamped into metadata at validation time
pub const ADDON_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// Version of the metadata.json layout. Informational; consumers of the
/// export read it from their side of the pipeline.
pub const METADATA_VERSION: &str = "1.1.1";
