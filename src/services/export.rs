//! Export of validated character data.
//!
//! Builds the upload package next to the asset file: a copy of the asset,
//! a `textures/` directory with every resolved texture (UDIM tiles
//! individually, image sequences frame by frame, flat files as-is), and
//! `metadata.json` with stable key order and 4-space indentation.

use std::fs;
use std::io::{self, BufWriter, ErrorKind};
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::models::CharacterMetadata;
use crate::scene::{ImageSource, Scene};
use crate::services::requirement::IGNORED_IMAGE_NAMES;

/// Directory created next to the asset file.
pub const EXPORT_FOLDER_NAME: &str = "character_export_data";

/// Upper bound on copied image-sequence frames.
pub const MAX_SEQUENCE_FRAMES: usize = 200;

static FRAME_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("Invalid frame number regex"));

/// Errors raised while building the export package.
#[derive(Error, Debug)]
pub enum ExportError {
    /// A referenced file disappeared between validation and export; carries
    /// the OS error text.
    #[error("{0}")]
    MissingFile(String),

    #[error("Failed to write character export data")]
    Io(#[source] io::Error),

    #[error("Failed to serialize character metadata")]
    Serialize(#[from] serde_json::Error),

    #[error("Character file has no parent directory: {0}")]
    NoParentDirectory(Utf8PathBuf),
}

fn map_io(err: io::Error) -> ExportError {
    if err.kind() == ErrorKind::NotFound {
        ExportError::MissingFile(err.to_string())
    } else {
        ExportError::Io(err)
    }
}

/// Export runner. Constructed per export; holds the resolved directories.
pub struct ExportData {
    asset_path: Utf8PathBuf,
    output_path: Utf8PathBuf,
}

impl ExportData {
    /// Prepares the export directory layout next to `asset_path`.
    /// `folder_name` is usually [`EXPORT_FOLDER_NAME`] but can be
    /// overridden through the session settings.
    pub fn new(asset_path: &Utf8Path, folder_name: &str) -> Result<Self, ExportError> {
        let parent = asset_path
            .parent()
            .ok_or_else(|| ExportError::NoParentDirectory(asset_path.to_path_buf()))?;
        let output_path = parent.join(folder_name);
        fs::create_dir_all(&output_path).map_err(map_io)?;
        Ok(Self {
            asset_path: asset_path.to_path_buf(),
            output_path,
        })
    }

    pub fn output_path(&self) -> &Utf8Path {
        &self.output_path
    }

    /// Copies the asset and its textures and writes `metadata.json`.
    /// Returns the export directory.
    pub fn run(
        &self,
        metadata: &CharacterMetadata,
        scene: &dyn Scene,
    ) -> Result<Utf8PathBuf, ExportError> {
        tracing::info!("Exporting character data to {}", self.output_path);

        self.copy_asset_file()?;
        self.copy_texture_files(scene)?;
        self.write_metadata(metadata)?;

        Ok(self.output_path.clone())
    }

    fn copy_asset_file(&self) -> Result<(), ExportError> {
        let stem = self.asset_path.file_stem().unwrap_or("character");
        let output_name = match self.asset_path.extension() {
            Some(ext) => format!("{stem}_output.{ext}"),
            None => format!("{stem}_output"),
        };
        fs::copy(&self.asset_path, self.output_path.join(output_name)).map_err(map_io)?;
        Ok(())
    }

    fn copy_texture_files(&self, scene: &dyn Scene) -> Result<(), ExportError> {
        let textures_path = self.output_path.join("textures");
        fs::create_dir_all(&textures_path).map_err(map_io)?;

        let mut ignored: Vec<String> = IGNORED_IMAGE_NAMES.iter().map(|s| s.to_string()).collect();
        ignored.extend(scene.environment_image_names());

        let asset_dir = self
            .asset_path
            .parent()
            .ok_or_else(|| ExportError::NoParentDirectory(self.asset_path.clone()))?;

        let mut texture_paths = Vec::new();
        for image in scene.images() {
            if image.users == 0 || image.packed || ignored.contains(&image.name) {
                continue;
            }
            let resolved = resolve_image_path(asset_dir, image.filepath.as_str());
            match image.source {
                ImageSource::File => texture_paths.push(resolved),
                ImageSource::Tiled => texture_paths.extend(udim_tile_paths(&resolved)),
                ImageSource::Sequence => texture_paths.extend(image_sequence_paths(&resolved)),
                // Video textures are not supported by the service.
                ImageSource::Movie => {}
            }
        }

        for texture_path in texture_paths {
            let Some(file_name) = texture_path.file_name() else {
                continue;
            };
            fs::copy(&texture_path, textures_path.join(file_name)).map_err(map_io)?;
        }
        Ok(())
    }

    fn write_metadata(&self, metadata: &CharacterMetadata) -> Result<(), ExportError> {
        let file = fs::File::create(self.output_path.join("metadata.json")).map_err(map_io)?;
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer =
            serde_json::Serializer::with_formatter(BufWriter::new(file), formatter);
        metadata.serialize(&mut serializer)?;
        Ok(())
    }
}

/// Resolves a host-style image path: a `//` prefix is relative to the
/// asset's directory, anything else is taken as-is.
pub fn resolve_image_path(asset_dir: &Utf8Path, filepath: &str) -> Utf8PathBuf {
    let normalized = filepath.replace('\\', "/");
    match normalized.strip_prefix("//") {
        Some(relative) => asset_dir.join(relative),
        None => Utf8PathBuf::from(normalized),
    }
}

/// Expands a `<UDIM>` placeholder path into the tile files present on
/// disk, sorted by name.
pub fn udim_tile_paths(image_path: &Utf8Path) -> Vec<Utf8PathBuf> {
    let (Some(dir), Some(name)) = (image_path.parent(), image_path.file_name()) else {
        return Vec::new();
    };
    let pattern = name
        .split("<UDIM>")
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\d{4}");
    let Ok(tile_re) = Regex::new(&format!("^{pattern}$")) else {
        return Vec::new();
    };

    let mut tiles = Vec::new();
    if let Ok(entries) = dir.read_dir_utf8() {
        for entry in entries.flatten() {
            if tile_re.is_match(entry.file_name()) {
                tiles.push(entry.path().to_path_buf());
            }
        }
    }
    tiles.sort();
    tiles
}

/// Walks an image sequence from its first frame, stopping at the first
/// missing frame or at [`MAX_SEQUENCE_FRAMES`].
pub fn image_sequence_paths(first_frame_path: &Utf8Path) -> Vec<Utf8PathBuf> {
    let (Some(dir), Some(name)) = (first_frame_path.parent(), first_frame_path.file_name()) else {
        return Vec::new();
    };
    let Some(frame_match) = FRAME_NUMBER_RE.find(name) else {
        // No frame counter in the name; treat as a single flat file.
        return if first_frame_path.is_file() {
            vec![first_frame_path.to_path_buf()]
        } else {
            Vec::new()
        };
    };

    let prefix = &name[..frame_match.start()];
    let suffix = &name[frame_match.end()..];
    let width = frame_match.as_str().len();
    let Ok(mut frame) = frame_match.as_str().parse::<u64>() else {
        return Vec::new();
    };

    let mut frames = Vec::new();
    for _ in 0..MAX_SEQUENCE_FRAMES {
        let frame_name = format!("{prefix}{frame:0width$}{suffix}");
        let frame_path = dir.join(frame_name);
        if !frame_path.is_file() {
            break;
        }
        frames.push(frame_path);
        frame += 1;
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::decode_metadata;
    use crate::scene::MemoryScene;
    use tempfile::TempDir;

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
        metadata.validate().unwrap();
        metadata
    }

    fn asset_in(dir: &Utf8Path) -> Utf8PathBuf {
        let asset = dir.join("character.blend");
        fs::write(&asset, b"BLENDER").unwrap();
        asset
    }

    fn temp_dir() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, path)
    }

    #[test]
    fn export_writes_asset_copy_and_metadata() {
        let (_temp, dir) = temp_dir();
        let asset = asset_in(&dir);
        let scene = MemoryScene::new();

        let export = ExportData::new(&asset, EXPORT_FOLDER_NAME).unwrap();
        let output = export.run(&test_metadata(), &scene).unwrap();

        assert_eq!(output, dir.join(EXPORT_FOLDER_NAME));
        assert!(output.join("character_output.blend").is_file());
        assert!(output.join("metadata.json").is_file());
        assert!(output.join("textures").is_dir());
    }

    #[test]
    fn metadata_json_uses_four_space_indent() {
        let (_temp, dir) = temp_dir();
        let asset = asset_in(&dir);
        let export = ExportData::new(&asset, EXPORT_FOLDER_NAME).unwrap();
        export.run(&test_metadata(), &MemoryScene::new()).unwrap();

        let text = fs::read_to_string(dir.join(EXPORT_FOLDER_NAME).join("metadata.json")).unwrap();
        assert!(text.starts_with("{\n    \"software\""));
    }

    #[test]
    fn exported_metadata_round_trips() {
        let (_temp, dir) = temp_dir();
        let asset = asset_in(&dir);
        let export = ExportData::new(&asset, EXPORT_FOLDER_NAME).unwrap();
        let metadata = test_metadata();
        export.run(&metadata, &MemoryScene::new()).unwrap();

        let text = fs::read_to_string(dir.join(EXPORT_FOLDER_NAME).join("metadata.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let reloaded = decode_metadata(&value).unwrap();
        assert_eq!(reloaded, metadata);
    }

    #[test]
    fn flat_and_udim_textures_are_copied() {
        let (_temp, dir) = temp_dir();
        let asset = asset_in(&dir);
        fs::write(dir.join("cloth.png"), b"png").unwrap();
        fs::write(dir.join("skin_1001_d.png"), b"png").unwrap();
        fs::write(dir.join("skin_1002_d.png"), b"png").unwrap();

        let mut scene = MemoryScene::new();
        scene.add_image(MemoryScene::file_image("cloth", "//cloth.png"));
        let mut udim = MemoryScene::file_image("skin", "//skin_<UDIM>_d.png");
        udim.source = crate::scene::ImageSource::Tiled;
        scene.add_image(udim);

        let export = ExportData::new(&asset, EXPORT_FOLDER_NAME).unwrap();
        export.run(&test_metadata(), &scene).unwrap();

        let textures = dir.join(EXPORT_FOLDER_NAME).join("textures");
        assert!(textures.join("cloth.png").is_file());
        assert!(textures.join("skin_1001_d.png").is_file());
        assert!(textures.join("skin_1002_d.png").is_file());
    }

    #[test]
    fn packed_and_environment_images_are_skipped() {
        let (_temp, dir) = temp_dir();
        let asset = asset_in(&dir);

        let mut scene = MemoryScene::new();
        let mut packed = MemoryScene::file_image("packed", "//packed.png");
        packed.packed = true;
        scene.add_image(packed);
        scene.add_image(MemoryScene::file_image("sky", "//sky.exr"));
        scene.add_environment_image("sky");

        let export = ExportData::new(&asset, EXPORT_FOLDER_NAME).unwrap();
        export.run(&test_metadata(), &scene).unwrap();

        let textures = dir.join(EXPORT_FOLDER_NAME).join("textures");
        assert!(!textures.join("packed.png").exists());
        assert!(!textures.join("sky.exr").exists());
    }

    #[test]
    fn sequence_copy_stops_at_first_missing_frame() {
        let (_temp, dir) = temp_dir();
        fs::write(dir.join("frame_001.png"), b"png").unwrap();
        fs::write(dir.join("frame_002.png"), b"png").unwrap();
        fs::write(dir.join("frame_004.png"), b"png").unwrap();

        let frames = image_sequence_paths(&dir.join("frame_001.png"));
        assert_eq!(frames.len(), 2);
        assert!(frames[1].as_str().ends_with("frame_002.png"));
    }

    #[test]
    fn missing_flat_texture_surfaces_os_error() {
        let (_temp, dir) = temp_dir();
        let asset = asset_in(&dir);

        let mut scene = MemoryScene::new();
        scene.add_image(MemoryScene::file_image("ghost", "//ghost.png"));

        let export = ExportData::new(&asset, EXPORT_FOLDER_NAME).unwrap();
        let err = export.run(&test_metadata(), &scene).unwrap_err();
        assert!(matches!(err, ExportError::MissingFile(_)));
    }
}
