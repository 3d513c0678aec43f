//! Integration tests for the export package
//!
//! These tests verify the on-disk layout of an export: the asset copy,
//! the textures directory (flat, UDIM, sequence sources), and a
//! metadata.json that survives a round trip through the schema.

use camino::{Utf8Path, Utf8PathBuf};
use charval::models::{CharacterMetadata, decode_metadata};
use charval::scene::{ImageSource, MemoryScene};
use charval::services::export::{
    EXPORT_FOLDER_NAME, ExportData, image_sequence_paths, udim_tile_paths,
};
use tempfile::TempDir;

fn temp_dir() -> (TempDir, Utf8PathBuf) {
    let temp = TempDir::new().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, path)
}

fn asset_in(dir: &Utf8Path) -> Utf8PathBuf {
    let asset = dir.join("character.blend");
    std::fs::write(&asset, b"BLENDER").unwrap();
    asset
}

fn exportable_metadata() -> CharacterMetadata {
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

#[test]
fn export_layout_matches_the_upload_contract() {
    let (_temp, dir) = temp_dir();
    let asset = asset_in(&dir);
    std::fs::write(dir.join("skin.png"), b"png").unwrap();

    let mut scene = MemoryScene::new();
    scene.add_image(MemoryScene::file_image("skin", "//skin.png"));

    let export = ExportData::new(&asset, EXPORT_FOLDER_NAME).unwrap();
    let output = export.run(&exportable_metadata(), &scene).unwrap();

    assert!(output.join("character_output.blend").is_file());
    assert!(output.join("metadata.json").is_file());
    assert!(output.join("textures").join("skin.png").is_file());
}

#[test]
fn metadata_round_trips_through_the_exported_file() {
    let (_temp, dir) = temp_dir();
    let asset = asset_in(&dir);
    let metadata = exportable_metadata();

    let export = ExportData::new(&asset, EXPORT_FOLDER_NAME).unwrap();
    let output = export.run(&metadata, &MemoryScene::new()).unwrap();

    let text = std::fs::read_to_string(output.join("metadata.json")).unwrap();
    // Stable key order with 4-space indentation.
    assert!(text.starts_with("{\n    \"software\""));
    let software_pos = text.find("\"software\"").unwrap();
    let version_pos = text.find("\"version\"").unwrap();
    let materials_pos = text.find("\"materials\"").unwrap();
    assert!(software_pos < version_pos && version_pos < materials_pos);

    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    let reloaded = decode_metadata(&value).unwrap();
    assert_eq!(reloaded, metadata);
}

#[test]
fn udim_tiles_are_expanded_into_individual_files() {
    let (_temp, dir) = temp_dir();
    let asset = asset_in(&dir);
    std::fs::write(dir.join("skin_1001_diff.png"), b"png").unwrap();
    std::fs::write(dir.join("skin_1002_diff.png"), b"png").unwrap();
    std::fs::write(dir.join("skin_1001_diff.png.bak"), b"not a tile").unwrap();

    let mut scene = MemoryScene::new();
    let mut image = MemoryScene::file_image("skin", "//skin_<UDIM>_diff.png");
    image.source = ImageSource::Tiled;
    scene.add_image(image);

    let export = ExportData::new(&asset, EXPORT_FOLDER_NAME).unwrap();
    let output = export.run(&exportable_metadata(), &scene).unwrap();

    let textures = output.join("textures");
    assert!(textures.join("skin_1001_diff.png").is_file());
    assert!(textures.join("skin_1002_diff.png").is_file());
    assert!(!textures.join("skin_1001_diff.png.bak").exists());
}

#[test]
fn image_sequences_copy_until_the_first_gap() {
    let (_temp, dir) = temp_dir();
    let asset = asset_in(&dir);
    for frame in 1..=3 {
        std::fs::write(dir.join(format!("flame_{frame:03}.png")), b"png").unwrap();
    }
    // Frame 5 exists but frame 4 does not; the walk stops at the gap.
    std::fs::write(dir.join("flame_005.png"), b"png").unwrap();

    let mut scene = MemoryScene::new();
    let mut image = MemoryScene::file_image("flame", "//flame_001.png");
    image.source = ImageSource::Sequence;
    scene.add_image(image);

    let export = ExportData::new(&asset, EXPORT_FOLDER_NAME).unwrap();
    let output = export.run(&exportable_metadata(), &scene).unwrap();

    let textures = output.join("textures");
    assert!(textures.join("flame_001.png").is_file());
    assert!(textures.join("flame_003.png").is_file());
    assert!(!textures.join("flame_005.png").exists());
}

#[test]
fn sequence_walk_is_capped_at_two_hundred_frames() {
    let (_temp, dir) = temp_dir();
    for frame in 1..=250 {
        std::fs::write(dir.join(format!("smoke_{frame:04}.png")), b"png").unwrap();
    }

    let frames = image_sequence_paths(&dir.join("smoke_0001.png"));
    assert_eq!(frames.len(), 200);
}

#[test]
fn udim_helper_returns_tiles_sorted() {
    let (_temp, dir) = temp_dir();
    std::fs::write(dir.join("wall_1011_c.exr"), b"exr").unwrap();
    std::fs::write(dir.join("wall_1001_c.exr"), b"exr").unwrap();

    let tiles = udim_tile_paths(&dir.join("wall_<UDIM>_c.exr"));
    assert_eq!(tiles.len(), 2);
    assert!(tiles[0].as_str().ends_with("wall_1001_c.exr"));
    assert!(tiles[1].as_str().ends_with("wall_1011_c.exr"));
}

#[test]
fn custom_export_folder_from_settings_is_honored() {
    let (_temp, dir) = temp_dir();
    let asset = asset_in(&dir);

    let export = ExportData::new(&asset, "upload_data").unwrap();
    let output = export.run(&exportable_metadata(), &MemoryScene::new()).unwrap();
    assert_eq!(output, dir.join("upload_data"));
    assert!(output.join("metadata.json").is_file());
}
