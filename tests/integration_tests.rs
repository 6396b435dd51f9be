//! End-to-end tests driving the monoshot binary

use std::path::Path;

use assert_cmd::Command;
use image::{Rgb, RgbImage};
use predicates::prelude::*;
use tempfile::TempDir;

/// Test utilities
mod test_utils {
    use super::*;

    /// Write a small gradient PNG
    pub fn create_test_image(path: &Path, width: u32, height: u32) {
        let image = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
        });
        image.save(path).unwrap();
    }

    /// The binary, isolated from any config file or environment overrides
    pub fn monoshot(dir: &TempDir) -> Command {
        let mut cmd = Command::cargo_bin("monoshot").unwrap();
        cmd.current_dir(dir.path())
            .env_remove("RUST_LOG")
            .env_remove("MONOSHOT_MAX_DURATION_SECS")
            .env_remove("MONOSHOT_WORKSPACE_ROOT")
            .env_remove("MONOSHOT_LOG_FORMAT")
            .env_remove("MONOSHOT_LOG_LEVEL")
            .args(["--log-level", "warn"])
            .arg("--workspace-root")
            .arg(dir.path().join("work"));
        cmd
    }
}

use test_utils::*;

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    monoshot(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("shot"))
        .stdout(predicate::str::contains("enhance-image"))
        .stdout(predicate::str::contains("extract-text"));
}

#[test]
fn test_unsupported_extension_is_rejected() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("clip.mkv");
    std::fs::write(&input, b"not a video").unwrap();

    monoshot(&dir)
        .args(["filter", "-f", "negative", "-i"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input rejected"));
}

#[test]
fn test_missing_input_fails() {
    let dir = TempDir::new().unwrap();
    monoshot(&dir)
        .args(["filter", "-f", "negative", "-i", "missing.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_negative_filter_exports_artifact() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("photo.png");
    create_test_image(&input, 64, 48);
    let export_dir = dir.path().join("exports");
    std::fs::create_dir(&export_dir).unwrap();

    monoshot(&dir)
        .args(["filter", "-f", "Negative", "--json", "-i"])
        .arg(&input)
        .arg("--export")
        .arg(&export_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"file_name\": \"negative.png\""))
        .stdout(predicate::str::contains("\"file_type\": \"png\""));

    let exported = image::open(export_dir.join("negative.png")).unwrap().to_rgb8();
    let original = image::open(&input).unwrap().to_rgb8();
    assert_eq!(exported.dimensions(), (64, 48));
    assert_eq!(exported.get_pixel(10, 20)[0], 255 - original.get_pixel(10, 20)[0]);

    // Every request workspace is removed afterwards
    let leftovers = std::fs::read_dir(dir.path().join("work")).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[test]
fn test_video_operation_refused_for_image() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("photo.png");
    create_test_image(&input, 32, 32);

    monoshot(&dir)
        .args(["shot", "--kind", "gif", "-i"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Generate Shot requires video input"));
}

#[test]
fn test_off_grid_enhancement_level_is_rejected() {
    let dir = TempDir::new().unwrap();
    monoshot(&dir)
        .args(["enhance-image", "-i", "clip.mp4", "-t", "1", "--brightness", "1.3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a multiple of 0.2"));
}

#[test]
fn test_inspect_image_as_json() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("photo.png");
    create_test_image(&input, 40, 30);

    monoshot(&dir)
        .args(["inspect", "--json", "-i"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"kind\": \"Image\""))
        .stdout(predicate::str::contains("\"accepted\": true"))
        .stdout(predicate::str::contains("Apply Filter"));
}

#[test]
fn test_mime_overrides_extension() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("upload.bin");
    create_test_image(&input.with_extension("png"), 40, 30);
    std::fs::rename(input.with_extension("png"), &input).unwrap();

    monoshot(&dir)
        .args(["inspect", "--mime", "image/png", "-i"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Resolution: 40x30"));
}
