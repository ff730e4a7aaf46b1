use std::fs;
use std::process::{Command, Output};

use tempfile::TempDir;

fn texview(config_dir: &std::path::Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_texview-demo"))
        .env("TEXVIEW_CONFIG_DIR", config_dir)
        .env_remove("TEXVIEW_CONFIG")
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run texview-demo")
}

#[test]
fn formats_lists_every_format() {
    let root = TempDir::new().unwrap();
    let output = texview(root.path(), &["formats"]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("420YpCbCr8BiPlanarVideoRange"));
    assert!(stdout.contains("'420v'"));
    assert!(stdout.contains("YCbCrPlanar"));
    // Header plus one line per format.
    assert_eq!(stdout.lines().count(), 18);
}

#[test]
fn check_config_accepts_valid_file() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("texview.toml");
    fs::write(
        &path,
        "version = 1\n[window]\nsize = \"640x360\"\n[display]\nformat = \"BGRA\"\n",
    )
    .unwrap();

    let output = texview(root.path(), &["check-config"]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("OK (640x360, 32BGRA"), "{stdout}");
}

#[test]
fn check_config_rejects_invalid_buffers() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("bad.toml");
    fs::write(&path, "version = 1\n[camera]\nbuffers = 0\n").unwrap();

    let output = texview(root.path(), &["check-config", path.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("camera.buffers"), "{stderr}");
}

#[test]
fn check_config_without_a_file_uses_defaults() {
    let root = TempDir::new().unwrap();
    let output = texview(root.path(), &["check-config"]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("1280x720"), "{stdout}");
}

#[test]
fn unknown_format_is_rejected_before_opening_a_window() {
    let root = TempDir::new().unwrap();
    let output = texview(root.path(), &["--format", "zzzz", "formats"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("unsupported pixel format"), "{stderr}");
}
